//! Service-specific error types

use thiserror::Error;

/// Errors from loading and validating the service configuration.
///
/// Credential and token errors come from `site24x7_auth::Error` and are
/// reported through `anyhow` at startup.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Result alias using service Error
pub type Result<T> = std::result::Result<T, Error>;
