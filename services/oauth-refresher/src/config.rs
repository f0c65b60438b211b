//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! Every section is optional, so the service runs without a config file as
//! long as it can locate the credential file.

use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use site24x7_auth::{AuthenticatorOptions, RefreshPolicy};

use crate::error::{Error, Result};

/// Environment variable naming the credential file
pub const CREDENTIAL_FILE_ENV: &str = "SITE24X7_AUTHTOKEN_FILE";

/// Root configuration
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub credentials: CredentialsConfig,
    pub token_endpoint: TokenEndpointConfig,
    pub refresh: RefreshConfig,
    pub admin: AdminConfig,
}

/// Where the credential file lives
#[derive(Debug, Default, Deserialize)]
pub struct CredentialsConfig {
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// Zoho Accounts token endpoint. Accounts outside the US data center use a
/// different domain (`accounts.zoho.eu`, `accounts.zoho.in`, ...).
#[derive(Debug, Deserialize)]
pub struct TokenEndpointConfig {
    #[serde(default = "default_token_url")]
    pub url: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

/// Refresh scheduler tunables
#[derive(Debug, Deserialize)]
pub struct RefreshConfig {
    #[serde(default = "default_safety_margin")]
    pub safety_margin_secs: u64,
    #[serde(default = "default_minimum_interval")]
    pub minimum_interval_secs: u64,
    #[serde(default = "default_retry_interval")]
    pub retry_interval_secs: u64,
}

/// Admin HTTP listener
#[derive(Debug, Deserialize)]
pub struct AdminConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

fn default_token_url() -> String {
    site24x7_auth::TOKEN_ENDPOINT.to_string()
}

fn default_timeout_ms() -> u64 {
    site24x7_auth::REQUEST_TIMEOUT.as_millis() as u64
}

fn default_safety_margin() -> u64 {
    site24x7_auth::DEFAULT_SAFETY_MARGIN.as_secs()
}

fn default_minimum_interval() -> u64 {
    site24x7_auth::DEFAULT_MINIMUM_INTERVAL.as_secs()
}

fn default_retry_interval() -> u64 {
    site24x7_auth::DEFAULT_RETRY_INTERVAL.as_secs()
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8484))
}

fn default_max_connections() -> usize {
    64
}

impl Default for TokenEndpointConfig {
    fn default() -> Self {
        Self {
            url: default_token_url(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            safety_margin_secs: default_safety_margin(),
            minimum_interval_secs: default_minimum_interval(),
            retry_interval_secs: default_retry_interval(),
        }
    }
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            max_connections: default_max_connections(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file and validate it.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Like [`Config::load`], but a missing file yields the defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    fn validate(&self) -> Result<()> {
        if !self.token_endpoint.url.starts_with("http://")
            && !self.token_endpoint.url.starts_with("https://")
        {
            return Err(Error::Config(format!(
                "token_endpoint.url must start with http:// or https://, got: {}",
                self.token_endpoint.url
            )));
        }
        if self.token_endpoint.timeout_ms == 0 {
            return Err(Error::Config("timeout_ms must be greater than 0".into()));
        }
        if self.refresh.minimum_interval_secs == 0 {
            return Err(Error::Config(
                "minimum_interval_secs must be greater than 0".into(),
            ));
        }
        if self.refresh.retry_interval_secs == 0 {
            return Err(Error::Config(
                "retry_interval_secs must be greater than 0".into(),
            ));
        }
        if self.admin.max_connections == 0 {
            return Err(Error::Config(
                "max_connections must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("site24x7-oauth.toml")
    }

    /// Resolve the credential file location.
    ///
    /// Order: `--oauth-file`, `SITE24X7_AUTHTOKEN_FILE`, `[credentials] path`,
    /// then `$HOME/.site24x7/oauth.json`.
    pub fn credential_path(&self, cli_path: Option<&str>) -> Result<PathBuf> {
        if let Some(p) = cli_path {
            return Ok(PathBuf::from(p));
        }
        if let Ok(p) = std::env::var(CREDENTIAL_FILE_ENV) {
            if !p.is_empty() {
                return Ok(PathBuf::from(p));
            }
        }
        if let Some(ref p) = self.credentials.path {
            return Ok(p.clone());
        }
        match std::env::var("HOME") {
            Ok(home) if !home.is_empty() => {
                Ok(PathBuf::from(home).join(".site24x7").join("oauth.json"))
            }
            _ => Err(Error::Config(format!(
                "cannot locate the credential file: pass --oauth-file or set {CREDENTIAL_FILE_ENV}"
            ))),
        }
    }

    /// Options for the authenticator built from this configuration.
    pub fn authenticator_options(&self) -> AuthenticatorOptions {
        AuthenticatorOptions {
            token_endpoint: self.token_endpoint.url.clone(),
            request_timeout: Duration::from_millis(self.token_endpoint.timeout_ms),
            policy: RefreshPolicy {
                safety_margin: Duration::from_secs(self.refresh.safety_margin_secs),
                minimum_interval: Duration::from_secs(self.refresh.minimum_interval_secs),
                retry_interval: Duration::from_secs(self.refresh.retry_interval_secs),
            },
        }
    }
}
