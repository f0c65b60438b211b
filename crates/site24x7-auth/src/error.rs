//! Error types for credential and token operations

/// Errors from loading credentials and exchanging tokens.
///
/// Construction of an [`Authenticator`](crate::Authenticator) fails on any of
/// these. After construction only the refresh path produces them, and the
/// scheduler logs them instead of propagating.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Grant material or client identity missing from the credential file
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The token endpoint could not be reached or timed out
    #[error("token request failed: {0}")]
    Transport(String),

    /// The token endpoint answered with an `error` field or a failure status
    #[error("authorization server error: {0}")]
    AuthorizationServer(String),

    /// The token endpoint answered with something that is not a token response
    #[error("malformed token response: {0}")]
    MalformedResponse(String),

    #[error("token response contained an empty access token")]
    EmptyToken,

    #[error("token response did not declare an expiry")]
    NoExpiry,

    #[error("credential file not found: {0}")]
    NotFound(String),

    #[error("credential parse error: {0}")]
    CredentialParse(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl Error {
    /// Whether the error came from reading or writing the credential file.
    pub fn is_persistence(&self) -> bool {
        matches!(
            self,
            Error::NotFound(_) | Error::CredentialParse(_) | Error::Io(_)
        )
    }

    /// Whether the token endpoint answered successfully but the token is unusable.
    pub fn is_malformed_response(&self) -> bool {
        matches!(
            self,
            Error::MalformedResponse(_) | Error::EmptyToken | Error::NoExpiry
        )
    }
}

/// Result alias for auth operations.
pub type Result<T> = std::result::Result<T, Error>;
