//! Site24x7 OAuth credential lifecycle
//!
//! Acquires a Zoho access token from a hand-seeded credential file, persists
//! every exchange back to that file, and keeps the token valid for the life of
//! the process with a background refresh task. Consumers depend only on
//! [`Authenticator::access_token`] and [`Authenticator::refresh`].
//!
//! Credential flow:
//! 1. Operator writes `CLIENT_ID`, `CLIENT_SECRET` and `GENERATED_CODE` into the
//!    credential file (a template is created on first start)
//! 2. `Authenticator::new()` exchanges the code via `token::TokenClient`
//! 3. The token and refresh token are written back via `CredentialRecord::persist()`
//! 4. The refresh scheduler exchanges the refresh token shortly before expiry
//! 5. Each refreshed token is persisted again

pub mod authenticator;
pub mod constants;
pub mod credentials;
pub mod error;
pub mod metrics;
pub mod refresh;
pub mod token;

#[cfg(test)]
mod testing;

pub use authenticator::{AuthState, Authenticator, AuthenticatorOptions, TokenSnapshot};
pub use constants::*;
pub use credentials::CredentialRecord;
pub use error::{Error, Result};
pub use refresh::RefreshPolicy;
pub use token::{Grant, TokenClient, TokenResponse, generate_refresh_token};
