//! Token lifecycle metrics
//!
//! Emitted through the `metrics` facade; nothing is recorded unless the host
//! process installs a recorder.
//!
//! - `oauth_token_exchanges_total` (counter): labels `grant`, `outcome`
//! - `oauth_token_expires_in_seconds` (gauge): validity window of the current token

use crate::error::Error;
use crate::token::Grant;

/// Record the outcome of one token exchange.
pub fn record_exchange(grant: &Grant, result: Result<(), &Error>) {
    let outcome = match result {
        Ok(()) => "success",
        Err(Error::Transport(_)) => "transport_error",
        Err(Error::AuthorizationServer(_)) => "server_error",
        Err(e) if e.is_malformed_response() => "malformed_response",
        Err(_) => "error",
    };
    metrics::counter!(
        "oauth_token_exchanges_total",
        "grant" => grant.grant_type(),
        "outcome" => outcome
    )
    .increment(1);
}

/// Publish the validity window of the token currently served.
pub fn set_token_expiry(expires_in_sec: f64) {
    metrics::gauge!("oauth_token_expires_in_seconds").set(expires_in_sec);
}
