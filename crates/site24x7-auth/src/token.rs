//! OAuth token exchange against Zoho Accounts
//!
//! Handles both grants the client uses:
//! 1. Authorization code exchange (first start with a freshly generated code)
//! 2. Token refresh (scheduled and on-demand)
//!
//! Zoho expects the grant parameters in the query string of a bodyless POST.
//! An `error` field in the JSON answer means the exchange failed even when the
//! HTTP status is 200.

use std::time::Duration;

use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use tracing::debug;

use crate::constants;
use crate::error::{Error, Result};

/// Grant material presented to the token endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Grant {
    AuthorizationCode(String),
    RefreshToken(String),
}

impl Grant {
    /// Value of the `grant_type` parameter.
    pub fn grant_type(&self) -> &'static str {
        match self {
            Grant::AuthorizationCode(_) => "authorization_code",
            Grant::RefreshToken(_) => "refresh_token",
        }
    }

    fn param(&self) -> (&'static str, &str) {
        match self {
            Grant::AuthorizationCode(code) => ("code", code.as_str()),
            Grant::RefreshToken(refresh) => ("refresh_token", refresh.as_str()),
        }
    }
}

/// Response from the token endpoint for both grants.
///
/// `expires_in_sec` is a delta in seconds from the response time.
/// `refresh_token` is only present on code exchange or when Zoho rotates it.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct TokenResponse {
    pub access_token: String,
    pub expires_in_sec: f64,
    pub refresh_token: Option<String>,
    pub error: Option<String>,
}

/// HTTP client for the token endpoint.
///
/// Connections are never pooled: exchanges happen minutes apart and each one
/// must fail within the request timeout instead of hanging on a stale socket.
#[derive(Debug, Clone)]
pub struct TokenClient {
    http: reqwest::Client,
    endpoint: String,
}

impl TokenClient {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(0)
            .build()
            .map_err(|e| Error::Transport(format!("building HTTP client: {e}")))?;
        Ok(Self {
            http,
            endpoint: endpoint.into(),
        })
    }

    /// Client for the production Zoho endpoint with the default timeout.
    pub fn zoho() -> Result<Self> {
        Self::new(constants::TOKEN_ENDPOINT, constants::REQUEST_TIMEOUT)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Exchange `grant` for a new access token.
    ///
    /// `access_token` is the token currently held (possibly empty); it is sent
    /// as the `Authorization` header on the refresh path only. The returned
    /// response is validated: non-empty access token and a positive expiry.
    pub async fn exchange(
        &self,
        client_id: &str,
        client_secret: &str,
        grant: &Grant,
        access_token: &str,
    ) -> Result<TokenResponse> {
        let (grant_key, grant_value) = grant.param();
        let mut request = self
            .http
            .post(&self.endpoint)
            .query(&[
                ("client_id", client_id),
                ("client_secret", client_secret),
                (grant_key, grant_value),
                ("grant_type", grant.grant_type()),
            ])
            .header(CONTENT_TYPE, constants::CONTENT_TYPE)
            .header(ACCEPT, constants::ACCEPT);
        if let Grant::RefreshToken(_) = grant {
            request = request.header(
                AUTHORIZATION,
                format!("{} {access_token}", constants::AUTH_SCHEME),
            );
        }

        debug!(grant = grant.grant_type(), "requesting access token");
        let response = request
            .send()
            .await
            .map_err(|e| Error::Transport(format!("{} request failed: {e}", grant.grant_type())))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::Transport(format!("reading token response: {e}")))?;

        let token: TokenResponse = match serde_json::from_str(&body) {
            Ok(token) => token,
            Err(_) if !status.is_success() => {
                return Err(Error::AuthorizationServer(format!(
                    "token endpoint returned {status}: {body}"
                )));
            }
            Err(e) => return Err(Error::MalformedResponse(e.to_string())),
        };

        if let Some(error) = token.error.as_deref().filter(|e| !e.is_empty()) {
            return Err(Error::AuthorizationServer(error.to_string()));
        }
        if !status.is_success() {
            return Err(Error::AuthorizationServer(format!(
                "token endpoint returned {status}: {body}"
            )));
        }
        if token.access_token.is_empty() {
            return Err(Error::EmptyToken);
        }
        if token.expires_in_sec.is_nan() || token.expires_in_sec <= 0.0 {
            return Err(Error::NoExpiry);
        }
        Ok(token)
    }
}

/// Exchange a freshly generated code for a long-lived refresh token.
///
/// Used once, out of band, to obtain the refresh token an operator stores in
/// configuration. Nothing is persisted.
pub async fn generate_refresh_token(
    client: &TokenClient,
    client_id: &str,
    client_secret: &str,
    code: &str,
) -> Result<String> {
    let grant = Grant::AuthorizationCode(code.to_string());
    let response = client.exchange(client_id, client_secret, &grant, "").await?;
    response
        .refresh_token
        .filter(|r| !r.is_empty())
        .ok_or_else(|| {
            Error::MalformedResponse("code exchange did not return a refresh token".into())
        })
}
