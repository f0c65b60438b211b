//! Authenticator: the single owner of the credential record
//!
//! Request-path code reads the access token through a shared lock and never
//! waits on the network. Writes happen only after a successful token exchange
//! and hold the exclusive lock for the in-memory update alone; the HTTP call
//! and the file write both run outside it.
//!
//! Lifecycle:
//! 1. `Uninitialized`: load the credential file (write a template if absent)
//! 2. `Bootstrapping`: no usable access token, exchange the stored grant
//! 3. `Ready`: token served, refresh scheduler running
//! 4. `Degraded`: last refresh failed, previous token still served, scheduler
//!    retries on the short retry interval

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Notify, RwLock};
use tracing::{debug, info, warn};

use crate::constants;
use crate::credentials::{CredentialRecord, now_millis};
use crate::error::{Error, Result};
use crate::metrics;
use crate::refresh::{RefreshHandle, RefreshPolicy, spawn_scheduler};
use crate::token::{Grant, TokenClient};

/// Authenticator lifecycle state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    Uninitialized,
    Bootstrapping,
    Ready,
    /// Last refresh failed; the previous token is still served.
    Degraded { last_error: String },
}

impl AuthState {
    /// Status label for health/logging.
    pub fn label(&self) -> &'static str {
        match self {
            AuthState::Uninitialized => "uninitialized",
            AuthState::Bootstrapping => "bootstrapping",
            AuthState::Ready => "ready",
            AuthState::Degraded { .. } => "degraded",
        }
    }
}

/// Access token together with its expiry bookkeeping, read under one lock.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenSnapshot {
    pub access_token: String,
    pub expires_in_sec: f64,
    pub generated_at_millis: i64,
}

impl TokenSnapshot {
    /// Time left before the token expires, zero once it has.
    pub fn remaining(&self) -> Duration {
        let expires_at = self.generated_at_millis + (self.expires_in_sec * 1000.0) as i64;
        let left = expires_at - now_millis();
        Duration::from_millis(left.max(0) as u64)
    }
}

/// Tunables for an [`Authenticator`].
#[derive(Debug, Clone)]
pub struct AuthenticatorOptions {
    pub token_endpoint: String,
    pub request_timeout: Duration,
    pub policy: RefreshPolicy,
}

impl Default for AuthenticatorOptions {
    fn default() -> Self {
        Self {
            token_endpoint: constants::TOKEN_ENDPOINT.to_string(),
            request_timeout: constants::REQUEST_TIMEOUT,
            policy: RefreshPolicy::default(),
        }
    }
}

/// State shared between the authenticator handle and its refresh scheduler.
pub(crate) struct Shared {
    record: RwLock<CredentialRecord>,
    state: RwLock<AuthState>,
    store_path: PathBuf,
    client: TokenClient,
    pub(crate) policy: RefreshPolicy,
    /// Serializes refresh cycles so a rotated refresh token is never raced
    refresh_guard: Mutex<()>,
    /// Wakes the scheduler after a refresh it did not initiate
    pub(crate) rearm: Notify,
}

impl Shared {
    async fn set_state(&self, state: AuthState) {
        let mut current = self.state.write().await;
        if *current != state {
            debug!(from = current.label(), to = state.label(), "authenticator state change");
        }
        *current = state;
    }

    /// Obtain the first access token from the stored grant material.
    async fn bootstrap(&self) -> Result<()> {
        self.set_state(AuthState::Bootstrapping).await;
        let grant = {
            let record = self.record.read().await;
            if record.client_id.is_empty() || record.client_secret.is_empty() {
                return Err(missing_material(&self.store_path));
            }
            record
                .bootstrap_grant()
                .ok_or_else(|| missing_material(&self.store_path))?
        };

        info!(grant = grant.grant_type(), "no access token on file, bootstrapping");
        let snapshot = self.exchange(grant).await?;
        snapshot.persist(&self.store_path).await?;
        info!(
            path = %self.store_path.display(),
            expires_in_sec = snapshot.expires_in_sec,
            "access token acquired"
        );
        Ok(())
    }

    /// Run one token exchange and apply the result.
    ///
    /// Returns a copy of the updated record for persistence outside the lock.
    async fn exchange(&self, grant: Grant) -> Result<CredentialRecord> {
        let (client_id, client_secret, access_token) = {
            let record = self.record.read().await;
            (
                record.client_id.clone(),
                record.client_secret.clone(),
                record.access_token.clone(),
            )
        };

        let result = self
            .client
            .exchange(&client_id, &client_secret, &grant, &access_token)
            .await;
        metrics::record_exchange(&grant, result.as_ref().map(|_| ()));
        let response = result?;

        let snapshot = {
            let mut record = self.record.write().await;
            record.apply(&grant, response, now_millis());
            record.clone()
        };
        metrics::set_token_expiry(snapshot.expires_in_sec);
        Ok(snapshot)
    }

    /// Force one refresh-token exchange.
    ///
    /// Failure moves the authenticator to `Degraded` without touching the
    /// token being served. Either way the scheduler is woken to recompute its
    /// next sleep.
    pub(crate) async fn refresh(&self) -> Result<()> {
        let _guard = self.refresh_guard.lock().await;
        let result = self.refresh_locked().await;
        match &result {
            Ok(()) => self.set_state(AuthState::Ready).await,
            Err(e) => {
                self.set_state(AuthState::Degraded {
                    last_error: e.to_string(),
                })
                .await
            }
        }
        self.rearm.notify_waiters();
        result
    }

    async fn refresh_locked(&self) -> Result<()> {
        let refresh_token = self.record.read().await.refresh_token.clone();
        if refresh_token.is_empty() {
            return Err(Error::Configuration(format!(
                "no REFRESH_TOKEN available in {}",
                self.store_path.display()
            )));
        }

        let snapshot = self.exchange(Grant::RefreshToken(refresh_token)).await?;
        if let Err(e) = snapshot.persist(&self.store_path).await {
            warn!(
                path = %self.store_path.display(),
                error = %e,
                "failed to persist refreshed token, in-memory token still served"
            );
        }
        info!(expires_in_sec = snapshot.expires_in_sec, "access token refreshed");
        Ok(())
    }

    /// How long the scheduler should sleep before the next attempt.
    pub(crate) async fn next_refresh_delay(&self) -> Duration {
        let degraded = matches!(*self.state.read().await, AuthState::Degraded { .. });
        let (expires_in, generated_at) = {
            let record = self.record.read().await;
            (record.expires_in(), record.token_generation_time)
        };
        let elapsed = Duration::from_millis((now_millis() - generated_at).max(0) as u64);
        self.policy.next_delay(expires_in, elapsed, degraded)
    }
}

fn missing_material(path: &Path) -> Error {
    Error::Configuration(format!(
        "update CLIENT_ID, CLIENT_SECRET and GENERATED_CODE (or REFRESH_TOKEN) in the file {}",
        path.display()
    ))
}

/// Keeps a Site24x7 access token valid for the lifetime of the process.
///
/// Share it behind an `Arc`; every method takes `&self`. Dropping the
/// authenticator stops its refresh scheduler.
pub struct Authenticator {
    shared: Arc<Shared>,
    scheduler: Mutex<Option<RefreshHandle>>,
}

impl Authenticator {
    /// Build an authenticator for the credential file at `path` using the
    /// production token endpoint and default refresh policy.
    pub async fn new(path: impl Into<PathBuf>) -> Result<Self> {
        Self::with_options(path, AuthenticatorOptions::default()).await
    }

    /// Build an authenticator for the credential file at `path`.
    ///
    /// If the file does not exist a template is written there and construction
    /// fails with `Configuration`, so an operator can fill in the client
    /// identity and grant material and restart. If the file holds no usable
    /// access token, the stored grant is exchanged before returning. Any error
    /// here means no authenticator exists and the caller must not proceed.
    pub async fn with_options(
        path: impl Into<PathBuf>,
        options: AuthenticatorOptions,
    ) -> Result<Self> {
        let store_path = path.into();
        let client = TokenClient::new(options.token_endpoint, options.request_timeout)?;

        let record = match CredentialRecord::load(&store_path).await {
            Ok(record) => record,
            Err(Error::NotFound(_)) => {
                info!(path = %store_path.display(), "credential file not found, writing template");
                CredentialRecord::default().persist(&store_path).await?;
                return Err(missing_material(&store_path));
            }
            Err(e) => return Err(e),
        };
        let needs_bootstrap = !record.has_access_token();
        if !needs_bootstrap {
            metrics::set_token_expiry(record.expires_in_sec);
        }

        let shared = Arc::new(Shared {
            record: RwLock::new(record),
            state: RwLock::new(AuthState::Uninitialized),
            store_path,
            client,
            policy: options.policy,
            refresh_guard: Mutex::new(()),
            rearm: Notify::new(),
        });

        if needs_bootstrap {
            shared.bootstrap().await?;
        }
        shared.set_state(AuthState::Ready).await;

        let scheduler = spawn_scheduler(shared.clone());
        info!(path = %shared.store_path.display(), "authenticator ready");
        Ok(Self {
            shared,
            scheduler: Mutex::new(Some(scheduler)),
        })
    }

    /// The current access token.
    ///
    /// Never waits on the network. The token may be close to expiry if the
    /// scheduler has not fired yet, or stale if refreshes are failing.
    pub async fn access_token(&self) -> String {
        self.shared.record.read().await.access_token.clone()
    }

    /// `Authorization` header value for Site24x7 API calls.
    pub async fn authorization_header(&self) -> String {
        format!("{} {}", constants::AUTH_SCHEME, self.access_token().await)
    }

    /// Access token and expiry bookkeeping from a single read.
    pub async fn token_snapshot(&self) -> TokenSnapshot {
        let record = self.shared.record.read().await;
        TokenSnapshot {
            access_token: record.access_token.clone(),
            expires_in_sec: record.expires_in_sec,
            generated_at_millis: record.token_generation_time,
        }
    }

    /// Force a refresh now.
    ///
    /// On failure the previously served token stays in place and the scheduler
    /// switches to the retry interval.
    pub async fn refresh(&self) -> Result<()> {
        self.shared.refresh().await
    }

    pub async fn state(&self) -> AuthState {
        self.shared.state.read().await.clone()
    }

    /// Time until the scheduler's next refresh attempt.
    pub async fn next_refresh_delay(&self) -> Duration {
        self.shared.next_refresh_delay().await
    }

    pub fn credential_path(&self) -> &Path {
        &self.shared.store_path
    }

    /// Stop the refresh scheduler and wait for it to exit.
    ///
    /// The last token keeps being served. Calling this twice is a no-op.
    pub async fn shutdown(&self) {
        if let Some(handle) = self.scheduler.lock().await.take() {
            handle.stop().await;
        }
    }
}
