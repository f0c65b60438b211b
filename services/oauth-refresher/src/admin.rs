//! Admin API for operating the authenticator
//!
//! Listens on a local port (default 8484) and gives operators a manual
//! recovery path when the scheduled refresh keeps failing.
//!
//! Endpoints:
//! - GET|POST /refresh: force a token refresh now
//! - GET /health: authenticator state and token expiry (never the token)
//! - GET /metrics: Prometheus text exposition

use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use metrics_exporter_prometheus::PrometheusHandle;
use tracing::{info, warn};

use site24x7_auth::{AuthState, Authenticator};

/// Shared state for admin API handlers.
#[derive(Clone)]
pub struct AdminState {
    authenticator: Arc<Authenticator>,
    prometheus: PrometheusHandle,
    started_at: Instant,
}

impl AdminState {
    pub fn new(authenticator: Arc<Authenticator>, prometheus: PrometheusHandle) -> Self {
        Self {
            authenticator,
            prometheus,
            started_at: Instant::now(),
        }
    }
}

/// Build the admin router, limited to `max_connections` concurrent requests.
pub fn build_admin_router(state: AdminState, max_connections: usize) -> Router {
    Router::new()
        .route("/refresh", get(refresh).post(refresh))
        .route("/health", get(health))
        .route("/metrics", get(metrics_handler))
        .layer(tower::limit::ConcurrencyLimitLayer::new(max_connections))
        .with_state(state)
}

/// GET|POST /refresh: run one refresh-token exchange.
///
/// 200 on success; 502 when the token endpoint failed or answered with an
/// error; 500 for local problems such as a missing refresh token.
async fn refresh(State(state): State<AdminState>) -> impl IntoResponse {
    let result = state.authenticator.refresh().await;
    crate::metrics::record_admin_refresh(result.is_ok());

    let (status, body) = match result {
        Ok(()) => {
            let snapshot = state.authenticator.token_snapshot().await;
            info!("manual token refresh succeeded");
            (
                StatusCode::OK,
                serde_json::json!({
                    "status": "refreshed",
                    "expires_in_secs": snapshot.remaining().as_secs(),
                }),
            )
        }
        Err(e) => {
            warn!(error = %e, "manual token refresh failed");
            let status = match e {
                site24x7_auth::Error::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
                ref e if e.is_persistence() => StatusCode::INTERNAL_SERVER_ERROR,
                _ => StatusCode::BAD_GATEWAY,
            };
            (
                status,
                serde_json::json!({
                    "error": format!("error refreshing access token: {e}")
                }),
            )
        }
    };

    (
        status,
        [(axum::http::header::CONTENT_TYPE, "application/json")],
        body.to_string(),
    )
}

/// GET /health: 200 when the last refresh succeeded, 503 when degraded.
async fn health(State(state): State<AdminState>) -> impl IntoResponse {
    let auth_state = state.authenticator.state().await;
    let snapshot = state.authenticator.token_snapshot().await;
    let next_refresh = state.authenticator.next_refresh_delay().await;

    let mut body = serde_json::json!({
        "status": auth_state.label(),
        "credential_file": state.authenticator.credential_path().display().to_string(),
        "token_expires_in_secs": snapshot.remaining().as_secs(),
        "next_refresh_in_secs": next_refresh.as_secs(),
        "uptime_seconds": state.started_at.elapsed().as_secs(),
    });
    if let AuthState::Degraded { last_error } = &auth_state {
        body["last_error"] = serde_json::Value::String(last_error.clone());
    }

    let status_code = match auth_state {
        AuthState::Ready => StatusCode::OK,
        _ => StatusCode::SERVICE_UNAVAILABLE,
    };

    (
        status_code,
        [(axum::http::header::CONTENT_TYPE, "application/json")],
        body.to_string(),
    )
}

/// GET /metrics: Prometheus text exposition.
async fn metrics_handler(State(state): State<AdminState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        state.prometheus.render(),
    )
}
