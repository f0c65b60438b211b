//! Prometheus metrics exposition
//!
//! Token metrics are emitted by `site24x7_auth::metrics`; this module installs
//! the recorder that renders them on `/metrics` and adds the admin counters:
//!
//! - `oauth_admin_refresh_requests_total` (counter): label `outcome`

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus recorder and return a handle for rendering metrics.
pub fn install_recorder() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    Ok(handle)
}

/// Record a manual refresh request received on the admin endpoint.
pub fn record_admin_refresh(succeeded: bool) {
    let outcome = if succeeded { "success" } else { "failure" };
    metrics::counter!("oauth_admin_refresh_requests_total", "outcome" => outcome).increment(1);
}
