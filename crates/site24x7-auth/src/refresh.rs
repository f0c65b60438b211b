//! Background token refresh
//!
//! One task per authenticator. It sleeps until shortly before the current
//! token expires, refreshes it, and re-arms itself from the new expiry. After
//! a failure it sleeps only the retry interval, so it keeps trying until the
//! authorization server answers again. Failures are logged, never propagated.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::authenticator::Shared;
use crate::constants;

/// When the scheduler wakes up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshPolicy {
    /// Refresh this long before the token expires
    pub safety_margin: Duration,
    /// Never sleep less than this while the token is healthy
    pub minimum_interval: Duration,
    /// Sleep after a failed refresh
    pub retry_interval: Duration,
}

impl Default for RefreshPolicy {
    fn default() -> Self {
        Self {
            safety_margin: constants::DEFAULT_SAFETY_MARGIN,
            minimum_interval: constants::DEFAULT_MINIMUM_INTERVAL,
            retry_interval: constants::DEFAULT_RETRY_INTERVAL,
        }
    }
}

impl RefreshPolicy {
    /// Sleep before the next attempt.
    ///
    /// `elapsed` is the age of the current token. A healthy token is refreshed
    /// `safety_margin` before it expires, but never sooner than
    /// `minimum_interval` from now. After a failure the retry interval applies
    /// regardless of expiry. A zero `minimum_interval` or `retry_interval`
    /// falls back to the default, so the result is never zero.
    pub fn next_delay(&self, expires_in: Duration, elapsed: Duration, degraded: bool) -> Duration {
        if degraded {
            return nonzero_or(self.retry_interval, constants::DEFAULT_RETRY_INTERVAL);
        }
        let minimum = nonzero_or(self.minimum_interval, constants::DEFAULT_MINIMUM_INTERVAL);
        let interval = expires_in.saturating_sub(self.safety_margin).max(minimum);
        interval.saturating_sub(elapsed).max(minimum)
    }
}

fn nonzero_or(value: Duration, fallback: Duration) -> Duration {
    if value.is_zero() { fallback } else { value }
}

/// Handle to a running scheduler. Dropping it stops the task.
pub(crate) struct RefreshHandle {
    stop: watch::Sender<bool>,
    task: tokio::task::JoinHandle<()>,
}

impl RefreshHandle {
    /// Signal the task and wait for it to exit.
    pub(crate) async fn stop(self) {
        let _ = self.stop.send(true);
        if let Err(e) = self.task.await {
            warn!(error = %e, "token refresh scheduler panicked");
        }
    }
}

/// Spawn the refresh loop for `shared`.
pub(crate) fn spawn_scheduler(shared: Arc<Shared>) -> RefreshHandle {
    let (stop, mut stopped) = watch::channel(false);
    let task = tokio::spawn(async move {
        loop {
            // Register for wake-ups before reading the state the delay is based on
            let rearmed = shared.rearm.notified();
            let delay = shared.next_refresh_delay().await;
            debug!(delay_secs = delay.as_secs_f64(), "next token refresh scheduled");

            tokio::select! {
                _ = tokio::time::sleep(delay) => {
                    if let Err(e) = shared.refresh().await {
                        warn!(
                            error = %e,
                            retry_in_secs = shared.policy.retry_interval.as_secs_f64(),
                            "scheduled token refresh failed"
                        );
                    }
                }
                _ = rearmed => {
                    debug!("token refreshed out of schedule, re-arming");
                }
                _ = stopped.changed() => {
                    info!("token refresh scheduler stopped");
                    return;
                }
            }
        }
    });
    RefreshHandle { stop, task }
}
