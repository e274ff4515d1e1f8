//! # Reload Scheduler
//!
//! Recurring background passes.
//!
//! The loop waits through a [`ReloadWaiter`], then runs a pass, until the
//! cancellation token fires. The waiter is the only place that blocks between
//! passes; [`IntervalWaiter`] sleeps for the interval, and tests substitute their
//! own waiter to control when the next pass starts.

use super::{Reconciler, TriggerSource};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// How a wait between passes ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// Time for the next pass
    Elapsed,
    /// The loop should stop
    Cancelled,
}

/// Wait between two background passes
#[async_trait]
pub trait ReloadWaiter: Send + Sync + std::fmt::Debug {
    /// Must return [`WaitOutcome::Cancelled`] promptly once `cancel` fires
    async fn wait_for_reload(&self, interval: Duration, cancel: &CancellationToken) -> WaitOutcome;
}

/// Sleeps for the reload interval
#[derive(Debug, Clone, Copy, Default)]
pub struct IntervalWaiter;

#[async_trait]
impl ReloadWaiter for IntervalWaiter {
    async fn wait_for_reload(&self, interval: Duration, cancel: &CancellationToken) -> WaitOutcome {
        tokio::select! {
            biased;
            () = cancel.cancelled() => WaitOutcome::Cancelled,
            () = tokio::time::sleep(interval) => WaitOutcome::Elapsed,
        }
    }
}

/// Background reload loop
///
/// Pass failures are logged and the loop carries on with the last published snapshot.
/// A pass already running when cancellation fires is allowed to finish.
pub async fn poll_for_changes(
    reconciler: Arc<Reconciler>,
    waiter: Arc<dyn ReloadWaiter>,
    interval: Duration,
    cancel: CancellationToken,
) {
    info!(
        interval_secs = interval.as_secs_f64(),
        "Starting Key Vault reload loop"
    );

    loop {
        if waiter.wait_for_reload(interval, &cancel).await == WaitOutcome::Cancelled
            || cancel.is_cancelled()
        {
            break;
        }

        match reconciler.run_pass(TriggerSource::Timer).await {
            Ok(outcome) => debug!(
                fetched = outcome.fetched,
                reused = outcome.reused,
                dropped = outcome.dropped,
                signalled = outcome.signalled,
                "Background reload complete"
            ),
            Err(e) => warn!(
                error = %e,
                "Background reload failed, keeping last published configuration"
            ),
        }
    }

    info!("Key Vault reload loop stopped");
}
