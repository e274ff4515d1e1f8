//! # Reconciler
//!
//! One reconciliation pass: enumerate, detect, fetch, assemble, publish.
//!
//! ## Pass flow
//!
//! 1. Read the current snapshot (readers keep seeing it until step 5)
//! 2. Enumerate candidates for the configured selection mode
//! 3. Reuse entries whose timestamp is unchanged, fetch the rest with bounded concurrency
//! 4. Assemble the next snapshot once every fetch has completed
//! 5. Publish it and signal a change when secrets were fetched or dropped
//!
//! A failed pass publishes nothing. Passes on one reconciler are serialized.

mod assemble;
mod detect;
mod enumerate;
mod fetch;
pub mod scheduler;

pub use scheduler::{poll_for_changes, IntervalWaiter, ReloadWaiter, WaitOutcome};

use crate::config::ReconciliationConfig;
use crate::error::ProviderError;
use crate::observability::metrics;
use crate::snapshot::SnapshotStore;
use crate::store::SecretStore;
use assemble::SnapshotAssembler;
use detect::{ChangeDetector, Decision};
use fetch::BoundedFetcher;
use futures::TryStreamExt;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{debug, info, info_span, Instrument};

/// What started a pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerSource {
    OnDemand,
    Timer,
}

impl TriggerSource {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            TriggerSource::OnDemand => "on-demand",
            TriggerSource::Timer => "timer",
        }
    }
}

/// Summary of a successful pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PassOutcome {
    /// Secrets fetched from the store
    pub fetched: usize,
    /// Secrets carried over from the previous snapshot
    pub reused: usize,
    /// Previous secrets that are no longer present
    pub dropped: usize,
    /// Keys in the published snapshot
    pub published_keys: usize,
    /// Whether the change signal fired
    pub signalled: bool,
}

/// Runs reconciliation passes for one provider
pub struct Reconciler {
    config: Arc<ReconciliationConfig>,
    store: Arc<dyn SecretStore>,
    snapshots: Arc<SnapshotStore>,
    pass_lock: Mutex<()>,
    passes: AtomicU64,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("config", &self.config)
            .field("snapshots", &self.snapshots)
            .field("passes", &self.passes)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    #[must_use]
    pub fn new(
        config: Arc<ReconciliationConfig>,
        store: Arc<dyn SecretStore>,
        snapshots: Arc<SnapshotStore>,
    ) -> Self {
        Self {
            config,
            store,
            snapshots,
            pass_lock: Mutex::new(()),
            passes: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn config(&self) -> &ReconciliationConfig {
        &self.config
    }

    #[must_use]
    pub fn snapshots(&self) -> &Arc<SnapshotStore> {
        &self.snapshots
    }

    /// Number of passes started so far
    #[must_use]
    pub fn pass_count(&self) -> u64 {
        self.passes.load(Ordering::SeqCst)
    }

    /// Run one pass, waiting for any pass already in flight
    ///
    /// # Errors
    /// Returns [`ProviderError::RemoteUnavailable`] when enumeration or any fetch fails.
    /// The published snapshot is left untouched in that case.
    pub async fn run_pass(&self, trigger: TriggerSource) -> Result<PassOutcome, ProviderError> {
        let _serialized = self.pass_lock.lock().await;
        let pass = self.passes.fetch_add(1, Ordering::SeqCst) + 1;

        let span = info_span!(
            "keyvault.reconcile",
            pass,
            trigger = trigger.as_str(),
            fetched = tracing::field::Empty,
            reused = tracing::field::Empty,
            dropped = tracing::field::Empty,
        );
        let start = Instant::now();
        metrics::increment_passes();

        let result = self.reconcile().instrument(span.clone()).await;
        metrics::observe_pass_duration(start.elapsed().as_secs_f64());

        match &result {
            Ok(outcome) => {
                span.record("fetched", outcome.fetched);
                span.record("reused", outcome.reused);
                span.record("dropped", outcome.dropped);
                info!(
                    parent: &span,
                    keys = outcome.published_keys,
                    signalled = outcome.signalled,
                    duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
                    "Key Vault configuration reconciled"
                );
            }
            Err(e) => {
                metrics::increment_pass_errors();
                debug!(parent: &span, error = %e, "Key Vault reconciliation failed");
            }
        }
        result
    }

    async fn reconcile(&self) -> Result<PassOutcome, ProviderError> {
        let previous = self.snapshots.current();
        let mut detector = ChangeDetector::new(&previous);
        let mut fetcher =
            BoundedFetcher::new(Arc::clone(&self.store), self.config.max_concurrent_fetches);
        let mut reused = Vec::new();

        let mut candidates = enumerate::enumerate(self.store.as_ref(), &self.config.mode);
        while let Some(candidate) = candidates.try_next().await? {
            match detector.classify(&candidate) {
                Decision::Reuse(entry) => reused.push((candidate.name, entry)),
                Decision::Fetch => fetcher.submit(candidate.name),
            }
        }
        drop(candidates);
        debug!(
            reused = reused.len(),
            to_fetch = fetcher.submitted(),
            "Enumeration complete"
        );

        let fetched = fetcher.wait_all().await?;

        let refetched: HashSet<&str> = fetched.iter().map(|(id, _)| id.as_str()).collect();
        let unconsumed: Vec<&str> = detector.into_unconsumed().collect();
        let dropped = unconsumed
            .iter()
            .filter(|id| !refetched.contains(*id))
            .count();
        let changed = !fetched.is_empty() || !unconsumed.is_empty();

        let mut outcome = PassOutcome {
            fetched: fetched.len(),
            reused: reused.len(),
            dropped,
            ..PassOutcome::default()
        };

        let mut assembler = SnapshotAssembler::new(&self.config, reused.len() + fetched.len());
        for (id, entry) in reused {
            assembler.add_reused(id, entry);
        }
        for (id, value) in fetched {
            assembler.add_fetched(id, value);
        }
        let snapshot = assembler.finish();

        outcome.published_keys = snapshot.len();
        outcome.signalled = self.snapshots.publish(snapshot, changed);

        metrics::increment_secrets_fetched(outcome.fetched);
        metrics::increment_secrets_reused(outcome.reused);
        metrics::increment_secrets_dropped(outcome.dropped);
        metrics::set_keys_published(outcome.published_keys);
        if outcome.signalled {
            metrics::increment_reloads_signalled();
        }

        Ok(outcome)
    }
}
