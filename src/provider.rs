//! # Key Vault Configuration Provider
//!
//! Live, reloadable configuration source backed by a secret store.
//!
//! ```rust,no_run
//! # async fn example(store: std::sync::Arc<dyn keyvault_configuration::SecretStore>)
//! #     -> Result<(), keyvault_configuration::ProviderError> {
//! use keyvault_configuration::{KeyVaultConfigurationProvider, ProviderOptions};
//! use std::time::Duration;
//!
//! let options = ProviderOptions::new(store).with_reload_interval(Duration::from_secs(300));
//! let provider = KeyVaultConfigurationProvider::new(options)?;
//! provider.load().await?;
//! let password = provider.get("secrets:Db:Password")?;
//! # let _ = password;
//! # Ok(())
//! # }
//! ```
//!
//! The first successful `load()` starts the background reload loop when a reload
//! interval is configured. `dispose()` (or dropping the provider) stops it.

use crate::config::{ProviderOptions, ReconciliationConfig};
use crate::error::ProviderError;
use crate::keys;
use crate::reconciler::{
    poll_for_changes, IntervalWaiter, PassOutcome, Reconciler, ReloadWaiter, TriggerSource,
};
use crate::retry::RetryPolicy;
use crate::snapshot::{ReloadToken, Snapshot, SnapshotStore};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Configuration source over a secret store
pub struct KeyVaultConfigurationProvider {
    reconciler: Arc<Reconciler>,
    waiter: Arc<dyn ReloadWaiter>,
    cancel: CancellationToken,
    polling: AtomicBool,
    poll_task: Mutex<Option<JoinHandle<()>>>,
    loads: AtomicU64,
}

impl std::fmt::Debug for KeyVaultConfigurationProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyVaultConfigurationProvider")
            .field("reconciler", &self.reconciler)
            .field("waiter", &self.waiter)
            .field("polling", &self.polling)
            .field("disposed", &self.cancel.is_cancelled())
            .field("loads", &self.loads)
            .finish_non_exhaustive()
    }
}

impl KeyVaultConfigurationProvider {
    /// Validate options and build a provider; no store access happens here
    ///
    /// # Errors
    /// Returns [`ProviderError::Configuration`] when the store or key encoder is missing.
    pub fn new(options: ProviderOptions) -> Result<Self, ProviderError> {
        Self::with_reload_waiter(options, Arc::new(IntervalWaiter))
    }

    /// Like [`new`](Self::new) with a custom wait between background passes
    ///
    /// # Errors
    /// Returns [`ProviderError::Configuration`] when the store or key encoder is missing.
    pub fn with_reload_waiter(
        options: ProviderOptions,
        waiter: Arc<dyn ReloadWaiter>,
    ) -> Result<Self, ProviderError> {
        let (store, config) = ReconciliationConfig::from_options(options)?;
        debug!(config = ?config, "Key Vault configuration provider created");

        let reconciler = Reconciler::new(Arc::new(config), store, Arc::new(SnapshotStore::new()));
        Ok(Self {
            reconciler: Arc::new(reconciler),
            waiter,
            cancel: CancellationToken::new(),
            polling: AtomicBool::new(false),
            poll_task: Mutex::new(None),
            loads: AtomicU64::new(0),
        })
    }

    /// Run one pass now and publish its result
    ///
    /// Starts the background reload loop after the first success when an interval
    /// is configured.
    ///
    /// # Errors
    /// Returns [`ProviderError::Cancelled`] after `dispose()`, or
    /// [`ProviderError::RemoteUnavailable`] when the pass fails. A failed load leaves
    /// the previously published configuration in place.
    pub async fn load(&self) -> Result<PassOutcome, ProviderError> {
        if self.cancel.is_cancelled() {
            return Err(ProviderError::Cancelled);
        }

        let outcome = self.reconciler.run_pass(TriggerSource::OnDemand).await?;
        self.loads.fetch_add(1, Ordering::SeqCst);
        self.start_polling();
        Ok(outcome)
    }

    fn start_polling(&self) {
        let Some(interval) = self.reconciler.config().reload_interval else {
            return;
        };
        if self.cancel.is_cancelled()
            || self
                .polling
                .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                .is_err()
        {
            return;
        }

        let handle = tokio::spawn(poll_for_changes(
            Arc::clone(&self.reconciler),
            Arc::clone(&self.waiter),
            interval,
            self.cancel.clone(),
        ));
        *self
            .poll_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(handle);
    }

    /// Value for a key, ignoring case
    ///
    /// # Errors
    /// Returns [`ProviderError::KeyNotFound`] when the key is not published.
    pub fn get(&self, key: &str) -> Result<String, ProviderError> {
        self.try_get(key)
            .ok_or_else(|| ProviderError::KeyNotFound(key.to_string()))
    }

    #[must_use]
    pub fn try_get(&self, key: &str) -> Option<String> {
        self.snapshot().get(key).map(str::to_string)
    }

    /// Immediate child segments under `parent_path`, merged with `earlier_keys` and sorted
    #[must_use]
    pub fn get_child_keys(
        &self,
        earlier_keys: Vec<String>,
        parent_path: Option<&str>,
    ) -> Vec<String> {
        let snapshot = self.snapshot();
        keys::child_keys(snapshot.keys(), earlier_keys, parent_path)
    }

    /// Every published key
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.snapshot().keys().map(str::to_string).collect()
    }

    /// The currently published snapshot
    #[must_use]
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.reconciler.snapshots().current()
    }

    /// Token that fires when a pass publishes changed configuration
    #[must_use]
    pub fn reload_token(&self) -> ReloadToken {
        self.reconciler.snapshots().reload_token()
    }

    /// Whether the background reload loop has been started and not disposed
    #[must_use]
    pub fn is_polling(&self) -> bool {
        self.polling.load(Ordering::SeqCst) && !self.cancel.is_cancelled()
    }

    /// Frozen configuration every pass runs with
    #[must_use]
    pub fn config(&self) -> &ReconciliationConfig {
        self.reconciler.config()
    }

    /// Retry policy for wrapping the initial load
    ///
    /// See [`load_with_retry`](crate::retry::load_with_retry).
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        self.reconciler.config().retry
    }

    /// Number of successful `load()` calls
    #[must_use]
    pub fn load_count(&self) -> u64 {
        self.loads.load(Ordering::SeqCst)
    }

    /// Number of passes started, on demand or in the background
    #[must_use]
    pub fn pass_count(&self) -> u64 {
        self.reconciler.pass_count()
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Stop the background loop; idempotent
    ///
    /// A pass already in flight finishes, but no further pass starts.
    pub fn dispose(&self) {
        if self.cancel.is_cancelled() {
            return;
        }
        self.cancel.cancel();
        info!("Key Vault configuration provider disposed");
    }

    /// Dispose and wait for the background loop to exit
    pub async fn shutdown(&self) {
        self.dispose();
        let handle = self
            .poll_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                debug!(error = %e, "Reload loop ended abnormally");
            }
        }
    }
}

impl Drop for KeyVaultConfigurationProvider {
    fn drop(&mut self) {
        self.dispose();
    }
}
