//! Common test utilities for provider integration tests
//!
//! Provides shared initialization code, a gated reload waiter and provider
//! builders over the in-memory store.

#![allow(dead_code, reason = "Each test binary uses a different subset of helpers")]

use async_trait::async_trait;
use keyvault_configuration::store::memory::InMemorySecretStore;
use keyvault_configuration::{
    KeyVaultConfigurationProvider, ProviderOptions, ReloadWaiter, WaitOutcome,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Once};
use std::time::Duration;
use tokio::sync::{watch, Semaphore};
use tokio_util::sync::CancellationToken;

static RUSTLS_INIT: Once = Once::new();

/// Initialize rustls crypto provider for tests
///
/// Uses a `Once` to ensure it's only called once across all tests.
pub fn init_rustls() {
    RUSTLS_INIT.call_once(|| {
        rustls::crypto::ring::default_provider()
            .install_default()
            .expect("Failed to install rustls crypto provider");
    });
}

/// Reload waiter that lets a background pass start only when the test says so
///
/// Every time the reload loop comes back to wait, the arrival counter is bumped.
/// [`GatedWaiter::run_pass`] waits for the loop to be parked, lets exactly one pass
/// through and returns once the loop is parked again, so the pass has completed.
#[derive(Debug)]
pub struct GatedWaiter {
    permits: Semaphore,
    arrivals: watch::Sender<u64>,
    released: AtomicU64,
}

impl GatedWaiter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            permits: Semaphore::new(0),
            arrivals: watch::channel(0).0,
            released: AtomicU64::new(0),
        })
    }

    async fn wait_for_arrivals(&self, count: u64) {
        let mut arrivals = self.arrivals.subscribe();
        tokio::time::timeout(Duration::from_secs(10), arrivals.wait_for(|n| *n >= count))
            .await
            .expect("reload loop did not reach the gate in time")
            .expect("gate dropped");
    }

    /// Let one background pass run and wait for it to finish
    pub async fn run_pass(&self) {
        let target = self.released.fetch_add(1, Ordering::SeqCst) + 1;
        self.wait_for_arrivals(target).await;
        self.permits.add_permits(1);
        self.wait_for_arrivals(target + 1).await;
    }

    /// Number of times the loop has parked at the gate
    pub fn arrivals(&self) -> u64 {
        *self.arrivals.borrow()
    }
}

#[async_trait]
impl ReloadWaiter for GatedWaiter {
    async fn wait_for_reload(
        &self,
        _interval: Duration,
        cancel: &CancellationToken,
    ) -> WaitOutcome {
        self.arrivals.send_modify(|n| *n += 1);
        tokio::select! {
            biased;
            () = cancel.cancelled() => WaitOutcome::Cancelled,
            permit = self.permits.acquire() => match permit {
                Ok(permit) => {
                    permit.forget();
                    WaitOutcome::Elapsed
                }
                Err(_) => WaitOutcome::Cancelled,
            },
        }
    }
}

/// Provider over `store` with default options
pub fn provider(store: &InMemorySecretStore) -> KeyVaultConfigurationProvider {
    provider_with(store, ProviderOptions::default())
}

/// Provider over `store` with the given options
pub fn provider_with(
    store: &InMemorySecretStore,
    options: ProviderOptions,
) -> KeyVaultConfigurationProvider {
    KeyVaultConfigurationProvider::new(options.with_store(Arc::new(store.clone())))
        .expect("provider options are valid")
}

/// Provider whose background passes are driven by the returned gate
pub fn gated_provider(
    store: &InMemorySecretStore,
    options: ProviderOptions,
) -> (KeyVaultConfigurationProvider, Arc<GatedWaiter>) {
    let gate = GatedWaiter::new();
    let options = options
        .with_store(Arc::new(store.clone()))
        .with_reload_interval(Duration::from_secs(60));
    let waiter: Arc<dyn ReloadWaiter> = Arc::<GatedWaiter>::clone(&gate);
    let provider = KeyVaultConfigurationProvider::with_reload_waiter(options, waiter)
        .expect("provider options are valid");
    (provider, gate)
}
