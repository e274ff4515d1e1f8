//! # Key Vault Configuration
//!
//! Live, reloadable configuration source backed by Azure Key Vault secrets.
//!
//! A [`KeyVaultConfigurationProvider`] reconciles the secrets in a remote
//! [`SecretStore`] into an immutable [`Snapshot`] of hierarchical configuration keys
//! (`secrets:Db:Password`). Each pass reuses values whose update timestamp is
//! unchanged, fetches the rest with bounded concurrency and swaps the new snapshot
//! in atomically. A [`ReloadToken`] fires whenever a pass publishes a change.
//!
//! ## Modules
//!
//! - [`store`] - secret store capability, in-memory and Azure Key Vault backends
//! - [`reconciler`] - reconciliation pass and background reload loop
//! - [`snapshot`] - published snapshots and the change signal
//! - [`config`] - construction options, frozen pass configuration, environment settings
//! - [`provider`] - the configuration surface (`load`, `get`, `get_child_keys`, `dispose`)
//! - [`observability`] - tracing setup and Prometheus metrics
//! - [`server`] - `/metrics`, `/healthz` and `/readyz`

pub mod config;
pub mod constants;
pub mod error;
pub mod keys;
pub mod observability;
pub mod provider;
pub mod reconciler;
pub mod retry;
pub mod server;
pub mod snapshot;
pub mod store;

pub use config::{ProviderOptions, ProviderSettings, ReconciliationConfig, SelectionMode};
pub use error::{ProviderError, StoreError};
pub use provider::KeyVaultConfigurationProvider;
pub use reconciler::{PassOutcome, ReloadWaiter, TriggerSource, WaitOutcome};
pub use retry::{load_with_retry, RetryPolicy};
pub use snapshot::{ReloadToken, Snapshot};
pub use store::{SecretMetadata, SecretStore, SecretValue};
