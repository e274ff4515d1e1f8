//! # Secret Stores
//!
//! Read-only capability the reconciler needs from a remote secret store.
//!
//! Each backend implements [`SecretStore`]:
//! - [`memory::InMemorySecretStore`] for tests and local runs
//! - [`azure::AzureKeyVaultStore`] for Azure Key Vault over REST

use crate::error::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;

pub mod azure;
pub mod memory;

/// Lazy, fallible sequence of secret metadata
pub type MetadataStream<'a> = BoxStream<'a, Result<SecretMetadata, StoreError>>;

/// Properties of one secret (or one version of a secret) as reported by the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretMetadata {
    pub name: String,
    /// `None` when the store did not report an enabled state
    pub enabled: Option<bool>,
    pub updated: Option<DateTime<Utc>>,
}

impl SecretMetadata {
    pub fn new(
        name: impl Into<String>,
        enabled: Option<bool>,
        updated: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            name: name.into(),
            enabled,
            updated,
        }
    }

    /// Only an explicit `true` counts as enabled
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled == Some(true)
    }
}

/// A fetched secret value
#[derive(Clone, PartialEq, Eq)]
pub struct SecretValue {
    pub name: String,
    pub value: String,
    pub updated: Option<DateTime<Utc>>,
}

impl std::fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretValue")
            .field("name", &self.name)
            .field("value", &"***")
            .field("updated", &self.updated)
            .finish()
    }
}

/// Provider trait for remote secret stores
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Enumerate every secret known to the store (latest version properties)
    fn list_secrets(&self) -> MetadataStream<'_>;

    /// Enumerate all versions of a single secret
    fn list_versions<'a>(&'a self, name: &'a str) -> MetadataStream<'a>;

    /// Fetch the current value of a secret
    async fn fetch_value(&self, name: &str) -> Result<SecretValue, StoreError>;
}
