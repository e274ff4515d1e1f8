//! # In-Memory Secret Store
//!
//! Versioned secret store kept in process memory.
//!
//! Follows Key Vault semantics:
//! - Versions are ordered oldest first; the last version is the current one
//! - `list_secrets` reports the current version's properties for every secret
//! - `list_versions` reports every version of one secret
//! - `fetch_value` returns the current version's value
//!
//! Besides local runs, it is the test double for the reconciler: fetch counts are
//! recorded, failures can be injected, and a fetch hook can delay or observe fetches.

use super::{MetadataStream, SecretMetadata, SecretStore, SecretValue};
use crate::error::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use futures::{FutureExt, StreamExt};
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

/// Async callback run at the start of every fetch, before the value is read
pub type FetchHook = Arc<dyn Fn(String) -> BoxFuture<'static, ()> + Send + Sync>;

/// Wrap an async closure as a [`FetchHook`]
pub fn fetch_hook<F, Fut>(hook: F) -> FetchHook
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Arc::new(move |name: String| hook(name).boxed())
}

/// One stored version of a secret
#[derive(Clone, PartialEq, Eq)]
pub struct StoredVersion {
    pub value: String,
    pub enabled: Option<bool>,
    pub updated: Option<DateTime<Utc>>,
}

impl std::fmt::Debug for StoredVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredVersion")
            .field("value", &"***")
            .field("enabled", &self.enabled)
            .field("updated", &self.updated)
            .finish()
    }
}

#[derive(Default)]
struct Inner {
    secrets: RwLock<BTreeMap<String, Vec<StoredVersion>>>,
    listing_failure: RwLock<Option<StoreError>>,
    fetch_failures: RwLock<HashMap<String, StoreError>>,
    fetch_hook: RwLock<Option<FetchHook>>,
    fetches: RwLock<HashMap<String, usize>>,
    total_fetches: AtomicUsize,
}

/// Versioned in-memory secret store
///
/// Cloning is cheap and every clone shares the same contents.
#[derive(Clone, Default)]
pub struct InMemorySecretStore {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for InMemorySecretStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let secrets = self
            .inner
            .secrets
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("InMemorySecretStore")
            .field("secrets", &secrets.keys().collect::<Vec<_>>())
            .field("total_fetches", &self.fetch_count())
            .finish_non_exhaustive()
    }
}

impl InMemorySecretStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace a secret with a single enabled version without a timestamp
    pub fn put(&self, name: impl Into<String>, value: impl Into<String>) {
        self.set(name, value, Some(true), None);
    }

    /// Replace a secret with a single version
    pub fn set(
        &self,
        name: impl Into<String>,
        value: impl Into<String>,
        enabled: Option<bool>,
        updated: Option<DateTime<Utc>>,
    ) {
        let version = StoredVersion {
            value: value.into(),
            enabled,
            updated,
        };
        self.write_secrets().insert(name.into(), vec![version]);
    }

    /// Append a new current version to a secret, creating it if needed
    pub fn put_version(
        &self,
        name: impl Into<String>,
        value: impl Into<String>,
        enabled: Option<bool>,
        updated: Option<DateTime<Utc>>,
    ) {
        let version = StoredVersion {
            value: value.into(),
            enabled,
            updated,
        };
        self.write_secrets()
            .entry(name.into())
            .or_default()
            .push(version);
    }

    /// Change the enabled flag of the current version
    pub fn set_enabled(&self, name: &str, enabled: Option<bool>) {
        if let Some(current) = self
            .write_secrets()
            .get_mut(name)
            .and_then(|versions| versions.last_mut())
        {
            current.enabled = enabled;
        }
    }

    /// Delete a secret and all of its versions
    pub fn remove(&self, name: &str) {
        self.write_secrets().remove(name);
    }

    /// Delete every secret
    pub fn clear(&self) {
        self.write_secrets().clear();
    }

    /// Make `list_secrets` and `list_versions` fail (or succeed again with `None`)
    pub fn fail_listing(&self, error: Option<StoreError>) {
        *self
            .inner
            .listing_failure
            .write()
            .unwrap_or_else(PoisonError::into_inner) = error;
    }

    /// Make fetches of one secret fail
    pub fn fail_fetch(&self, name: impl Into<String>, error: StoreError) {
        self.inner
            .fetch_failures
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into(), error);
    }

    /// Remove every injected failure
    pub fn clear_failures(&self) {
        self.fail_listing(None);
        self.inner
            .fetch_failures
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn set_fetch_hook(&self, hook: Option<FetchHook>) {
        *self
            .inner
            .fetch_hook
            .write()
            .unwrap_or_else(PoisonError::into_inner) = hook;
    }

    /// Number of `fetch_value` calls made so far
    #[must_use]
    pub fn fetch_count(&self) -> usize {
        self.inner.total_fetches.load(Ordering::SeqCst)
    }

    /// Number of `fetch_value` calls made so far for one secret
    #[must_use]
    pub fn fetch_count_for(&self, name: &str) -> usize {
        self.inner
            .fetches
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .copied()
            .unwrap_or(0)
    }

    fn write_secrets(
        &self,
    ) -> std::sync::RwLockWriteGuard<'_, BTreeMap<String, Vec<StoredVersion>>> {
        self.inner
            .secrets
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn listing_failure(&self) -> Option<StoreError> {
        self.inner
            .listing_failure
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn record_fetch(&self, name: &str) {
        self.inner.total_fetches.fetch_add(1, Ordering::SeqCst);
        *self
            .inner
            .fetches
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(name.to_string())
            .or_insert(0) += 1;
    }
}

fn metadata(name: &str, version: &StoredVersion) -> SecretMetadata {
    SecretMetadata::new(name, version.enabled, version.updated)
}

#[async_trait]
impl SecretStore for InMemorySecretStore {
    fn list_secrets(&self) -> MetadataStream<'_> {
        if let Some(error) = self.listing_failure() {
            return futures::stream::once(async move { Err(error) }).boxed();
        }
        let items: Vec<Result<SecretMetadata, StoreError>> = self
            .inner
            .secrets
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter_map(|(name, versions)| {
                versions.last().map(|current| Ok(metadata(name, current)))
            })
            .collect();
        futures::stream::iter(items).boxed()
    }

    fn list_versions<'a>(&'a self, name: &'a str) -> MetadataStream<'a> {
        if let Some(error) = self.listing_failure() {
            return futures::stream::once(async move { Err(error) }).boxed();
        }
        let items: Vec<Result<SecretMetadata, StoreError>> = self
            .inner
            .secrets
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .map(|versions| versions.iter().map(|v| Ok(metadata(name, v))).collect())
            .unwrap_or_default();
        futures::stream::iter(items).boxed()
    }

    async fn fetch_value(&self, name: &str) -> Result<SecretValue, StoreError> {
        self.record_fetch(name);

        let hook = self
            .inner
            .fetch_hook
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(hook) = hook {
            hook(name.to_string()).await;
        }

        if let Some(error) = self
            .inner
            .fetch_failures
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
        {
            return Err(error);
        }

        let secrets = self
            .inner
            .secrets
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let current = secrets
            .get(name)
            .and_then(|versions| versions.last())
            .ok_or_else(|| StoreError::NotFound(name.to_string()))?;

        // Key Vault refuses reads of a disabled current version
        if current.enabled == Some(false) {
            return Err(StoreError::Unauthorized(format!(
                "operation get is not allowed on disabled secret {name}"
            )));
        }

        Ok(SecretValue {
            name: name.to_string(),
            value: current.value.clone(),
            updated: current.updated,
        })
    }
}
