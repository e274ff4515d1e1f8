//! # Provider Options
//!
//! Construction inputs for [`KeyVaultConfigurationProvider`](crate::KeyVaultConfigurationProvider).

use super::{default_key_encoder, KeyEncoder};
use crate::constants::DEFAULT_SECTION_PREFIX;
use crate::retry::RetryPolicy;
use crate::store::SecretStore;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Inputs for building a provider
///
/// Defaults: default key encoder, section prefix `"secrets"`, no reload interval,
/// and the default retry policy. The store has no default and must be supplied.
#[derive(Clone)]
pub struct ProviderOptions {
    pub store: Option<Arc<dyn SecretStore>>,
    /// Explicit secret identifiers to load
    pub vault_secrets: Vec<String>,
    /// Secret identifier to configuration key renames
    pub vault_secret_map: BTreeMap<String, String>,
    pub key_encoder: Option<KeyEncoder>,
    pub section_prefix: String,
    pub reload_interval: Option<Duration>,
    pub retry: RetryPolicy,
}

impl Default for ProviderOptions {
    fn default() -> Self {
        Self {
            store: None,
            vault_secrets: Vec::new(),
            vault_secret_map: BTreeMap::new(),
            key_encoder: Some(default_key_encoder()),
            section_prefix: DEFAULT_SECTION_PREFIX.to_string(),
            reload_interval: None,
            retry: RetryPolicy::default(),
        }
    }
}

impl std::fmt::Debug for ProviderOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderOptions")
            .field("has_store", &self.store.is_some())
            .field("vault_secrets", &self.vault_secrets)
            .field("vault_secret_map", &self.vault_secret_map)
            .field("has_key_encoder", &self.key_encoder.is_some())
            .field("section_prefix", &self.section_prefix)
            .field("reload_interval", &self.reload_interval)
            .field("retry", &self.retry)
            .finish()
    }
}

impl ProviderOptions {
    /// Options for a store with every other input defaulted
    #[must_use]
    pub fn new(store: Arc<dyn SecretStore>) -> Self {
        Self {
            store: Some(store),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn SecretStore>) -> Self {
        self.store = Some(store);
        self
    }

    #[must_use]
    pub fn with_secrets<I, S>(mut self, secrets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.vault_secrets = secrets.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_secret_map<I, K, V>(mut self, map: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.vault_secret_map = map.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        self
    }

    #[must_use]
    pub fn with_key_encoder<F>(mut self, encoder: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.key_encoder = Some(Arc::new(encoder));
        self
    }

    #[must_use]
    pub fn with_section_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.section_prefix = prefix.into();
        self
    }

    #[must_use]
    pub fn with_reload_interval(mut self, interval: Duration) -> Self {
        self.reload_interval = Some(interval);
        self
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}
