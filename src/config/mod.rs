//! # Configuration
//!
//! Construction inputs and the frozen configuration a provider runs with.
//!
//! - [`ProviderOptions`] - caller-supplied inputs (store, selection, encoder, prefix, intervals)
//! - [`ReconciliationConfig`] - validated, read-only form used by every pass
//! - [`ProviderSettings`] - deployment settings read from environment variables

pub mod options;
pub mod settings;

pub use options::ProviderOptions;
pub use settings::{LogSettings, ProviderSettings};

use crate::constants::{KEY_DELIMITER, MAX_CONCURRENT_FETCHES, SECRET_NAME_DELIMITER};
use crate::error::ProviderError;
use crate::retry::RetryPolicy;
use crate::store::SecretStore;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Maps a configuration key candidate to its final form
pub type KeyEncoder = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Replace every `--` with the hierarchy delimiter
#[must_use]
pub fn encode_secret_name(name: &str) -> String {
    name.replace(SECRET_NAME_DELIMITER, KEY_DELIMITER)
}

#[must_use]
pub fn default_key_encoder() -> KeyEncoder {
    Arc::new(encode_secret_name)
}

/// Which secrets a pass loads
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionMode {
    /// Every enabled secret in the store
    Full,
    /// Only the listed identifiers, optionally renamed
    Selective {
        identifiers: Vec<String>,
        renames: BTreeMap<String, String>,
    },
}

impl SelectionMode {
    /// `Full` when both inputs are empty, otherwise `Selective`
    ///
    /// Identifiers are the list followed by the rename-map keys, without duplicates.
    #[must_use]
    pub fn from_inputs(secrets: &[String], renames: &BTreeMap<String, String>) -> Self {
        if secrets.is_empty() && renames.is_empty() {
            return SelectionMode::Full;
        }

        let mut identifiers: Vec<String> = Vec::with_capacity(secrets.len() + renames.len());
        for id in secrets.iter().chain(renames.keys()) {
            if !identifiers.contains(id) {
                identifiers.push(id.clone());
            }
        }

        SelectionMode::Selective {
            identifiers,
            renames: renames.clone(),
        }
    }

    fn rename(&self, secret_id: &str) -> Option<&str> {
        match self {
            SelectionMode::Full => None,
            SelectionMode::Selective { renames, .. } => renames.get(secret_id).map(String::as_str),
        }
    }
}

/// Immutable configuration shared by every pass of one provider
pub struct ReconciliationConfig {
    pub mode: SelectionMode,
    pub key_encoder: KeyEncoder,
    pub section_prefix: String,
    /// `None` disables recurring reload
    pub reload_interval: Option<Duration>,
    pub max_concurrent_fetches: usize,
    /// Consumed by the startup retry wrapper only
    pub retry: RetryPolicy,
}

impl std::fmt::Debug for ReconciliationConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconciliationConfig")
            .field("mode", &self.mode)
            .field("section_prefix", &self.section_prefix)
            .field("reload_interval", &self.reload_interval)
            .field("max_concurrent_fetches", &self.max_concurrent_fetches)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl ReconciliationConfig {
    /// Validate options and split them into the store handle and the frozen config
    ///
    /// # Errors
    /// Returns [`ProviderError::Configuration`] when the store or the key encoder is missing.
    pub fn from_options(
        options: ProviderOptions,
    ) -> Result<(Arc<dyn SecretStore>, Self), ProviderError> {
        let store = options.store.ok_or_else(|| {
            ProviderError::Configuration("a secret store client is required".to_string())
        })?;
        let key_encoder = options
            .key_encoder
            .ok_or_else(|| ProviderError::Configuration("a key encoder is required".to_string()))?;

        let config = Self {
            mode: SelectionMode::from_inputs(&options.vault_secrets, &options.vault_secret_map),
            key_encoder,
            section_prefix: options.section_prefix,
            reload_interval: options.reload_interval.filter(|interval| !interval.is_zero()),
            max_concurrent_fetches: MAX_CONCURRENT_FETCHES,
            retry: options.retry,
        };
        Ok((store, config))
    }

    /// Final configuration key for a secret: rename, then prefix, then encode
    #[must_use]
    pub fn config_key(&self, secret_id: &str) -> String {
        let name = self.mode.rename(secret_id).unwrap_or(secret_id);
        let candidate = if self.section_prefix.trim().is_empty() {
            name.to_string()
        } else {
            crate::keys::combine(&self.section_prefix, name)
        };
        (self.key_encoder)(&candidate)
    }
}
