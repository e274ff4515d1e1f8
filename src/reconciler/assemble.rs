//! Builds the next snapshot from reused and fetched secrets.

use crate::config::ReconciliationConfig;
use crate::snapshot::{LoadedEntry, Snapshot, SnapshotBuilder};
use crate::store::SecretValue;

#[derive(Debug)]
pub(crate) struct SnapshotAssembler<'a> {
    config: &'a ReconciliationConfig,
    builder: SnapshotBuilder,
}

impl<'a> SnapshotAssembler<'a> {
    pub(crate) fn new(config: &'a ReconciliationConfig, capacity: usize) -> Self {
        Self {
            config,
            builder: SnapshotBuilder::with_capacity(capacity),
        }
    }

    /// Carry an unchanged entry over with its key and timestamp
    pub(crate) fn add_reused(&mut self, secret_id: String, entry: LoadedEntry) {
        self.builder.insert(secret_id, entry);
    }

    /// Add a fetched value under its final configuration key
    pub(crate) fn add_fetched(&mut self, secret_id: String, secret: SecretValue) {
        let key = self.config.config_key(&secret_id);
        self.builder
            .insert(secret_id, LoadedEntry::new(key, secret.value, secret.updated));
    }

    pub(crate) fn finish(self) -> Snapshot {
        self.builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderOptions;
    use crate::store::memory::InMemorySecretStore;
    use chrono::DateTime;
    use std::sync::Arc;

    fn config(options: ProviderOptions) -> ReconciliationConfig {
        ReconciliationConfig::from_options(options).unwrap().1
    }

    fn value(name: &str, value: &str, secs: Option<i64>) -> SecretValue {
        SecretValue {
            name: name.to_string(),
            value: value.to_string(),
            updated: secs.and_then(|s| DateTime::from_timestamp(s, 0)),
        }
    }

    #[test]
    fn test_fetched_entry_takes_fetch_timestamp() {
        let config = config(ProviderOptions::new(Arc::new(InMemorySecretStore::new())));
        let mut assembler = SnapshotAssembler::new(&config, 1);
        assembler.add_fetched("Db--Password".to_string(), value("Db--Password", "pw", Some(42)));
        let snapshot = assembler.finish();

        assert_eq!(snapshot.get("secrets:Db:Password"), Some("pw"));
        assert_eq!(
            snapshot.secrets()["Db--Password"].updated,
            DateTime::from_timestamp(42, 0)
        );
    }

    #[test]
    fn test_rename_applies_in_selective_mode() {
        let options = ProviderOptions::new(Arc::new(InMemorySecretStore::new()))
            .with_section_prefix("")
            .with_secret_map([("Secret1", "SecretMap")]);
        let config = config(options);
        let mut assembler = SnapshotAssembler::new(&config, 1);
        assembler.add_fetched("Secret1".to_string(), value("Secret1", "Value1", None));
        let snapshot = assembler.finish();

        assert_eq!(snapshot.keys().collect::<Vec<_>>(), vec!["SecretMap"]);
        assert_eq!(snapshot.get("secretmap"), Some("Value1"));
    }

    #[test]
    fn test_reused_entry_keeps_key_and_timestamp() {
        let config = config(ProviderOptions::new(Arc::new(InMemorySecretStore::new())));
        let mut assembler = SnapshotAssembler::new(&config, 1);
        let entry = LoadedEntry::new("secrets:Kept", "v", DateTime::from_timestamp(7, 0));
        assembler.add_reused("Kept".to_string(), entry.clone());

        assert_eq!(assembler.finish().secrets()["Kept"], entry);
    }

    #[test]
    fn test_custom_encoder_sees_prefixed_key() {
        let options = ProviderOptions::new(Arc::new(InMemorySecretStore::new()))
            .with_key_encoder(|key| key.replace('_', ":"));
        let config = config(options);
        let mut assembler = SnapshotAssembler::new(&config, 1);
        assembler.add_fetched("a_b".to_string(), value("a_b", "1", None));

        assert_eq!(assembler.finish().keys().collect::<Vec<_>>(), vec!["secrets:a:b"]);
    }
}
