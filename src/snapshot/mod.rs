//! # Snapshots
//!
//! Immutable key/value snapshots produced by one reconciliation pass.
//!
//! A [`Snapshot`] holds two views of the same entries:
//! - the published map, keyed by final configuration key (case-insensitive)
//! - the raw map, keyed by source secret identifier (case-sensitive), used to
//!   diff the next pass against this one

pub mod store;

pub use store::{ReloadToken, SnapshotStore};

use crate::keys;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// One loaded secret as stored in a snapshot
#[derive(Clone, PartialEq, Eq)]
pub struct LoadedEntry {
    /// Final configuration key after rename, prefix and encoding
    pub key: String,
    pub value: String,
    /// Last-modified timestamp of the source secret
    pub updated: Option<DateTime<Utc>>,
}

impl std::fmt::Debug for LoadedEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedEntry")
            .field("key", &self.key)
            .field("value", &"***")
            .field("updated", &self.updated)
            .finish()
    }
}

impl LoadedEntry {
    pub fn new(
        key: impl Into<String>,
        value: impl Into<String>,
        updated: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            updated,
        }
    }

    /// Exact optional-timestamp match: both absent, or both present and equal
    #[must_use]
    pub fn is_up_to_date(&self, updated: Option<DateTime<Utc>>) -> bool {
        self.updated == updated
    }
}

/// Published configuration produced by one pass
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    data: HashMap<String, LoadedEntry>,
    secrets: HashMap<String, LoadedEntry>,
}

impl Snapshot {
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Value for a configuration key, ignoring case
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.data.get(&keys::fold(key)).map(|entry| entry.value.as_str())
    }

    /// Published keys in their original case
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.data.values().map(|entry| entry.key.as_str())
    }

    /// Number of published keys
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Entries keyed by source secret identifier
    #[must_use]
    pub fn secrets(&self) -> &HashMap<String, LoadedEntry> {
        &self.secrets
    }
}

/// Builds a [`Snapshot`]; later insertions for the same key win
#[derive(Debug, Default)]
pub struct SnapshotBuilder {
    snapshot: Snapshot,
}

impl SnapshotBuilder {
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            snapshot: Snapshot {
                data: HashMap::with_capacity(capacity),
                secrets: HashMap::with_capacity(capacity),
            },
        }
    }

    pub fn insert(&mut self, secret_id: impl Into<String>, entry: LoadedEntry) {
        self.snapshot
            .data
            .insert(keys::fold(&entry.key), entry.clone());
        self.snapshot.secrets.insert(secret_id.into(), entry);
    }

    #[must_use]
    pub fn build(self) -> Snapshot {
        self.snapshot
    }
}
