//! # Snapshot Store
//!
//! Holds the currently published [`Snapshot`] and raises the change signal.
//!
//! Readers get an `Arc<Snapshot>` that stays valid while a newer snapshot is swapped in.
//! The change signal is a generation counter on a `tokio::sync::watch` channel; each
//! [`ReloadToken`] observes it independently.

use super::Snapshot;
use crate::error::ProviderError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::watch;
use tracing::debug;

/// Owner of the current snapshot
#[derive(Debug)]
pub struct SnapshotStore {
    current: RwLock<Arc<Snapshot>>,
    published: AtomicBool,
    generation: watch::Sender<u64>,
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotStore {
    #[must_use]
    pub fn new() -> Self {
        let (generation, _) = watch::channel(0);
        Self {
            current: RwLock::new(Arc::new(Snapshot::empty())),
            published: AtomicBool::new(false),
            generation,
        }
    }

    /// The live snapshot
    #[must_use]
    pub fn current(&self) -> Arc<Snapshot> {
        Arc::clone(&self.current.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Whether any pass has published yet
    #[must_use]
    pub fn has_published(&self) -> bool {
        self.published.load(Ordering::SeqCst)
    }

    /// Swap in `next` and fire the change signal when warranted
    ///
    /// The signal fires only when `changed` is set and an earlier snapshot was
    /// published, so the first load never fires. Returns whether it fired.
    pub fn publish(&self, next: Snapshot, changed: bool) -> bool {
        let previous = {
            let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
            std::mem::replace(&mut *current, Arc::new(next))
        };
        // Freed after the write guard is released
        drop(previous);
        let had_previous = self.published.swap(true, Ordering::SeqCst);

        let fire = changed && had_previous;
        if fire {
            self.generation.send_modify(|generation| *generation += 1);
            debug!(generation = *self.generation.borrow(), "Configuration change signalled");
        }
        fire
    }

    /// Number of change signals fired so far
    #[must_use]
    pub fn generation(&self) -> u64 {
        *self.generation.borrow()
    }

    /// A new token observing future change signals
    #[must_use]
    pub fn reload_token(&self) -> ReloadToken {
        ReloadToken {
            receiver: self.generation.subscribe(),
        }
    }
}

/// Change-notification token handed to configuration consumers
#[derive(Debug, Clone)]
pub struct ReloadToken {
    receiver: watch::Receiver<u64>,
}

impl ReloadToken {
    /// Number of change signals fired so far
    #[must_use]
    pub fn generation(&self) -> u64 {
        *self.receiver.borrow()
    }

    /// Whether a signal fired since this token last observed one
    #[must_use]
    pub fn has_changed(&self) -> bool {
        self.receiver.has_changed().unwrap_or(false)
    }

    /// Wait for the next change signal and return the new generation
    ///
    /// # Errors
    /// Returns [`ProviderError::Cancelled`] once the owning provider is gone.
    pub async fn changed(&mut self) -> Result<u64, ProviderError> {
        self.receiver
            .changed()
            .await
            .map_err(|_closed| ProviderError::Cancelled)?;
        Ok(*self.receiver.borrow_and_update())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::{LoadedEntry, SnapshotBuilder};

    fn snapshot_with(key: &str, value: &str) -> Snapshot {
        let mut builder = SnapshotBuilder::default();
        builder.insert(key, LoadedEntry::new(key, value, None));
        builder.build()
    }

    #[test]
    fn test_first_publish_never_fires() {
        let store = SnapshotStore::new();
        assert!(!store.has_published());
        assert!(!store.publish(snapshot_with("a", "1"), true));
        assert!(store.has_published());
        assert_eq!(store.generation(), 0);
        assert_eq!(store.current().get("a"), Some("1"));
    }

    #[test]
    fn test_change_after_first_publish_fires() {
        let store = SnapshotStore::new();
        let token = store.reload_token();
        store.publish(snapshot_with("a", "1"), true);

        assert!(store.publish(snapshot_with("a", "2"), true));
        assert_eq!(token.generation(), 1);
        assert!(token.has_changed());
    }

    #[test]
    fn test_unchanged_publish_swaps_without_firing() {
        let store = SnapshotStore::new();
        store.publish(snapshot_with("a", "1"), true);
        assert!(!store.publish(snapshot_with("a", "1"), false));
        assert_eq!(store.generation(), 0);
    }

    #[test]
    fn test_readers_keep_old_snapshot() {
        let store = SnapshotStore::new();
        store.publish(snapshot_with("a", "1"), true);
        let old = store.current();
        store.publish(snapshot_with("b", "2"), true);

        assert_eq!(old.get("a"), Some("1"));
        assert_eq!(store.current().get("a"), None);
    }

    #[test]
    fn test_publish_releases_previous_snapshot() {
        let store = SnapshotStore::new();
        store.publish(snapshot_with("a", "1"), true);
        let previous = store.current();
        assert_eq!(Arc::strong_count(&previous), 2);

        store.publish(snapshot_with("a", "2"), true);

        assert_eq!(Arc::strong_count(&previous), 1);
        assert_eq!(store.current().get("a"), Some("2"));
    }

    #[tokio::test]
    async fn test_token_resolves_on_signal() {
        let store = Arc::new(SnapshotStore::new());
        store.publish(Snapshot::empty(), false);
        let mut token = store.reload_token();

        let publisher = Arc::clone(&store);
        let handle = tokio::spawn(async move {
            publisher.publish(snapshot_with("a", "1"), true);
        });

        assert_eq!(token.changed().await.unwrap(), 1);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_token_is_cancelled_when_store_dropped() {
        let store = SnapshotStore::new();
        let mut token = store.reload_token();
        drop(store);
        assert!(matches!(token.changed().await, Err(ProviderError::Cancelled)));
    }
}
