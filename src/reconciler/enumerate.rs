//! Candidate enumeration for one pass.
//!
//! - Full mode lists every secret and keeps only explicitly enabled ones.
//! - Selective mode lists the versions of each configured identifier and keeps the
//!   most recently updated enabled version. Identifiers that do not exist or have no
//!   enabled version are skipped.

use crate::config::SelectionMode;
use crate::error::StoreError;
use crate::store::{MetadataStream, SecretMetadata, SecretStore};
use futures::future;
use futures::{StreamExt, TryStreamExt};
use tracing::debug;

/// Lazy stream of candidates; store errors are passed through
pub(crate) fn enumerate<'a>(
    store: &'a dyn SecretStore,
    mode: &'a SelectionMode,
) -> MetadataStream<'a> {
    match mode {
        SelectionMode::Full => store
            .list_secrets()
            .try_filter(|candidate| future::ready(candidate.is_enabled()))
            .boxed(),
        SelectionMode::Selective { identifiers, .. } => futures::stream::iter(identifiers)
            .then(move |id| latest_enabled_version(store, id))
            .try_filter_map(|candidate| future::ready(Ok(candidate)))
            .boxed(),
    }
}

async fn latest_enabled_version(
    store: &dyn SecretStore,
    id: &str,
) -> Result<Option<SecretMetadata>, StoreError> {
    let listed: Result<Vec<SecretMetadata>, StoreError> = store
        .list_versions(id)
        .try_filter(|version| future::ready(version.is_enabled()))
        .try_collect()
        .await;
    let versions = match listed {
        Ok(versions) => versions,
        Err(StoreError::NotFound(_)) => {
            debug!(secret.name = id, "Secret does not exist, skipping");
            return Ok(None);
        }
        Err(e) => return Err(e),
    };

    let latest = select_latest(versions).map(|mut version| {
        version.name = id.to_string();
        version
    });
    if latest.is_none() {
        debug!(secret.name = id, "No enabled version, skipping");
    }
    Ok(latest)
}

/// Most recently updated version; a missing timestamp is oldest, ties keep the first
pub(crate) fn select_latest(versions: Vec<SecretMetadata>) -> Option<SecretMetadata> {
    versions.into_iter().fold(None, |best, version| match best {
        Some(current) if version.updated <= current.updated => Some(current),
        _ => Some(version),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::InMemorySecretStore;
    use chrono::DateTime;
    use std::collections::BTreeMap;

    fn at(secs: i64) -> Option<chrono::DateTime<chrono::Utc>> {
        DateTime::from_timestamp(secs, 0)
    }

    #[test]
    fn test_select_latest_prefers_newest_timestamp() {
        let versions = vec![
            SecretMetadata::new("a", Some(true), at(10)),
            SecretMetadata::new("a", Some(true), at(30)),
            SecretMetadata::new("a", Some(true), at(20)),
        ];
        assert_eq!(select_latest(versions).unwrap().updated, at(30));
    }

    #[test]
    fn test_select_latest_missing_timestamp_is_oldest() {
        let versions = vec![
            SecretMetadata::new("a", Some(true), None),
            SecretMetadata::new("a", Some(true), at(1)),
        ];
        assert_eq!(select_latest(versions).unwrap().updated, at(1));
        assert!(select_latest(Vec::new()).is_none());
    }

    #[test]
    fn test_select_latest_ties_keep_first() {
        let versions = vec![
            SecretMetadata::new("first", Some(true), at(5)),
            SecretMetadata::new("second", Some(true), at(5)),
        ];
        assert_eq!(select_latest(versions).unwrap().name, "first");
    }

    #[tokio::test]
    async fn test_full_mode_skips_disabled_and_unknown() {
        let store = InMemorySecretStore::new();
        store.set("On", "1", Some(true), None);
        store.set("Off", "2", Some(false), None);
        store.set("Unknown", "3", None, None);

        let names: Vec<String> = enumerate(&store, &SelectionMode::Full)
            .map_ok(|m| m.name)
            .try_collect()
            .await
            .unwrap();
        assert_eq!(names, vec!["On"]);
    }

    #[tokio::test]
    async fn test_selective_mode_picks_latest_enabled_version() {
        let store = InMemorySecretStore::new();
        store.put_version("Db", "v1", Some(true), at(10));
        store.put_version("Db", "v2", Some(true), at(20));
        store.put_version("Db", "v3", Some(false), at(30));
        store.put_version("Gone", "x", Some(false), at(5));
        store.put("Ignored", "y");

        let mode = SelectionMode::from_inputs(
            &["Db".to_string(), "Gone".to_string(), "Missing".to_string()],
            &BTreeMap::new(),
        );
        let candidates: Vec<SecretMetadata> =
            enumerate(&store, &mode).try_collect().await.unwrap();

        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].name, "Db");
        assert_eq!(candidates[0].updated, at(20));
    }

    #[tokio::test]
    async fn test_listing_errors_propagate() {
        let store = InMemorySecretStore::new();
        store.put("A", "1");
        store.fail_listing(Some(StoreError::Unavailable("down".to_string())));

        let result: Result<Vec<_>, _> = enumerate(&store, &SelectionMode::Full).try_collect().await;
        assert_eq!(result.unwrap_err(), StoreError::Unavailable("down".to_string()));
    }
}
