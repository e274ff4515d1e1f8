//! Bounded fan-out of secret fetches.
//!
//! Every submitted fetch is spawned immediately and waits on a semaphore owned by
//! this fetcher, so at most `max_concurrent` fetches run at once. Permits are
//! released when the task finishes, fails or is aborted. Dropping the fetcher
//! aborts whatever is still running.

use crate::error::StoreError;
use crate::observability::metrics::InFlightFetch;
use crate::store::{SecretStore, SecretValue};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug_span, Instrument};

type FetchOutput = (usize, String, Result<SecretValue, StoreError>);

pub(crate) struct BoundedFetcher {
    store: Arc<dyn SecretStore>,
    gate: Arc<Semaphore>,
    tasks: JoinSet<FetchOutput>,
    submitted: usize,
}

impl std::fmt::Debug for BoundedFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundedFetcher")
            .field("available_permits", &self.gate.available_permits())
            .field("submitted", &self.submitted)
            .field("pending", &self.tasks.len())
            .finish_non_exhaustive()
    }
}

impl BoundedFetcher {
    pub(crate) fn new(store: Arc<dyn SecretStore>, max_concurrent: usize) -> Self {
        Self {
            store,
            gate: Arc::new(Semaphore::new(max_concurrent.max(1))),
            tasks: JoinSet::new(),
            submitted: 0,
        }
    }

    pub(crate) fn submitted(&self) -> usize {
        self.submitted
    }

    /// Start fetching `secret_id` as soon as a permit is free
    pub(crate) fn submit(&mut self, secret_id: String) {
        let store = Arc::clone(&self.store);
        let gate = Arc::clone(&self.gate);
        let index = self.submitted;
        self.submitted += 1;

        let span = debug_span!("keyvault.secret.fetch", secret.name = %secret_id);
        self.tasks.spawn(
            async move {
                let result = match gate.acquire_owned().await {
                    Ok(_permit) => {
                        let _in_flight = InFlightFetch::start();
                        store.fetch_value(&secret_id).await
                    }
                    Err(closed) => Err(StoreError::Unavailable(format!(
                        "fetch gate unavailable: {closed}"
                    ))),
                };
                (index, secret_id, result)
            }
            .instrument(span),
        );
    }

    /// Wait for every submitted fetch; any failure fails the batch
    ///
    /// Successful results come back in submission order, paired with their identifier.
    pub(crate) async fn wait_all(mut self) -> Result<Vec<(String, SecretValue)>, StoreError> {
        let mut fetched = Vec::with_capacity(self.submitted);
        let mut first_error = None;

        while let Some(joined) = self.tasks.join_next().await {
            match joined {
                Ok((index, id, Ok(value))) => fetched.push((index, id, value)),
                Ok((_, id, Err(e))) => {
                    tracing::debug!(secret.name = %id, error = %e, "Secret fetch failed");
                    first_error.get_or_insert(e);
                }
                Err(join_error) => {
                    first_error.get_or_insert(StoreError::Unavailable(format!(
                        "fetch task failed: {join_error}"
                    )));
                }
            }
        }

        if let Some(e) = first_error {
            return Err(e);
        }

        fetched.sort_by_key(|(index, _, _)| *index);
        Ok(fetched.into_iter().map(|(_, id, value)| (id, value)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::{fetch_hook, InMemorySecretStore};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_results_follow_submission_order() {
        let store = InMemorySecretStore::new();
        for i in 0..10 {
            store.put(format!("s{i}"), format!("v{i}"));
        }
        let mut fetcher = BoundedFetcher::new(Arc::new(store), 3);
        for i in 0..10 {
            fetcher.submit(format!("s{i}"));
        }
        assert_eq!(fetcher.submitted(), 10);

        let fetched = fetcher.wait_all().await.unwrap();
        let ids: Vec<_> = fetched.iter().map(|(id, _)| id.clone()).collect();
        let expected: Vec<_> = (0..10).map(|i| format!("s{i}")).collect();
        assert_eq!(ids, expected);
        assert_eq!(fetched[4].1.value, "v4");
    }

    #[tokio::test]
    async fn test_never_exceeds_limit() {
        let store = InMemorySecretStore::new();
        let current = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        {
            let current = Arc::clone(&current);
            let peak = Arc::clone(&peak);
            store.set_fetch_hook(Some(fetch_hook(move |_name| {
                let current = Arc::clone(&current);
                let peak = Arc::clone(&peak);
                async move {
                    let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    current.fetch_sub(1, Ordering::SeqCst);
                }
            })));
        }
        for i in 0..20 {
            store.put(format!("s{i}"), "v");
        }

        let mut fetcher = BoundedFetcher::new(Arc::new(store), 4);
        for i in 0..20 {
            fetcher.submit(format!("s{i}"));
        }
        fetcher.wait_all().await.unwrap();

        assert!(peak.load(Ordering::SeqCst) <= 4);
        assert!(peak.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test]
    async fn test_one_failure_fails_the_batch_after_all_complete() {
        let store = InMemorySecretStore::new();
        store.put("ok1", "1");
        store.put("ok2", "2");
        let shared = store.clone();

        let mut fetcher = BoundedFetcher::new(Arc::new(store), 2);
        fetcher.submit("ok1".to_string());
        fetcher.submit("missing".to_string());
        fetcher.submit("ok2".to_string());

        let err = fetcher.wait_all().await.unwrap_err();
        assert_eq!(err, StoreError::NotFound("missing".to_string()));
        assert_eq!(shared.fetch_count(), 3);
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let fetcher = BoundedFetcher::new(Arc::new(InMemorySecretStore::new()), 32);
        assert!(fetcher.wait_all().await.unwrap().is_empty());
    }
}
