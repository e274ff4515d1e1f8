//! Reload tests
//!
//! Background passes driven through a gated reload waiter, so each pass starts
//! exactly when the test releases it.

mod common;

use chrono::DateTime;
use common::gated_provider;
use keyvault_configuration::store::memory::InMemorySecretStore;
use keyvault_configuration::{ProviderError, ProviderOptions, StoreError};
use std::time::Duration;

#[tokio::test]
async fn test_removed_secret_signals_once_and_disappears() {
    let store = InMemorySecretStore::new();
    store.put("Secret1", "Value1");
    store.put("Secret2", "Value2");
    let (provider, gate) = gated_provider(&store, ProviderOptions::default());
    provider.load().await.unwrap();
    let token = provider.reload_token();
    assert!(!token.has_changed());

    store.remove("Secret2");
    gate.run_pass().await;

    assert!(token.has_changed());
    assert_eq!(token.generation(), 1);
    assert!(matches!(
        provider.get("secrets:Secret2"),
        Err(ProviderError::KeyNotFound(_))
    ));
    assert_eq!(provider.get("secrets:Secret1").unwrap(), "Value1");

    gate.run_pass().await;
    assert_eq!(provider.reload_token().generation(), 1);
    provider.shutdown().await;
}

#[tokio::test]
async fn test_disabled_secret_is_dropped_on_reload() {
    let store = InMemorySecretStore::new();
    store.put("Secret1", "Value1");
    store.put("Secret2", "Value2");
    let (provider, gate) = gated_provider(&store, ProviderOptions::default());
    provider.load().await.unwrap();
    assert_eq!(provider.get("secrets:Secret2").unwrap(), "Value2");
    let token = provider.reload_token();

    store.set_enabled("Secret2", Some(false));
    gate.run_pass().await;

    assert_eq!(token.generation(), 1);
    assert!(matches!(
        provider.get("secrets:Secret2"),
        Err(ProviderError::KeyNotFound(_))
    ));
    assert_eq!(provider.get("secrets:Secret1").unwrap(), "Value1");
    assert_eq!(store.fetch_count_for("Secret2"), 1);
    provider.shutdown().await;
}

#[tokio::test]
async fn test_unchanged_store_never_signals() {
    let store = InMemorySecretStore::new();
    store.set("Secret1", "Value1", Some(true), DateTime::from_timestamp(100, 0));
    let (provider, gate) = gated_provider(&store, ProviderOptions::default());
    provider.load().await.unwrap();
    let token = provider.reload_token();

    gate.run_pass().await;
    gate.run_pass().await;

    assert!(!token.has_changed());
    assert_eq!(store.fetch_count_for("Secret1"), 1);
    assert_eq!(provider.pass_count(), 3);
    provider.shutdown().await;
}

#[tokio::test]
async fn test_updated_secret_is_visible_after_signal() {
    let store = InMemorySecretStore::new();
    store.set("Db--Password", "old", Some(true), DateTime::from_timestamp(1, 0));
    let (provider, gate) = gated_provider(&store, ProviderOptions::default());
    provider.load().await.unwrap();
    let mut token = provider.reload_token();

    store.put_version("Db--Password", "new", Some(true), DateTime::from_timestamp(2, 0));
    gate.run_pass().await;

    let generation = tokio::time::timeout(Duration::from_secs(5), token.changed())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(generation, 1);
    assert_eq!(provider.get("secrets:Db:Password").unwrap(), "new");
    provider.shutdown().await;
}

#[tokio::test]
async fn test_newly_added_secret_signals() {
    let store = InMemorySecretStore::new();
    store.put("Secret1", "Value1");
    let (provider, gate) = gated_provider(&store, ProviderOptions::default());
    provider.load().await.unwrap();
    let token = provider.reload_token();

    store.put("Secret2", "Value2");
    gate.run_pass().await;

    assert!(token.has_changed());
    assert_eq!(provider.get("secrets:Secret2").unwrap(), "Value2");
    provider.shutdown().await;
}

#[tokio::test]
async fn test_failed_background_pass_keeps_configuration() {
    let store = InMemorySecretStore::new();
    store.put("Secret1", "Value1");
    let (provider, gate) = gated_provider(&store, ProviderOptions::default());
    provider.load().await.unwrap();
    let token = provider.reload_token();

    store.remove("Secret1");
    store.fail_listing(Some(StoreError::Unavailable("throttled".to_string())));
    gate.run_pass().await;

    assert!(!token.has_changed());
    assert_eq!(provider.get("secrets:Secret1").unwrap(), "Value1");
    assert!(provider.is_polling());

    store.clear_failures();
    gate.run_pass().await;
    assert!(token.has_changed());
    assert_eq!(provider.try_get("secrets:Secret1"), None);
    provider.shutdown().await;
}

#[tokio::test]
async fn test_emptied_store_signals_and_publishes_empty() {
    let store = InMemorySecretStore::new();
    store.put("Secret1", "Value1");
    let (provider, gate) = gated_provider(&store, ProviderOptions::default());
    provider.load().await.unwrap();
    let token = provider.reload_token();

    store.clear();
    gate.run_pass().await;

    assert!(token.has_changed());
    assert!(provider.keys().is_empty());
    provider.shutdown().await;
}

#[tokio::test]
async fn test_dispose_stops_background_passes() {
    let store = InMemorySecretStore::new();
    store.put("Secret1", "Value1");
    let (provider, gate) = gated_provider(&store, ProviderOptions::default());
    provider.load().await.unwrap();
    gate.run_pass().await;
    assert!(provider.is_polling());

    provider.shutdown().await;

    assert!(!provider.is_polling());
    assert_eq!(provider.pass_count(), 2);
    assert_eq!(gate.arrivals(), 2);
}

#[tokio::test]
async fn test_on_demand_load_does_not_start_second_loop() {
    let store = InMemorySecretStore::new();
    store.put("Secret1", "Value1");
    let (provider, gate) = gated_provider(&store, ProviderOptions::default());
    provider.load().await.unwrap();
    provider.load().await.unwrap();
    gate.run_pass().await;

    assert_eq!(gate.arrivals(), 2);
    assert_eq!(provider.pass_count(), 3);
    provider.shutdown().await;
}
