//! # Azure Key Vault Store
//!
//! [`SecretStore`] backed by the Azure Key Vault REST API.
//!
//! Requests carry a bearer token from an `azure_core` `TokenCredential`
//! (see [`auth`]). Bare vault names expand to the cloud's vault host
//! (see [`authority`]).

pub mod auth;
pub mod authority;
mod client;

use crate::error::StoreError;
use crate::store::{MetadataStream, SecretStore, SecretValue};
use anyhow::{Context, Result};
use async_trait::async_trait;
use authority::AzureCloud;
use azure_core::credentials::TokenCredential;
use std::sync::Arc;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Key Vault secret store over REST
pub struct AzureKeyVaultStore {
    http: reqwest::Client,
    vault_url: String,
    scope: String,
    credential: Arc<dyn TokenCredential>,
}

impl std::fmt::Debug for AzureKeyVaultStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureKeyVaultStore")
            .field("vault_url", &self.vault_url)
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

/// Normalise a vault name or URL to a base URL ending in `/`
///
/// # Errors
/// Returns an error when the vault is empty.
pub fn normalize_vault_url(vault: &str, cloud: AzureCloud) -> Result<String> {
    let vault = vault.trim();
    anyhow::ensure!(!vault.is_empty(), "Key Vault name or URL is required");

    let url = if vault.starts_with("https://") || vault.starts_with("http://") {
        vault.to_string()
    } else {
        format!("https://{}.{}/", vault, cloud.key_vault_dns_suffix())
    };

    if url.ends_with('/') {
        Ok(url)
    } else {
        Ok(format!("{url}/"))
    }
}

impl AzureKeyVaultStore {
    /// Create a store for a vault name or URL
    ///
    /// # Errors
    /// Returns an error if the vault is empty or the HTTP client cannot be built.
    pub fn new(
        vault: &str,
        cloud: AzureCloud,
        credential: Arc<dyn TokenCredential>,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build Key Vault HTTP client")?;
        Self::with_client(http, vault, cloud, credential)
    }

    /// Create a store with a caller-supplied HTTP client
    ///
    /// # Errors
    /// Returns an error if the vault is empty.
    pub fn with_client(
        http: reqwest::Client,
        vault: &str,
        cloud: AzureCloud,
        credential: Arc<dyn TokenCredential>,
    ) -> Result<Self> {
        Ok(Self {
            http,
            vault_url: normalize_vault_url(vault, cloud)?,
            scope: cloud.key_vault_scope(),
            credential,
        })
    }

    #[must_use]
    pub fn vault_url(&self) -> &str {
        &self.vault_url
    }
}

#[async_trait]
impl SecretStore for AzureKeyVaultStore {
    fn list_secrets(&self) -> MetadataStream<'_> {
        self.paged(self.list_secrets_url(), "list_secrets", "secrets")
    }

    fn list_versions<'a>(&'a self, name: &'a str) -> MetadataStream<'a> {
        self.paged(self.list_versions_url(name), "list_versions", name)
    }

    async fn fetch_value(&self, name: &str) -> Result<SecretValue, StoreError> {
        self.get_secret(name).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_name_expands_to_vault_host() {
        assert_eq!(
            normalize_vault_url("my-vault", AzureCloud::Public).unwrap(),
            "https://my-vault.vault.azure.net/"
        );
        assert_eq!(
            normalize_vault_url("my-vault", AzureCloud::China).unwrap(),
            "https://my-vault.vault.azure.cn/"
        );
    }

    #[test]
    fn test_url_gets_trailing_slash() {
        assert_eq!(
            normalize_vault_url("https://my-vault.vault.azure.net", AzureCloud::Public).unwrap(),
            "https://my-vault.vault.azure.net/"
        );
        assert_eq!(
            normalize_vault_url("http://127.0.0.1:8080/", AzureCloud::Public).unwrap(),
            "http://127.0.0.1:8080/"
        );
    }

    #[test]
    fn test_empty_vault_is_rejected() {
        assert!(normalize_vault_url("  ", AzureCloud::Public).is_err());
    }
}
