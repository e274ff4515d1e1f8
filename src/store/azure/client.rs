//! # Key Vault REST Client
//!
//! Raw REST calls against the Key Vault data plane.
//!
//! Endpoints used (all with `api-version=7.4`):
//! - `GET {vault}/secrets` - list secrets, paged through `nextLink`
//! - `GET {vault}/secrets/{name}/versions` - list versions of one secret, paged
//! - `GET {vault}/secrets/{name}` - current value of one secret

use super::AzureKeyVaultStore;
use crate::constants::KEY_VAULT_API_VERSION;
use crate::error::StoreError;
use crate::observability::metrics;
use crate::store::{MetadataStream, SecretMetadata, SecretValue};
use azure_core::credentials::TokenRequestOptions;
use chrono::{DateTime, Utc};
use futures::{StreamExt, TryStreamExt};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Instant;
use tracing::debug;

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SecretAttributes {
    #[serde(default)]
    pub enabled: Option<bool>,
    /// Unix seconds
    #[serde(default)]
    pub updated: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SecretItem {
    pub id: String,
    #[serde(default)]
    pub attributes: SecretAttributes,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SecretListPage {
    #[serde(default)]
    pub value: Vec<SecretItem>,
    #[serde(default)]
    pub next_link: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SecretBundle {
    pub value: Option<String>,
    #[serde(default)]
    pub attributes: SecretAttributes,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

/// Secret name from an item id such as `https://v.vault.azure.net/secrets/{name}[/{version}]`
pub(crate) fn secret_name_from_id(id: &str) -> Option<String> {
    let url = reqwest::Url::parse(id).ok()?;
    let mut segments = url.path_segments()?;
    segments.by_ref().find(|segment| *segment == "secrets")?;
    segments
        .next()
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}

fn timestamp(secs: Option<i64>) -> Option<DateTime<Utc>> {
    secs.and_then(|secs| DateTime::from_timestamp(secs, 0))
}

impl SecretItem {
    fn into_metadata(self) -> Option<SecretMetadata> {
        let name = secret_name_from_id(&self.id)?;
        Some(SecretMetadata::new(
            name,
            self.attributes.enabled,
            timestamp(self.attributes.updated),
        ))
    }
}

/// Map a non-success response to a store error
pub(crate) fn status_error(status: StatusCode, body: &str, subject: &str) -> StoreError {
    let detail = serde_json::from_str::<ErrorEnvelope>(body).map_or_else(
        |_| format!("HTTP {}: {}", status.as_u16(), body.trim()),
        |envelope| {
            format!(
                "HTTP {} ({}): {}",
                status.as_u16(),
                envelope.error.code,
                envelope.error.message
            )
        },
    );
    match status {
        StatusCode::NOT_FOUND => StoreError::NotFound(subject.to_string()),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => StoreError::Unauthorized(detail),
        _ => StoreError::Unavailable(detail),
    }
}

impl AzureKeyVaultStore {
    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}{}?api-version={}",
            self.vault_url, path, KEY_VAULT_API_VERSION
        )
    }

    async fn bearer_token(&self) -> Result<String, StoreError> {
        let scope = self.scope.as_str();
        let token = self
            .credential
            .get_token(&[scope], Some(TokenRequestOptions::default()))
            .await
            .map_err(|e| StoreError::Unauthorized(format!("failed to acquire token: {e}")))?;
        Ok(token.token.secret().to_string())
    }

    async fn send_get<T: DeserializeOwned>(
        &self,
        url: &str,
        subject: &str,
    ) -> Result<T, StoreError> {
        let token = self.bearer_token().await?;
        let response = self
            .http
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| StoreError::Unavailable(format!("request to Key Vault failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, &body, subject));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| StoreError::Unavailable(format!("invalid Key Vault response: {e}")))
    }

    /// GET with per-operation metrics
    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        operation: &'static str,
        subject: &str,
    ) -> Result<T, StoreError> {
        let start = Instant::now();
        let result = self.send_get(url, subject).await;
        metrics::record_store_operation(operation, start.elapsed().as_secs_f64());
        if let Err(e) = &result {
            debug!(operation, error = %e, "Key Vault request failed");
            metrics::increment_store_operation_errors(operation);
        }
        result
    }

    /// Stream every item of a paged listing, following `nextLink` lazily
    pub(crate) fn paged<'a>(
        &'a self,
        first_page: String,
        operation: &'static str,
        subject: &'a str,
    ) -> MetadataStream<'a> {
        futures::stream::try_unfold(Some(first_page), move |next| async move {
            let Some(url) = next else {
                return Ok(None);
            };
            let page: SecretListPage = self.get_json(&url, operation, subject).await?;
            let items: Vec<Result<SecretMetadata, StoreError>> = page
                .value
                .into_iter()
                .filter_map(SecretItem::into_metadata)
                .map(Ok)
                .collect();
            let next = page.next_link.filter(|link| !link.is_empty());
            Ok(Some((futures::stream::iter(items), next)))
        })
        .try_flatten()
        .boxed()
    }

    pub(crate) fn list_secrets_url(&self) -> String {
        self.endpoint("secrets")
    }

    pub(crate) fn list_versions_url(&self, name: &str) -> String {
        self.endpoint(&format!("secrets/{name}/versions"))
    }

    pub(crate) async fn get_secret(&self, name: &str) -> Result<SecretValue, StoreError> {
        let url = self.endpoint(&format!("secrets/{name}"));
        let bundle: SecretBundle = self.get_json(&url, "get_secret", name).await?;
        let value = bundle
            .value
            .ok_or_else(|| StoreError::Unavailable(format!("secret {name} has no value")))?;
        Ok(SecretValue {
            name: name.to_string(),
            value,
            updated: timestamp(bundle.attributes.updated),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_name_from_id() {
        assert_eq!(
            secret_name_from_id("https://myvault.vault.azure.net/secrets/Db--Password"),
            Some("Db--Password".to_string())
        );
        assert_eq!(
            secret_name_from_id("https://myvault.vault.azure.net/secrets/Db/0123abcd"),
            Some("Db".to_string())
        );
        assert_eq!(secret_name_from_id("https://myvault.vault.azure.net/keys/k"), None);
        assert_eq!(secret_name_from_id("not a url"), None);
    }

    #[test]
    fn test_list_page_parses_camel_case() {
        let body = r#"{
            "value": [
                {
                    "id": "https://v.vault.azure.net/secrets/A",
                    "attributes": {"enabled": true, "updated": 1700000000}
                },
                {"id": "https://v.vault.azure.net/secrets/B", "attributes": {}}
            ],
            "nextLink": "https://v.vault.azure.net/secrets?api-version=7.4&$skiptoken=abc"
        }"#;
        let page: SecretListPage = serde_json::from_str(body).unwrap();
        assert_eq!(page.value.len(), 2);
        assert!(page.next_link.is_some());

        let metadata: Vec<_> = page
            .value
            .into_iter()
            .filter_map(SecretItem::into_metadata)
            .collect();
        assert_eq!(metadata[0].enabled, Some(true));
        assert_eq!(metadata[0].updated, DateTime::from_timestamp(1_700_000_000, 0));
        assert_eq!(metadata[1].enabled, None);
        assert_eq!(metadata[1].updated, None);
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            status_error(StatusCode::NOT_FOUND, "", "Db"),
            StoreError::NotFound("Db".to_string())
        );
        assert!(matches!(
            status_error(StatusCode::FORBIDDEN, "", "Db"),
            StoreError::Unauthorized(_)
        ));
        assert!(matches!(
            status_error(StatusCode::UNAUTHORIZED, "", "Db"),
            StoreError::Unauthorized(_)
        ));
        assert!(matches!(
            status_error(StatusCode::TOO_MANY_REQUESTS, "", "Db"),
            StoreError::Unavailable(_)
        ));
    }

    #[test]
    fn test_status_error_includes_key_vault_error_code() {
        let body = r#"{"error":{"code":"Throttled","message":"slow down"}}"#;
        let err = status_error(StatusCode::SERVICE_UNAVAILABLE, body, "Db");
        assert_eq!(
            err,
            StoreError::Unavailable("HTTP 503 (Throttled): slow down".to_string())
        );
    }
}
