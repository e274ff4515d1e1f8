//! # Azure Authentication
//!
//! Builds the `TokenCredential` used to authorize Key Vault requests.
//!
//! Supported methods:
//! - **Managed Identity** (default in AKS, App Service and VMs)
//! - **Workload Identity** (federated service account token)
//! - **Static token** for local emulators and mock endpoints

use anyhow::{Context, Result};
use async_trait::async_trait;
use azure_core::credentials::{AccessToken, Secret, TokenCredential, TokenRequestOptions};
use azure_identity::{ManagedIdentityCredential, WorkloadIdentityCredential};
use std::sync::Arc;
use tracing::{debug, info};

/// Authentication method for the Key Vault store
#[derive(Clone, PartialEq, Eq, Default)]
pub enum AzureAuth {
    #[default]
    ManagedIdentity,
    WorkloadIdentity {
        client_id: String,
    },
    StaticToken(String),
}

impl std::fmt::Debug for AzureAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AzureAuth::ManagedIdentity => f.write_str("ManagedIdentity"),
            AzureAuth::WorkloadIdentity { client_id } => f
                .debug_struct("WorkloadIdentity")
                .field("client_id", client_id)
                .finish(),
            AzureAuth::StaticToken(_) => f.write_str("StaticToken(***)"),
        }
    }
}

impl AzureAuth {
    /// Resolve the method from its settings name
    ///
    /// Names: `managed-identity`, `workload-identity` (requires a client id) and
    /// `static-token` (requires a token).
    ///
    /// # Errors
    /// Returns an error for an unknown method or a missing required value.
    pub fn parse(kind: &str, client_id: Option<&str>, token: Option<&str>) -> Result<Self> {
        match kind.trim().to_ascii_lowercase().as_str() {
            "" | "managed-identity" | "managedidentity" => Ok(AzureAuth::ManagedIdentity),
            "workload-identity" | "workloadidentity" => {
                let client_id = client_id
                    .filter(|id| !id.trim().is_empty())
                    .context("workload identity requires AZURE_CLIENT_ID")?;
                Ok(AzureAuth::WorkloadIdentity {
                    client_id: client_id.to_string(),
                })
            }
            "static-token" | "statictoken" => {
                let token = token
                    .filter(|t| !t.trim().is_empty())
                    .context("static token authentication requires KEYVAULT_ACCESS_TOKEN")?;
                Ok(AzureAuth::StaticToken(token.to_string()))
            }
            other => anyhow::bail!("unsupported Key Vault authentication method: {other}"),
        }
    }
}

/// Build the credential for an authentication method
///
/// # Errors
/// Returns an error if the Azure identity credential cannot be created.
pub fn build_credential(auth: &AzureAuth) -> Result<Arc<dyn TokenCredential>> {
    let credential: Arc<dyn TokenCredential> = match auth {
        AzureAuth::WorkloadIdentity { client_id } => {
            info!(
                "Using Azure Workload Identity authentication with client ID: {}",
                client_id
            );
            let options = azure_identity::WorkloadIdentityCredentialOptions {
                client_id: Some(client_id.clone()),
                ..Default::default()
            };
            WorkloadIdentityCredential::new(Some(options))
                .context("Failed to create WorkloadIdentityCredential")?
        }
        AzureAuth::ManagedIdentity => {
            info!("Using Managed Identity authentication");
            ManagedIdentityCredential::new(None)
                .context("Failed to create ManagedIdentityCredential")?
        }
        AzureAuth::StaticToken(token) => {
            debug!("Using static bearer token credential");
            Arc::new(StaticTokenCredential::new(token.clone()))
        }
    };
    Ok(credential)
}

/// Credential that hands out a fixed bearer token
pub struct StaticTokenCredential {
    token: String,
}

impl StaticTokenCredential {
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl std::fmt::Debug for StaticTokenCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticTokenCredential")
            .field("token", &"***")
            .finish()
    }
}

#[async_trait]
impl TokenCredential for StaticTokenCredential {
    async fn get_token(
        &self,
        _scopes: &[&str],
        _options: Option<TokenRequestOptions<'_>>,
    ) -> azure_core::Result<AccessToken> {
        use typespec_client_core::time::{Duration, OffsetDateTime};

        Ok(AccessToken::new(
            Secret::new(self.token.clone()),
            OffsetDateTime::now_utc() + Duration::seconds(3600),
        ))
    }
}
