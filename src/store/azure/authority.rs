//! # Azure Authority Table
//!
//! Static lookup of Azure national clouds: login authority hosts, device-code
//! redirect URIs, Key Vault DNS suffixes and well-known resource ids.

use crate::constants::KEY_VAULT_DNS_SUFFIX;
use std::fmt;
use std::str::FromStr;

/// An Azure national cloud
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AzureCloud {
    #[default]
    Public,
    China,
    Germany,
    UsGovernment,
}

impl AzureCloud {
    pub const ALL: [AzureCloud; 4] = [
        AzureCloud::Public,
        AzureCloud::China,
        AzureCloud::Germany,
        AzureCloud::UsGovernment,
    ];

    /// Login authority host, always ending in `/`
    #[must_use]
    pub fn authority_host(self) -> &'static str {
        match self {
            AzureCloud::Public => "https://login.microsoftonline.com/",
            AzureCloud::China => "https://login.chinacloudapi.cn/",
            AzureCloud::Germany => "https://login.microsoftonline.de/",
            AzureCloud::UsGovernment => "https://login.microsoftonline.us/",
        }
    }

    /// Redirect URI used by the device-code flow
    #[must_use]
    pub fn device_code_redirect_uri(self) -> String {
        format!("{}common/oauth2/nativeclient", self.authority_host())
    }

    /// DNS suffix appended to a bare vault name
    #[must_use]
    pub fn key_vault_dns_suffix(self) -> &'static str {
        match self {
            AzureCloud::Public => KEY_VAULT_DNS_SUFFIX,
            AzureCloud::China => "vault.azure.cn",
            AzureCloud::Germany => "vault.microsoftazure.de",
            AzureCloud::UsGovernment => "vault.usgovcloudapi.net",
        }
    }

    /// OAuth scope for Key Vault data-plane tokens
    #[must_use]
    pub fn key_vault_scope(self) -> String {
        format!("https://{}/.default", self.key_vault_dns_suffix())
    }

    /// Resolve a cloud from an authority host such as `AZURE_AUTHORITY_HOST`
    ///
    /// Scheme and trailing `/` are ignored. Unknown hosts return `None`.
    #[must_use]
    pub fn from_authority_host(host: &str) -> Option<Self> {
        let wanted = bare_host(host);
        Self::ALL
            .into_iter()
            .find(|cloud| bare_host(cloud.authority_host()).eq_ignore_ascii_case(wanted))
    }
}

fn bare_host(host: &str) -> &str {
    let host = host.trim();
    let host = host
        .strip_prefix("https://")
        .or_else(|| host.strip_prefix("http://"))
        .unwrap_or(host);
    host.trim_end_matches('/')
}

impl fmt::Display for AzureCloud {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AzureCloud::Public => "AzureCloud",
            AzureCloud::China => "AzureChinaCloud",
            AzureCloud::Germany => "AzureGermanCloud",
            AzureCloud::UsGovernment => "AzureUSGovernment",
        };
        f.write_str(name)
    }
}

impl FromStr for AzureCloud {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "public" | "azurecloud" | "azurepubliccloud" => Ok(AzureCloud::Public),
            "china" | "azurechinacloud" => Ok(AzureCloud::China),
            "germany" | "azuregermancloud" => Ok(AzureCloud::Germany),
            "usgovernment" | "usgov" | "azureusgovernment" | "azureusgovernmentcloud" => {
                Ok(AzureCloud::UsGovernment)
            }
            other => Err(format!("unknown Azure cloud: {other}")),
        }
    }
}

/// Well-known Azure resource identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AzureResource {
    KeyVault,
    Graph,
    ResourceManager,
    Sql,
    DataLake,
}

impl AzureResource {
    #[must_use]
    pub fn id(self) -> &'static str {
        match self {
            AzureResource::KeyVault => "https://vault.azure.net/",
            AzureResource::Graph => "https://graph.windows.net/",
            AzureResource::ResourceManager => "https://management.azure.com/",
            AzureResource::Sql => "https://database.windows.net/",
            AzureResource::DataLake => "https://datalake.azure.net/",
        }
    }
}
