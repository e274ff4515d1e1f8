//! # Provider Settings
//!
//! Deployment settings loaded from environment variables.
//!
//! | Variable | Default |
//! |---|---|
//! | `KEYVAULT_URL` | none |
//! | `KEYVAULT_SECTION_PREFIX` | `secrets` |
//! | `KEYVAULT_SECRETS` | empty (comma list) |
//! | `KEYVAULT_SECRET_MAP` | empty (`id=key` comma list) |
//! | `KEYVAULT_RELOAD_INTERVAL_SECS` | `0` (disabled) |
//! | `KEYVAULT_RETRY_ATTEMPTS` | `12` |
//! | `KEYVAULT_RETRY_DELAY_SECS` | `5` |
//! | `KEYVAULT_AUTH` | `managed-identity` |
//! | `KEYVAULT_ACCESS_TOKEN` | none |
//! | `AZURE_CLIENT_ID` | none |
//! | `AZURE_AUTHORITY_HOST` | none (public cloud) |
//! | `METRICS_PORT` | `5000` |
//! | `LOG_LEVEL` | `INFO` |
//! | `LOG_FORMAT` | `json` |

use crate::constants::{
    DEFAULT_METRICS_PORT, DEFAULT_RETRY_ATTEMPTS, DEFAULT_RETRY_DELAY_SECS, DEFAULT_SECTION_PREFIX,
};
use crate::retry::RetryPolicy;
use crate::store::azure::authority::AzureCloud;
use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::time::Duration;

/// Logging settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    /// ERROR, WARN, INFO, DEBUG or TRACE
    pub level: String,
    /// `json` or `text`
    pub format: String,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "INFO".to_string(),
            format: "json".to_string(),
        }
    }
}

/// Settings for running a provider against Key Vault
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderSettings {
    pub vault_url: Option<String>,
    pub section_prefix: String,
    pub secrets: Vec<String>,
    pub secret_map: BTreeMap<String, String>,
    /// Seconds between recurring passes, 0 disables them
    pub reload_interval_secs: u64,
    pub retry_attempts: u32,
    pub retry_delay_secs: u64,
    pub auth: String,
    pub access_token: Option<String>,
    pub client_id: Option<String>,
    pub authority_host: Option<String>,
    pub metrics_port: u16,
    pub log: LogSettings,
}

impl std::fmt::Debug for ProviderSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderSettings")
            .field("vault_url", &self.vault_url)
            .field("section_prefix", &self.section_prefix)
            .field("secrets", &self.secrets)
            .field("secret_map", &self.secret_map)
            .field("reload_interval_secs", &self.reload_interval_secs)
            .field("retry_attempts", &self.retry_attempts)
            .field("retry_delay_secs", &self.retry_delay_secs)
            .field("auth", &self.auth)
            .field("access_token", &self.access_token.as_ref().map(|_| "***"))
            .field("client_id", &self.client_id)
            .field("authority_host", &self.authority_host)
            .field("metrics_port", &self.metrics_port)
            .field("log", &self.log)
            .finish()
    }
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            vault_url: None,
            section_prefix: DEFAULT_SECTION_PREFIX.to_string(),
            secrets: Vec::new(),
            secret_map: BTreeMap::new(),
            reload_interval_secs: 0,
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            retry_delay_secs: DEFAULT_RETRY_DELAY_SECS,
            auth: "managed-identity".to_string(),
            access_token: None,
            client_id: None,
            authority_host: None,
            metrics_port: DEFAULT_METRICS_PORT,
            log: LogSettings::default(),
        }
    }
}

impl ProviderSettings {
    /// Load settings from environment variables with defaults
    ///
    /// # Errors
    /// Returns an error if `KEYVAULT_SECRET_MAP` is malformed.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load settings through an arbitrary variable lookup
    ///
    /// # Errors
    /// Returns an error if `KEYVAULT_SECRET_MAP` is malformed.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let secret_map = match non_empty(&lookup, "KEYVAULT_SECRET_MAP") {
            Some(raw) => parse_secret_map(&raw).context("Invalid KEYVAULT_SECRET_MAP")?,
            None => BTreeMap::new(),
        };

        Ok(Self {
            vault_url: non_empty(&lookup, "KEYVAULT_URL"),
            section_prefix: env_var_or_default_str(
                &lookup,
                "KEYVAULT_SECTION_PREFIX",
                DEFAULT_SECTION_PREFIX,
            ),
            secrets: non_empty(&lookup, "KEYVAULT_SECRETS")
                .map(|raw| parse_list(&raw))
                .unwrap_or_default(),
            secret_map,
            reload_interval_secs: env_var_or_default(&lookup, "KEYVAULT_RELOAD_INTERVAL_SECS", 0),
            retry_attempts: env_var_or_default(
                &lookup,
                "KEYVAULT_RETRY_ATTEMPTS",
                DEFAULT_RETRY_ATTEMPTS,
            ),
            retry_delay_secs: env_var_or_default(
                &lookup,
                "KEYVAULT_RETRY_DELAY_SECS",
                DEFAULT_RETRY_DELAY_SECS,
            ),
            auth: env_var_or_default_str(&lookup, "KEYVAULT_AUTH", "managed-identity"),
            access_token: non_empty(&lookup, "KEYVAULT_ACCESS_TOKEN"),
            client_id: non_empty(&lookup, "AZURE_CLIENT_ID"),
            authority_host: non_empty(&lookup, "AZURE_AUTHORITY_HOST"),
            metrics_port: env_var_or_default(&lookup, "METRICS_PORT", DEFAULT_METRICS_PORT),
            log: LogSettings {
                level: env_var_or_default_str(&lookup, "LOG_LEVEL", "INFO"),
                format: env_var_or_default_str(&lookup, "LOG_FORMAT", "json"),
            },
        })
    }

    /// Recurring reload interval, `None` when disabled
    #[must_use]
    pub fn reload_interval(&self) -> Option<Duration> {
        (self.reload_interval_secs > 0).then(|| Duration::from_secs(self.reload_interval_secs))
    }

    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retry_attempts, Duration::from_secs(self.retry_delay_secs))
    }

    /// Azure cloud selected by `AZURE_AUTHORITY_HOST`, public cloud when unset or unknown
    #[must_use]
    pub fn cloud(&self) -> AzureCloud {
        self.authority_host
            .as_deref()
            .and_then(AzureCloud::from_authority_host)
            .unwrap_or_default()
    }
}

/// Split a comma list, trimming entries and dropping empty ones
#[must_use]
pub fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse an `id=key` comma list
///
/// # Errors
/// Returns an error for an entry without `=` or with an empty side.
pub fn parse_secret_map(raw: &str) -> Result<BTreeMap<String, String>> {
    parse_list(raw)
        .into_iter()
        .map(|pair| {
            let (id, key) = pair
                .split_once('=')
                .with_context(|| format!("expected id=key, got {pair}"))?;
            let (id, key) = (id.trim(), key.trim());
            anyhow::ensure!(!id.is_empty() && !key.is_empty(), "expected id=key, got {pair}");
            Ok((id.to_string(), key.to_string()))
        })
        .collect()
}

fn non_empty<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).filter(|v| !v.trim().is_empty())
}

/// Read variable or return default value
fn env_var_or_default<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Read variable as string or return default
fn env_var_or_default_str<F>(lookup: &F, key: &str, default: &str) -> String
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).unwrap_or_else(|| default.to_string())
}
