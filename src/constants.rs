//! # Constants
//!
//! Shared constants used throughout the provider.
//!
//! These values represent reasonable defaults and can be overridden via
//! `ProviderOptions` or environment variables where applicable.

/// Hierarchy delimiter between configuration key segments
pub const KEY_DELIMITER: &str = ":";

/// Substring in secret names that the default key encoder turns into [`KEY_DELIMITER`]
pub const SECRET_NAME_DELIMITER: &str = "--";

/// Default configuration section that loaded secrets are placed under
pub const DEFAULT_SECTION_PREFIX: &str = "secrets";

/// Maximum number of secret fetches in flight during one reconciliation pass
pub const MAX_CONCURRENT_FETCHES: usize = 32;

/// Default number of attempts made by the startup retry wrapper
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 12;

/// Default delay between startup retry attempts (seconds)
pub const DEFAULT_RETRY_DELAY_SECS: u64 = 5;

/// Key Vault REST API version used for every request
pub const KEY_VAULT_API_VERSION: &str = "7.4";

/// OAuth scope requested for Key Vault data-plane tokens
pub const KEY_VAULT_SCOPE: &str = "https://vault.azure.net/.default";

/// DNS suffix appended to bare vault names
pub const KEY_VAULT_DNS_SUFFIX: &str = "vault.azure.net";

/// Default HTTP server port for metrics and health probes
pub const DEFAULT_METRICS_PORT: u16 = 5000;
