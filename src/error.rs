//! # Errors
//!
//! Error types for the secret store capability and the configuration surface.
//!
//! - [`StoreError`] is raised by a [`SecretStore`](crate::store::SecretStore) implementation.
//! - [`ProviderError`] is what callers of the provider observe.

use thiserror::Error;

/// Failure reported by a remote secret store
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The named secret does not exist (or has no readable version)
    #[error("secret {0} not found")]
    NotFound(String),
    /// The caller's identity was rejected by the store
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Transport failure, throttling, server error or an unreadable response
    #[error("secret store unavailable: {0}")]
    Unavailable(String),
}

/// Error surfaced by [`KeyVaultConfigurationProvider`](crate::KeyVaultConfigurationProvider)
#[derive(Debug, Error)]
pub enum ProviderError {
    /// A required construction input is missing or invalid
    #[error("invalid provider configuration: {0}")]
    Configuration(String),
    /// Enumeration or fetch against the secret store failed
    #[error("secret store request failed: {0}")]
    RemoteUnavailable(#[from] StoreError),
    /// The requested key is absent from the published snapshot
    #[error("configuration key {0} not found")]
    KeyNotFound(String),
    /// The provider was disposed and its reload loop torn down
    #[error("provider has been disposed")]
    Cancelled,
}

impl ProviderError {
    /// Whether retrying the same operation later can succeed
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, ProviderError::RemoteUnavailable(_))
    }
}
