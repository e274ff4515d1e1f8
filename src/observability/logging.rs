//! # Logging
//!
//! `tracing-subscriber` setup for the binary.
//!
//! `RUST_LOG` wins when set; otherwise the configured level applies to this crate.

use crate::config::LogSettings;
use tracing::warn;
use tracing_subscriber::EnvFilter;

/// Directive used when `RUST_LOG` is unset
#[must_use]
pub fn default_directive(level: &str) -> String {
    let level = match level.trim().to_ascii_lowercase().as_str() {
        "error" => "error",
        "warn" | "warning" => "warn",
        "debug" => "debug",
        "trace" => "trace",
        _ => "info",
    };
    format!("keyvault_configuration={level},kvconfig={level}")
}

/// Install the global subscriber in `json` or `text` format
///
/// A second call leaves the existing subscriber in place.
pub fn init_tracing(settings: &LogSettings) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_directive(&settings.level).into());

    let result = if settings.format.eq_ignore_ascii_case("text") {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .try_init()
    } else {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .try_init()
    };

    if let Err(e) = result {
        warn!("Tracing subscriber already initialized: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directive_normalizes_level() {
        assert_eq!(
            default_directive("DEBUG"),
            "keyvault_configuration=debug,kvconfig=debug"
        );
        assert_eq!(
            default_directive("WARNING"),
            "keyvault_configuration=warn,kvconfig=warn"
        );
        assert_eq!(
            default_directive("verbose"),
            "keyvault_configuration=info,kvconfig=info"
        );
    }
}
