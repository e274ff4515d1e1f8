//! # Metrics
//!
//! Prometheus metrics for monitoring configuration reloads.
//!
//! ## Metrics Exposed
//!
//! - `keyvault_config_passes_total` - Total number of reconciliation passes
//! - `keyvault_config_pass_errors_total` - Total number of failed passes
//! - `keyvault_config_pass_duration_seconds` - Duration of reconciliation passes
//! - `keyvault_config_secrets_fetched_total` - Secrets fetched from the store
//! - `keyvault_config_secrets_reused_total` - Secrets reused from the previous snapshot
//! - `keyvault_config_secrets_dropped_total` - Secrets that disappeared between passes
//! - `keyvault_config_keys_published` - Keys in the current snapshot
//! - `keyvault_config_reloads_signalled_total` - Change signals raised
//! - `keyvault_config_store_operations_total` - Store requests by operation
//! - `keyvault_config_store_operation_errors_total` - Failed store requests by operation
//! - `keyvault_config_store_operation_duration_seconds` - Store request duration by operation
//! - `keyvault_config_fetches_in_flight` - Secret fetches currently running

use anyhow::Result;
use prometheus::{Histogram, HistogramVec, IntCounter, IntCounterVec, IntGauge, Registry};
use std::sync::LazyLock;

pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static PASSES_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "keyvault_config_passes_total",
        "Total number of reconciliation passes",
    )
    .expect("Failed to create PASSES_TOTAL metric - this should never happen")
});

static PASS_ERRORS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "keyvault_config_pass_errors_total",
        "Total number of failed reconciliation passes",
    )
    .expect("Failed to create PASS_ERRORS_TOTAL metric - this should never happen")
});

static PASS_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "keyvault_config_pass_duration_seconds",
            "Duration of reconciliation passes in seconds",
        )
        .buckets(vec![0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0]),
    )
    .expect("Failed to create PASS_DURATION metric - this should never happen")
});

static SECRETS_FETCHED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "keyvault_config_secrets_fetched_total",
        "Total number of secret values fetched from the store",
    )
    .expect("Failed to create SECRETS_FETCHED_TOTAL metric - this should never happen")
});

static SECRETS_REUSED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "keyvault_config_secrets_reused_total",
        "Total number of unchanged secrets reused from the previous snapshot",
    )
    .expect("Failed to create SECRETS_REUSED_TOTAL metric - this should never happen")
});

static SECRETS_DROPPED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "keyvault_config_secrets_dropped_total",
        "Total number of secrets that disappeared between passes",
    )
    .expect("Failed to create SECRETS_DROPPED_TOTAL metric - this should never happen")
});

static KEYS_PUBLISHED: LazyLock<IntGauge> = LazyLock::new(|| {
    IntGauge::new(
        "keyvault_config_keys_published",
        "Number of keys in the currently published snapshot",
    )
    .expect("Failed to create KEYS_PUBLISHED metric - this should never happen")
});

static RELOADS_SIGNALLED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "keyvault_config_reloads_signalled_total",
        "Total number of configuration change signals raised",
    )
    .expect("Failed to create RELOADS_SIGNALLED_TOTAL metric - this should never happen")
});

static STORE_OPERATIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "keyvault_config_store_operations_total",
            "Total number of secret store requests by operation",
        ),
        &["operation"],
    )
    .expect("Failed to create STORE_OPERATIONS_TOTAL metric - this should never happen")
});

static STORE_OPERATION_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "keyvault_config_store_operation_errors_total",
            "Total number of failed secret store requests by operation",
        ),
        &["operation"],
    )
    .expect("Failed to create STORE_OPERATION_ERRORS_TOTAL metric - this should never happen")
});

static STORE_OPERATION_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        prometheus::HistogramOpts::new(
            "keyvault_config_store_operation_duration_seconds",
            "Duration of secret store requests in seconds by operation",
        )
        .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0]),
        &["operation"],
    )
    .expect("Failed to create STORE_OPERATION_DURATION metric - this should never happen")
});

static FETCHES_IN_FLIGHT: LazyLock<IntGauge> = LazyLock::new(|| {
    IntGauge::new(
        "keyvault_config_fetches_in_flight",
        "Number of secret fetches currently in flight",
    )
    .expect("Failed to create FETCHES_IN_FLIGHT metric - this should never happen")
});

#[allow(
    clippy::missing_errors_doc,
    reason = "Registration only fails when called twice"
)]
pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(PASSES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(PASS_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(PASS_DURATION.clone()))?;
    REGISTRY.register(Box::new(SECRETS_FETCHED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(SECRETS_REUSED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(SECRETS_DROPPED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(KEYS_PUBLISHED.clone()))?;
    REGISTRY.register(Box::new(RELOADS_SIGNALLED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(STORE_OPERATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(STORE_OPERATION_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(STORE_OPERATION_DURATION.clone()))?;
    REGISTRY.register(Box::new(FETCHES_IN_FLIGHT.clone()))?;

    Ok(())
}

pub fn increment_passes() {
    PASSES_TOTAL.inc();
}

pub fn increment_pass_errors() {
    PASS_ERRORS_TOTAL.inc();
}

pub fn observe_pass_duration(duration: f64) {
    PASS_DURATION.observe(duration);
}

pub fn increment_secrets_fetched(count: usize) {
    SECRETS_FETCHED_TOTAL.inc_by(count as u64);
}

pub fn increment_secrets_reused(count: usize) {
    SECRETS_REUSED_TOTAL.inc_by(count as u64);
}

pub fn increment_secrets_dropped(count: usize) {
    SECRETS_DROPPED_TOTAL.inc_by(count as u64);
}

pub fn set_keys_published(count: usize) {
    KEYS_PUBLISHED.set(i64::try_from(count).unwrap_or(i64::MAX));
}

pub fn increment_reloads_signalled() {
    RELOADS_SIGNALLED_TOTAL.inc();
}

/// Count and time one secret store request
pub fn record_store_operation(operation: &str, duration: f64) {
    STORE_OPERATIONS_TOTAL
        .with_label_values(&[operation])
        .inc();
    STORE_OPERATION_DURATION
        .with_label_values(&[operation])
        .observe(duration);
}

pub fn increment_store_operation_errors(operation: &str) {
    STORE_OPERATION_ERRORS_TOTAL
        .with_label_values(&[operation])
        .inc();
}

/// Marks one fetch as in flight until dropped
#[derive(Debug)]
pub struct InFlightFetch(());

impl InFlightFetch {
    #[must_use]
    pub fn start() -> Self {
        FETCHES_IN_FLIGHT.inc();
        Self(())
    }
}

impl Drop for InFlightFetch {
    fn drop(&mut self) {
        FETCHES_IN_FLIGHT.dec();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_operations_are_labelled() {
        record_store_operation("list_secrets", 0.01);
        increment_store_operation_errors("list_secrets");
        assert!(STORE_OPERATIONS_TOTAL.with_label_values(&["list_secrets"]).get() >= 1);
        assert!(STORE_OPERATION_ERRORS_TOTAL.with_label_values(&["list_secrets"]).get() >= 1);
    }
}
