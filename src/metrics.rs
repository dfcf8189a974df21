//! # Metrics
//!
//! Prometheus metrics for monitoring the controller.
//!
//! ## Metrics Exposed
//!
//! - `cluster_registry_reconciliations_total` - Total number of reconciliations
//! - `cluster_registry_reconciliation_errors_total` - Total number of reconciliation errors
//! - `cluster_registry_reconciliation_duration_seconds` - Duration of reconciliation cycles
//! - `cluster_registry_health_checks_total` - Liveness probes issued, by outcome
//! - `cluster_registry_clusters_registered` - Current number of clusters in the registry
//! - `cluster_registry_credential_migrations_total` - Legacy secrets migrated to client configs

use anyhow::Result;
use prometheus::{Histogram, IntCounter, IntCounterVec, IntGauge, Registry};
use std::sync::LazyLock;

pub const HEALTH_OUTCOME_READY: &str = "ready";
pub const HEALTH_OUTCOME_NOT_READY: &str = "not_ready";
pub const HEALTH_OUTCOME_OFFLINE: &str = "offline";

pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static RECONCILIATIONS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "cluster_registry_reconciliations_total",
        "Total number of reconciliations",
    )
    .expect("Failed to create RECONCILIATIONS_TOTAL metric - this should never happen")
});

static RECONCILIATION_ERRORS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "cluster_registry_reconciliation_errors_total",
        "Total number of reconciliation errors",
    )
    .expect("Failed to create RECONCILIATION_ERRORS_TOTAL metric - this should never happen")
});

static RECONCILIATION_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "cluster_registry_reconciliation_duration_seconds",
            "Duration of reconciliation in seconds",
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0]),
    )
    .expect("Failed to create RECONCILIATION_DURATION metric - this should never happen")
});

static HEALTH_CHECKS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "cluster_registry_health_checks_total",
            "Total number of remote cluster liveness probes, by outcome",
        ),
        &["outcome"],
    )
    .expect("Failed to create HEALTH_CHECKS_TOTAL metric - this should never happen")
});

static CLUSTERS_REGISTERED: LazyLock<IntGauge> = LazyLock::new(|| {
    IntGauge::new(
        "cluster_registry_clusters_registered",
        "Current number of clusters in the connection registry",
    )
    .expect("Failed to create CLUSTERS_REGISTERED metric - this should never happen")
});

static CREDENTIAL_MIGRATIONS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "cluster_registry_credential_migrations_total",
        "Total number of legacy token secrets migrated to structured client configs",
    )
    .expect("Failed to create CREDENTIAL_MIGRATIONS_TOTAL metric - this should never happen")
});

/// Register all metrics with the controller registry.
pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(RECONCILIATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_DURATION.clone()))?;
    REGISTRY.register(Box::new(HEALTH_CHECKS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(CLUSTERS_REGISTERED.clone()))?;
    REGISTRY.register(Box::new(CREDENTIAL_MIGRATIONS_TOTAL.clone()))?;
    Ok(())
}

pub fn increment_reconciliations() {
    RECONCILIATIONS_TOTAL.inc();
}

pub fn increment_reconciliation_errors() {
    RECONCILIATION_ERRORS_TOTAL.inc();
}

pub fn observe_reconciliation_duration(seconds: f64) {
    RECONCILIATION_DURATION.observe(seconds);
}

pub fn increment_health_checks(outcome: &str) {
    HEALTH_CHECKS_TOTAL.with_label_values(&[outcome]).inc();
}

pub fn set_clusters_registered(count: i64) {
    CLUSTERS_REGISTERED.set(count);
}

pub fn increment_credential_migrations() {
    CREDENTIAL_MIGRATIONS_TOTAL.inc();
}

/// Gather all metric families for the `/metrics` endpoint.
pub fn gather() -> Vec<prometheus::proto::MetricFamily> {
    REGISTRY.gather()
}
