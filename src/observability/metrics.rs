//! # Metrics
//!
//! Prometheus metrics for monitoring the installer.
//!
//! ## Metrics Exposed
//!
//! - `plugin_installer_applies_total{result}` - Apply operations by result
//! - `plugin_installer_removes_total{result}` - Remove operations by result
//! - `plugin_installer_idempotent_skips_total` - Applies skipped because nothing changed
//! - `plugin_installer_sync_steps_total` - Sync steps executed by the poll loop
//! - `plugin_installer_sync_duration_seconds` - Duration of a full sync run
//! - `plugin_installer_resources_pruned_total` - Owned objects deleted by pruning
//! - `plugin_installer_cache_syncs_total` - Full cluster cache syncs
//! - `plugin_installer_cache_sync_errors_total` - Failed cluster cache syncs
//! - `plugin_installer_kustomize_build_*` - Kustomize build count, errors and duration
//! - `plugin_installer_duration_parsing_errors_total` - Invalid duration strings

use anyhow::Result;
use prometheus::core::Collector;
use prometheus::{Encoder, Histogram, IntCounter, IntCounterVec, Registry, TextEncoder};
use std::sync::LazyLock;

// Metrics
pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static APPLIES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "plugin_installer_applies_total",
            "Total number of plugin apply operations by result",
        ),
        &["result"],
    )
    .expect("Failed to create APPLIES_TOTAL metric - this should never happen")
});

static REMOVES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "plugin_installer_removes_total",
            "Total number of plugin remove operations by result",
        ),
        &["result"],
    )
    .expect("Failed to create REMOVES_TOTAL metric - this should never happen")
});

static IDEMPOTENT_SKIPS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "plugin_installer_idempotent_skips_total",
        "Total number of applies skipped because the plugin was already installed with equal values",
    )
    .expect("Failed to create IDEMPOTENT_SKIPS_TOTAL metric - this should never happen")
});

static SYNC_STEPS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "plugin_installer_sync_steps_total",
        "Total number of sync steps executed",
    )
    .expect("Failed to create SYNC_STEPS_TOTAL metric - this should never happen")
});

static SYNC_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "plugin_installer_sync_duration_seconds",
            "Duration of sync runs in seconds",
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 120.0]),
    )
    .expect("Failed to create SYNC_DURATION metric - this should never happen")
});

static RESOURCES_PRUNED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "plugin_installer_resources_pruned_total",
        "Total number of owned resources deleted by pruning",
    )
    .expect("Failed to create RESOURCES_PRUNED_TOTAL metric - this should never happen")
});

static CACHE_SYNCS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "plugin_installer_cache_syncs_total",
        "Total number of full cluster cache syncs",
    )
    .expect("Failed to create CACHE_SYNCS_TOTAL metric - this should never happen")
});

static CACHE_SYNC_ERRORS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "plugin_installer_cache_sync_errors_total",
        "Total number of failed cluster cache syncs",
    )
    .expect("Failed to create CACHE_SYNC_ERRORS_TOTAL metric - this should never happen")
});

static KUSTOMIZE_BUILD_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "plugin_installer_kustomize_build_total",
        "Total number of successful kustomize builds",
    )
    .expect("Failed to create KUSTOMIZE_BUILD_TOTAL metric - this should never happen")
});

static KUSTOMIZE_BUILD_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "plugin_installer_kustomize_build_duration_seconds",
            "Duration of kustomize builds in seconds",
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0]),
    )
    .expect("Failed to create KUSTOMIZE_BUILD_DURATION metric - this should never happen")
});

static KUSTOMIZE_BUILD_ERRORS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "plugin_installer_kustomize_build_errors_total",
        "Total number of failed kustomize builds",
    )
    .expect("Failed to create KUSTOMIZE_BUILD_ERRORS_TOTAL metric - this should never happen")
});

static DURATION_PARSING_ERRORS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "plugin_installer_duration_parsing_errors_total",
        "Total number of duration parsing errors",
    )
    .expect("Failed to create DURATION_PARSING_ERRORS_TOTAL metric - this should never happen")
});

fn register(collector: Box<dyn Collector>) -> Result<()> {
    match REGISTRY.register(collector) {
        Ok(()) | Err(prometheus::Error::AlreadyReg) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Register every installer metric with [`REGISTRY`]; safe to call more than once
#[allow(
    clippy::missing_errors_doc,
    reason = "Error documentation is provided in doc comments"
)]
pub fn register_metrics() -> Result<()> {
    register(Box::new(APPLIES_TOTAL.clone()))?;
    register(Box::new(REMOVES_TOTAL.clone()))?;
    register(Box::new(IDEMPOTENT_SKIPS_TOTAL.clone()))?;
    register(Box::new(SYNC_STEPS_TOTAL.clone()))?;
    register(Box::new(SYNC_DURATION.clone()))?;
    register(Box::new(RESOURCES_PRUNED_TOTAL.clone()))?;
    register(Box::new(CACHE_SYNCS_TOTAL.clone()))?;
    register(Box::new(CACHE_SYNC_ERRORS_TOTAL.clone()))?;
    register(Box::new(KUSTOMIZE_BUILD_TOTAL.clone()))?;
    register(Box::new(KUSTOMIZE_BUILD_DURATION.clone()))?;
    register(Box::new(KUSTOMIZE_BUILD_ERRORS_TOTAL.clone()))?;
    register(Box::new(DURATION_PARSING_ERRORS_TOTAL.clone()))?;

    Ok(())
}

/// Text exposition of every registered metric
#[allow(
    clippy::missing_errors_doc,
    reason = "Error documentation is provided in doc comments"
)]
pub fn render_metrics() -> Result<String> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&REGISTRY.gather(), &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

pub fn increment_applies(result: &str) {
    APPLIES_TOTAL.with_label_values(&[result]).inc();
}

pub fn increment_removes(result: &str) {
    REMOVES_TOTAL.with_label_values(&[result]).inc();
}

pub fn increment_idempotent_skips() {
    IDEMPOTENT_SKIPS_TOTAL.inc();
}

pub fn increment_sync_steps() {
    SYNC_STEPS_TOTAL.inc();
}

pub fn observe_sync_duration(duration: f64) {
    SYNC_DURATION.observe(duration);
}

pub fn increment_resources_pruned(count: usize) {
    RESOURCES_PRUNED_TOTAL.inc_by(count as u64);
}

pub fn increment_cache_syncs() {
    CACHE_SYNCS_TOTAL.inc();
}

pub fn increment_cache_sync_errors() {
    CACHE_SYNC_ERRORS_TOTAL.inc();
}

pub fn increment_kustomize_build_total() {
    KUSTOMIZE_BUILD_TOTAL.inc();
}

pub fn observe_kustomize_build_duration(duration: f64) {
    KUSTOMIZE_BUILD_DURATION.observe(duration);
}

pub fn increment_kustomize_build_errors_total() {
    KUSTOMIZE_BUILD_ERRORS_TOTAL.inc();
}

pub fn increment_duration_parsing_errors() {
    DURATION_PARSING_ERRORS_TOTAL.inc();
}
