//! Observability utilities for the cloud inventory collector.
//!
//! This crate provides:
//! - Prometheus metrics recorder installation and rendering
//! - Inventory collection metrics
//!
//! # Example
//!
//! ```rust,ignore
//! use observability::{init_metrics, render_metrics, InventoryMetrics};
//!
//! init_metrics()?;
//!
//! InventoryMetrics::record_run_completed("gcp", "main", 42, 1.5);
//!
//! eprintln!("{}", render_metrics());
//! ```

pub mod inventory;

pub use inventory::InventoryMetrics;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use tracing::info;

static METRICS_HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

/// Install the Prometheus metrics recorder.
///
/// Idempotent: later calls return the handle installed by the first one.
pub fn init_metrics() -> Result<&'static PrometheusHandle, BuildError> {
    METRICS_HANDLE.get_or_try_init(|| {
        let handle = PrometheusBuilder::new().install_recorder()?;

        info!("Prometheus metrics recorder initialized");

        register_metric_descriptions();

        Ok(handle)
    })
}

/// Prometheus text exposition of everything recorded so far
pub fn render_metrics() -> String {
    match METRICS_HANDLE.get() {
        Some(handle) => handle.render(),
        None => "# Metrics not initialized\n".to_string(),
    }
}

/// Register metric descriptions for documentation
fn register_metric_descriptions() {
    use metrics::describe_counter;
    use metrics::describe_gauge;
    use metrics::describe_histogram;

    describe_gauge!(
        "inventory_resources_total",
        "Resources discovered in the last run by provider and service"
    );
    describe_gauge!(
        "inventory_scopes_total",
        "Scopes visible to the provider credential"
    );
    describe_counter!(
        "inventory_runs_total",
        "Inventory collection runs by provider and status"
    );
    describe_counter!(
        "inventory_service_skipped_total",
        "Best-effort services skipped after a listing failure"
    );
    describe_histogram!(
        "inventory_run_duration_seconds",
        "Inventory collection run duration in seconds"
    );
    describe_counter!(
        "inventory_verifications_total",
        "Credential verifications by provider and status"
    );
}
