//! Inventory collection metrics.

use metrics::{counter, gauge, histogram};

/// Inventory metrics recorder
pub struct InventoryMetrics;

impl InventoryMetrics {
    /// Set the resources discovered for one service in the last run
    pub fn set_service_resources(provider: &str, id: &str, service: &str, count: usize) {
        gauge!(
            "inventory_resources_total",
            "provider" => provider.to_string(),
            "id" => id.to_string(),
            "service" => service.to_string()
        )
        .set(count as f64);
    }

    /// Set the number of scopes the credential can see
    pub fn set_scopes(provider: &str, id: &str, count: usize) {
        gauge!(
            "inventory_scopes_total",
            "provider" => provider.to_string(),
            "id" => id.to_string()
        )
        .set(count as f64);
    }

    /// Record a best-effort service left out of a run
    pub fn record_service_skipped(provider: &str, service: &str) {
        counter!(
            "inventory_service_skipped_total",
            "provider" => provider.to_string(),
            "service" => service.to_string()
        )
        .increment(1);
    }

    /// Record a successful collection run
    pub fn record_run_completed(provider: &str, id: &str, resources: usize, duration_secs: f64) {
        counter!(
            "inventory_runs_total",
            "provider" => provider.to_string(),
            "status" => "completed"
        )
        .increment(1);

        histogram!(
            "inventory_run_duration_seconds",
            "provider" => provider.to_string()
        )
        .record(duration_secs);

        tracing::info!(
            provider = provider,
            id = id,
            resources = resources,
            duration_secs = duration_secs,
            "Inventory run completed"
        );
    }

    /// Record a failed collection run
    pub fn record_run_failed(provider: &str, id: &str, error: &str) {
        counter!(
            "inventory_runs_total",
            "provider" => provider.to_string(),
            "status" => "failed"
        )
        .increment(1);

        tracing::error!(provider = provider, id = id, error = error, "Inventory run failed");
    }

    /// Record a credential verification outcome
    pub fn record_verification(provider: &str, id: &str, success: bool) {
        let status = if success { "success" } else { "failed" };
        counter!(
            "inventory_verifications_total",
            "provider" => provider.to_string(),
            "status" => status
        )
        .increment(1);

        tracing::debug!(provider = provider, id = id, status = status, "Verification recorded");
    }
}
