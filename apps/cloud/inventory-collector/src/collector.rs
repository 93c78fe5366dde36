//! Inventory Collector
//!
//! Runs every configured provider and merges what they report.

use std::collections::BTreeMap;
use std::time::Instant;

use chrono::{DateTime, Utc};
use domain_inventory::{InventoryError, InventoryResult, OptionBlock, Provider, Resources, Service, SkippedService};
use eyre::Result;
use observability::InventoryMetrics;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::providers::{GcpBackend, ProviderKind};

/// Per-provider outcome of a collection run
#[derive(Debug, Clone, Serialize)]
pub struct ProviderReport {
    pub provider: String,
    pub id: String,
    pub services: Vec<String>,
    pub scopes: usize,
    pub resources: usize,
    pub by_service: BTreeMap<Service, usize>,
    pub skipped: Vec<SkippedService>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Service whose failure stopped the provider, when there is one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_service: Option<Service>,
    pub duration_ms: u64,
}

/// Result of a collection run
#[derive(Debug, Clone, Serialize)]
pub struct CollectionResult {
    #[serde(skip)]
    pub resources: Resources,
    pub providers: Vec<ProviderReport>,
    pub errors: usize,
    pub duration_ms: u64,
    pub timestamp: DateTime<Utc>,
}

/// Per-provider outcome of a verification run
#[derive(Debug, Clone, Serialize)]
pub struct VerificationReport {
    pub provider: String,
    pub id: String,
    pub verified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Main inventory collector
pub struct InventoryCollector {
    blocks: Vec<(ProviderKind, OptionBlock)>,
    gcp: GcpBackend,
}

impl InventoryCollector {
    pub fn new(blocks: Vec<(ProviderKind, OptionBlock)>) -> Self {
        Self::with_gcp_backend(blocks, GcpBackend::new())
    }

    pub fn with_gcp_backend(blocks: Vec<(ProviderKind, OptionBlock)>, gcp: GcpBackend) -> Self {
        Self { blocks, gcp }
    }

    async fn build(&self, kind: ProviderKind, options: &OptionBlock, cancel: &CancellationToken) -> InventoryResult<Provider> {
        match kind {
            ProviderKind::Gcp => Provider::new(&self.gcp, options, cancel).await,
        }
    }

    /// Collect from every provider.
    ///
    /// A failing provider is reported and the run moves on to the next one;
    /// cancellation stops the whole run.
    pub async fn collect(&self, cancel: &CancellationToken) -> Result<CollectionResult> {
        let start = Instant::now();
        let mut resources = Resources::new();
        let mut providers = Vec::with_capacity(self.blocks.len());
        let mut errors = 0;

        for (kind, options) in &self.blocks {
            let provider_start = Instant::now();
            let name = kind.to_string();
            let id = options.id().to_string();

            info!(provider = %name, id = %id, "Starting inventory collection");

            let outcome = match self.build(*kind, options, cancel).await {
                Ok(provider) => {
                    InventoryMetrics::set_scopes(&name, &id, provider.scopes().len());
                    provider
                        .aggregate(cancel)
                        .await
                        .map(|aggregation| (provider, aggregation))
                }
                Err(e) => Err(e),
            };

            let duration = provider_start.elapsed();
            match outcome {
                Ok((provider, aggregation)) => {
                    let by_service = aggregation.resources.count_by_service();
                    for service in provider.selection().iter() {
                        let count = by_service.get(&service).copied().unwrap_or(0);
                        InventoryMetrics::set_service_resources(&name, &id, service.as_str(), count);
                    }
                    for skipped in &aggregation.skipped {
                        InventoryMetrics::record_service_skipped(&name, skipped.service.as_str());
                    }
                    InventoryMetrics::record_run_completed(
                        &name,
                        &id,
                        aggregation.resources.len(),
                        duration.as_secs_f64(),
                    );

                    providers.push(ProviderReport {
                        provider: name,
                        id,
                        services: provider.services(),
                        scopes: provider.scopes().len(),
                        resources: aggregation.resources.len(),
                        by_service,
                        skipped: aggregation.skipped,
                        error: None,
                        failed_service: None,
                        duration_ms: duration.as_millis() as u64,
                    });
                    resources.merge(aggregation.resources);
                }
                Err(InventoryError::Cancelled) => return Err(InventoryError::Cancelled.into()),
                Err(e) => {
                    InventoryMetrics::record_run_failed(&name, &id, &e.to_string());
                    errors += 1;

                    providers.push(ProviderReport {
                        provider: name,
                        id,
                        services: Vec::new(),
                        scopes: 0,
                        resources: 0,
                        by_service: BTreeMap::new(),
                        skipped: Vec::new(),
                        error: Some(e.to_string()),
                        failed_service: e.service(),
                        duration_ms: duration.as_millis() as u64,
                    });
                }
            }
        }

        Ok(CollectionResult {
            resources,
            providers,
            errors,
            duration_ms: start.elapsed().as_millis() as u64,
            timestamp: Utc::now(),
        })
    }

    /// Check that every provider's credential can reach at least one service.
    pub async fn verify(&self, cancel: &CancellationToken) -> Result<Vec<VerificationReport>> {
        let mut reports = Vec::with_capacity(self.blocks.len());

        for (kind, options) in &self.blocks {
            let name = kind.to_string();
            let id = options.id().to_string();

            let result = match self.build(*kind, options, cancel).await {
                Ok(provider) => provider.verify(cancel).await,
                Err(e) => Err(e),
            };

            let error = match result {
                Ok(()) => None,
                Err(InventoryError::Cancelled) => return Err(InventoryError::Cancelled.into()),
                Err(e) => {
                    error!(provider = %name, id = %id, error = %e, "Verification failed");
                    Some(e.to_string())
                }
            };

            InventoryMetrics::record_verification(&name, &id, error.is_none());
            reports.push(VerificationReport {
                provider: name,
                id,
                verified: error.is_none(),
                error,
            });
        }

        Ok(reports)
    }
}
