//! Drives every active service client and merges their inventories.

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::client::{ServiceClientSet, cancellable};
use crate::error::{InventoryError, InventoryResult};
use crate::models::{Resources, ScopeSet};
use crate::services::{Service, ServicePolicy};

/// A best-effort service whose listing failed and was left out.
#[derive(Debug, Clone, Serialize)]
pub struct SkippedService {
    pub service: Service,
    pub error: String,
}

/// Outcome of one aggregation run.
#[derive(Debug, Clone, Default)]
pub struct Aggregation {
    pub resources: Resources,
    pub skipped: Vec<SkippedService>,
}

/// Collect from every client in catalog order and merge the results.
///
/// A critical service failure aborts the run and nothing collected so far is
/// returned. A best-effort failure is logged and the service contributes
/// nothing.
pub async fn aggregate(
    clients: &ServiceClientSet,
    policy: &ServicePolicy,
    scopes: &ScopeSet,
    cancel: &CancellationToken,
) -> InventoryResult<Aggregation> {
    let mut aggregation = Aggregation::default();

    for (&service, client) in clients {
        let result = cancellable(cancel, async {
            client
                .collect(scopes)
                .await
                .map_err(|source| InventoryError::Collector { service, source })
        })
        .await;

        match result {
            Ok(partial) => {
                debug!(service = %service, count = partial.len(), "Collected resources");
                aggregation.resources.merge(partial);
            }
            Err(InventoryError::Cancelled) => return Err(InventoryError::Cancelled),
            Err(err) if policy.is_critical(service) => return Err(err),
            Err(err) => {
                warn!(service = %service, error = %err, "Could not get resources, skipping");
                aggregation.skipped.push(SkippedService {
                    service,
                    error: err.to_string(),
                });
            }
        }
    }

    Ok(aggregation)
}
