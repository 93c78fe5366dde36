//! Credential verification by probing an active service.
//!
//! There is no identity endpoint to ask, so a credential counts as usable
//! when one cheap list call succeeds in one visible scope.

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::client::{ServiceClientSet, cancellable};
use crate::error::{InventoryError, InventoryResult};
use crate::models::ScopeSet;
use crate::services::Service;

/// Probe the highest-priority active service in the first scope.
///
/// The first successful probe settles verification. A failed probe is final:
/// later scopes are not tried.
pub async fn verify(
    clients: &ServiceClientSet,
    scopes: &ScopeSet,
    cancel: &CancellationToken,
) -> InventoryResult<()> {
    let Some(scope) = scopes.iter().next() else {
        return Err(InventoryError::NoScope);
    };

    let Some((service, client)) = Service::probe_order()
        .into_iter()
        .find_map(|service| clients.get(&service).map(|client| (service, client)))
    else {
        return Err(InventoryError::NoAccess);
    };

    debug!(service = %service, scope = scope, "Probing service access");
    cancellable(cancel, async {
        client
            .probe(scope)
            .await
            .map_err(|source| InventoryError::Verification {
                service,
                scope: scope.to_string(),
                source,
            })
    })
    .await?;

    info!(service = %service, scope = scope, "Verified credential access");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::client::{MockServiceClient, ServiceClient};

    fn client_set(clients: Vec<(Service, MockServiceClient)>) -> ServiceClientSet {
        clients
            .into_iter()
            .map(|(service, client)| (service, Arc::new(client) as Arc<dyn ServiceClient>))
            .collect()
    }

    fn unprobed(service: Service) -> MockServiceClient {
        let mut client = MockServiceClient::new();
        client.expect_service().return_const(service);
        client.expect_probe().never();
        client
    }

    #[tokio::test]
    async fn test_empty_scopes_always_fail() {
        let clients = client_set(vec![(Service::Compute, unprobed(Service::Compute))]);

        let result = verify(&clients, &ScopeSet::default(), &CancellationToken::new()).await;
        assert!(matches!(result, Err(InventoryError::NoScope)));

        let result = verify(&ServiceClientSet::new(), &ScopeSet::default(), &CancellationToken::new()).await;
        assert!(matches!(result, Err(InventoryError::NoScope)));
    }

    #[tokio::test]
    async fn test_first_successful_probe_short_circuits() {
        let mut compute = MockServiceClient::new();
        compute.expect_service().return_const(Service::Compute);
        // Only the first scope is probed; the second would fail
        compute.expect_probe().times(1).returning(|scope| {
            if scope == "proj-a" {
                Ok(())
            } else {
                Err("denied".into())
            }
        });

        let clients = client_set(vec![
            (Service::Dns, unprobed(Service::Dns)),
            (Service::Compute, compute),
        ]);
        let scopes: ScopeSet = ["proj-a", "proj-b"].into_iter().collect();

        verify(&clients, &scopes, &CancellationToken::new())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_probe_priority_skips_inactive_services() {
        let mut storage = MockServiceClient::new();
        storage.expect_service().return_const(Service::Storage);
        storage.expect_probe().times(1).returning(|_| Ok(()));

        let clients = client_set(vec![
            (Service::Gke, unprobed(Service::Gke)),
            (Service::Storage, storage),
            (Service::CloudRun, unprobed(Service::CloudRun)),
        ]);
        let scopes: ScopeSet = ["proj-a"].into_iter().collect();

        verify(&clients, &scopes, &CancellationToken::new())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_failed_probe_is_final() {
        let mut dns = MockServiceClient::new();
        dns.expect_service().return_const(Service::Dns);
        dns.expect_probe()
            .times(1)
            .returning(|_| Err("dns api not enabled".into()));

        let clients = client_set(vec![(Service::Dns, dns)]);
        let scopes: ScopeSet = ["proj-a", "proj-b"].into_iter().collect();

        let err = verify(&clients, &scopes, &CancellationToken::new())
            .await
            .unwrap_err();

        match err {
            InventoryError::Verification { service, scope, .. } => {
                assert_eq!(service, Service::Dns);
                assert_eq!(scope, "proj-a");
            }
            other => panic!("expected verification error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_only_unprobeable_services_means_no_access() {
        let clients = client_set(vec![(Service::Gke, unprobed(Service::Gke))]);
        let scopes: ScopeSet = ["proj-a"].into_iter().collect();

        let result = verify(&clients, &scopes, &CancellationToken::new()).await;
        assert!(matches!(result, Err(InventoryError::NoAccess)));
    }
}
