//! Credential registration, per-service client construction and scope
//! discovery.

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::client::{CloudBackend, ServiceClientSet, cancellable};
use crate::error::{InventoryError, InventoryResult};
use crate::models::{ProviderIdentity, ScopeSet};
use crate::services::ServiceSelection;

/// Clients and scopes produced by a successful bootstrap.
pub struct Bootstrap {
    pub clients: ServiceClientSet,
    pub scopes: ScopeSet,
}

/// Register the credential, connect every selected service and list scopes.
///
/// Fail-fast: the first client that cannot be created aborts the whole
/// bootstrap and every client built so far is dropped. A client that reports
/// a different service than the one requested counts as such a failure.
/// Scope discovery runs
/// whatever the selection is.
pub async fn bootstrap<B: CloudBackend>(
    backend: &B,
    raw_credential: &[u8],
    selection: &ServiceSelection,
    identity: &ProviderIdentity,
    cancel: &CancellationToken,
) -> InventoryResult<Bootstrap> {
    let credential = cancellable(cancel, async {
        backend
            .register(raw_credential)
            .await
            .map_err(InventoryError::Credential)
    })
    .await?;

    let mut clients = ServiceClientSet::new();
    for service in selection.iter() {
        let client = cancellable(cancel, async {
            backend
                .connect(service, &credential, identity)
                .await
                .map_err(|source| InventoryError::ServiceInit { service, source })
        })
        .await?;

        if client.service() != service {
            return Err(InventoryError::ServiceInit {
                service,
                source: format!("backend returned a {} client", client.service()).into(),
            });
        }

        debug!(service = %service, "Created service client");
        clients.insert(service, client);
    }

    let scopes = discover_scopes(backend, &credential, cancel).await?;

    Ok(Bootstrap { clients, scopes })
}

/// Page through every visible scope, in order of arrival.
pub async fn discover_scopes<B: CloudBackend>(
    backend: &B,
    credential: &B::Credential,
    cancel: &CancellationToken,
) -> InventoryResult<ScopeSet> {
    let mut scopes = Vec::new();
    let mut page_token: Option<String> = None;

    loop {
        let page = cancellable(cancel, async {
            backend
                .list_scopes(credential, page_token.as_deref())
                .await
                .map_err(InventoryError::ScopeDiscovery)
        })
        .await?;

        debug!(count = page.scopes.len(), "Listed scope page");
        scopes.extend(page.scopes);

        match page.next_page_token {
            Some(token) if !token.is_empty() => page_token = Some(token),
            _ => break,
        }
    }

    Ok(ScopeSet::new(scopes))
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use super::*;
    use crate::client::{MockServiceClient, ServiceClient};
    use crate::error::ServiceError;
    use crate::models::ScopePage;
    use crate::services::Service;

    /// Backend with scripted scope pages and an optional failing service.
    #[derive(Default)]
    struct ScriptedBackend {
        pages: Vec<ScopePage>,
        failing_service: Option<Service>,
        /// Service whose connect hands back a client for another service
        mislabeled_service: Option<Service>,
        fail_scopes: bool,
        page_tokens_seen: Mutex<Vec<Option<String>>>,
        connected: Mutex<Vec<Service>>,
    }

    #[async_trait]
    impl CloudBackend for ScriptedBackend {
        type Credential = String;

        fn name(&self) -> &'static str {
            "fake"
        }

        fn credential_key(&self) -> &'static str {
            "fake_key"
        }

        async fn register(&self, raw: &[u8]) -> Result<String, ServiceError> {
            if raw == b"bad" {
                return Err("malformed credential".into());
            }
            Ok(String::from_utf8_lossy(raw).into_owned())
        }

        async fn connect(
            &self,
            service: Service,
            _credential: &String,
            _identity: &ProviderIdentity,
        ) -> Result<Arc<dyn ServiceClient>, ServiceError> {
            if self.failing_service == Some(service) {
                return Err(format!("{service} api disabled").into());
            }
            self.connected.lock().unwrap().push(service);
            let reported = if self.mislabeled_service == Some(service) {
                Service::Gke
            } else {
                service
            };
            let mut client = MockServiceClient::new();
            client.expect_service().return_const(reported);
            Ok(Arc::new(client))
        }

        async fn list_scopes(
            &self,
            _credential: &String,
            page_token: Option<&str>,
        ) -> Result<ScopePage, ServiceError> {
            if self.fail_scopes {
                return Err("permission denied".into());
            }
            let mut seen = self.page_tokens_seen.lock().unwrap();
            seen.push(page_token.map(str::to_string));
            let index = seen.len() - 1;
            Ok(self.pages.get(index).cloned().unwrap_or_default())
        }
    }

    fn page(scopes: &[&str], next: Option<&str>) -> ScopePage {
        ScopePage {
            scopes: scopes.iter().map(|s| s.to_string()).collect(),
            next_page_token: next.map(str::to_string),
        }
    }

    fn identity() -> ProviderIdentity {
        ProviderIdentity::new("fake", "test")
    }

    #[tokio::test]
    async fn test_bootstrap_connects_selected_services_and_pages_scopes() {
        let backend = ScriptedBackend {
            pages: vec![
                page(&["proj-a", "proj-b"], Some("t1")),
                page(&[], Some("t2")),
                page(&["proj-c"], None),
            ],
            ..Default::default()
        };
        let selection = ServiceSelection::resolve(["compute", "dns"]);

        let result = bootstrap(
            &backend,
            b"{}",
            &selection,
            &identity(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(
            result.clients.keys().copied().collect::<Vec<_>>(),
            vec![Service::Dns, Service::Compute]
        );
        assert_eq!(
            result.scopes.iter().collect::<Vec<_>>(),
            vec!["proj-a", "proj-b", "proj-c"]
        );
        assert_eq!(
            *backend.page_tokens_seen.lock().unwrap(),
            vec![None, Some("t1".to_string()), Some("t2".to_string())]
        );
    }

    #[tokio::test]
    async fn test_bootstrap_rejects_bad_credential() {
        let backend = ScriptedBackend::default();
        let result = bootstrap(
            &backend,
            b"bad",
            &ServiceSelection::all(),
            &identity(),
            &CancellationToken::new(),
        )
        .await;

        assert!(matches!(result, Err(InventoryError::Credential(_))));
        assert!(backend.connected.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_bootstrap_fails_fast_on_service_init() {
        let backend = ScriptedBackend {
            failing_service: Some(Service::Storage),
            ..Default::default()
        };
        let result = bootstrap(
            &backend,
            b"{}",
            &ServiceSelection::all(),
            &identity(),
            &CancellationToken::new(),
        )
        .await;

        match result {
            Err(InventoryError::ServiceInit { service, .. }) => assert_eq!(service, Service::Storage),
            other => panic!("expected service init error, got {:?}", other.err()),
        }
        // Services after the failing one are never attempted; scopes never listed
        assert_eq!(
            *backend.connected.lock().unwrap(),
            vec![Service::Dns, Service::Gke, Service::Compute]
        );
        assert!(backend.page_tokens_seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_client_for_wrong_service_is_rejected() {
        let backend = ScriptedBackend {
            mislabeled_service: Some(Service::Compute),
            ..Default::default()
        };
        let result = bootstrap(
            &backend,
            b"{}",
            &ServiceSelection::resolve(["dns", "compute", "s3"]),
            &identity(),
            &CancellationToken::new(),
        )
        .await;

        match result {
            Err(err @ InventoryError::ServiceInit { .. }) => {
                assert_eq!(err.service(), Some(Service::Compute));
                assert!(err.to_string().contains("backend returned a gke client"));
            }
            other => panic!("expected service init error, got {:?}", other.err()),
        }
        assert!(backend.page_tokens_seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_scope_discovery_failure_is_fatal() {
        let backend = ScriptedBackend {
            fail_scopes: true,
            ..Default::default()
        };
        let result = bootstrap(
            &backend,
            b"{}",
            &ServiceSelection::resolve(["gke"]),
            &identity(),
            &CancellationToken::new(),
        )
        .await;

        assert!(matches!(result, Err(InventoryError::ScopeDiscovery(_))));
    }

    #[tokio::test]
    async fn test_cancelled_bootstrap() {
        let backend = ScriptedBackend::default();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = bootstrap(&backend, b"{}", &ServiceSelection::all(), &identity(), &cancel).await;

        assert!(matches!(result, Err(InventoryError::Cancelled)));
    }
}
