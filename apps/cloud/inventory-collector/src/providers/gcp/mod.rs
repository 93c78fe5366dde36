//! Google Cloud backend
//!
//! Lists resources through the public REST APIs:
//! - Cloud Resource Manager for project discovery
//! - Cloud DNS, GKE, Compute Engine, Cloud Storage, Cloud Functions and
//!   Cloud Run for inventory

mod auth;
mod compute;
mod dns;
mod functions;
mod gke;
mod http;
mod projects;
mod run;
mod storage;

use std::sync::Arc;

use async_trait::async_trait;
use domain_inventory::{CloudBackend, ProviderIdentity, ScopePage, Service, ServiceClient, ServiceError};
use thiserror::Error;
use tracing::debug;

pub use auth::TokenSource;
use compute::ComputeClient;
use dns::DnsClient;
use functions::FunctionsClient;
use gke::GkeClient;
use http::GcpHttp;
use run::RunClient;
use storage::StorageClient;

/// Provider type name reported on every resource
pub const PROVIDER_NAME: &str = "gcp";
/// Option key holding the service account JSON key
pub const SERVICE_ACCOUNT_KEY: &str = "gcp_service_account_key";

/// Error type for Google Cloud API operations
#[derive(Error, Debug)]
pub enum GcpError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} returned status {status}: {message}")]
    Api {
        status: u16,
        url: String,
        message: String,
    },

    #[error("Failed to parse response from {url}: {details}")]
    Parse { url: String, details: String },

    #[error("Invalid credential: {0}")]
    Credential(String),

    #[error("Authentication failed: {0}")]
    Auth(String),
}

pub type GcpResult<T> = Result<T, GcpError>;

/// Base URLs of the Google APIs used by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GcpEndpoints {
    pub resource_manager: String,
    pub dns: String,
    pub container: String,
    pub compute: String,
    pub storage: String,
    pub functions: String,
    pub run: String,
}

impl Default for GcpEndpoints {
    fn default() -> Self {
        Self {
            resource_manager: "https://cloudresourcemanager.googleapis.com".to_string(),
            dns: "https://dns.googleapis.com".to_string(),
            container: "https://container.googleapis.com".to_string(),
            compute: "https://compute.googleapis.com".to_string(),
            storage: "https://storage.googleapis.com".to_string(),
            functions: "https://cloudfunctions.googleapis.com".to_string(),
            run: "https://run.googleapis.com".to_string(),
        }
    }
}

impl GcpEndpoints {
    /// Route every API to one base URL (used against mock servers).
    pub fn single(base: &str) -> Self {
        let base = base.trim_end_matches('/').to_string();
        Self {
            resource_manager: base.clone(),
            dns: base.clone(),
            container: base.clone(),
            compute: base.clone(),
            storage: base.clone(),
            functions: base.clone(),
            run: base,
        }
    }
}

/// Registered credential: one HTTP client and token source shared by every
/// service client and scope page.
pub struct GcpCredential {
    http: GcpHttp,
}

/// Google Cloud backend
#[derive(Debug, Clone, Default)]
pub struct GcpBackend {
    endpoints: GcpEndpoints,
}

impl GcpBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_endpoints(endpoints: GcpEndpoints) -> Self {
        Self { endpoints }
    }
}

#[async_trait]
impl CloudBackend for GcpBackend {
    type Credential = GcpCredential;

    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    fn credential_key(&self) -> &'static str {
        SERVICE_ACCOUNT_KEY
    }

    async fn register(&self, raw: &[u8]) -> Result<GcpCredential, ServiceError> {
        let auth = TokenSource::from_json(raw)?;
        if let Some(project) = auth.key_project() {
            debug!(key_project = project, "Credential registered");
        }
        let http = GcpHttp::new(Arc::new(auth))?;
        Ok(GcpCredential { http })
    }

    async fn connect(
        &self,
        service: Service,
        credential: &GcpCredential,
        identity: &ProviderIdentity,
    ) -> Result<Arc<dyn ServiceClient>, ServiceError> {
        let http = credential.http.clone();
        let identity = identity.clone();
        let endpoints = &self.endpoints;

        let client: Arc<dyn ServiceClient> = match service {
            Service::Dns => Arc::new(DnsClient::new(http, &endpoints.dns, identity)),
            Service::Gke => Arc::new(GkeClient::new(http, &endpoints.container, identity)),
            Service::Compute => Arc::new(ComputeClient::new(http, &endpoints.compute, identity)),
            Service::Storage => Arc::new(StorageClient::new(http, &endpoints.storage, identity)),
            Service::CloudFunction => {
                Arc::new(FunctionsClient::new(http, &endpoints.functions, identity))
            }
            Service::CloudRun => Arc::new(RunClient::new(http, &endpoints.run, identity)),
        };
        Ok(client)
    }

    async fn list_scopes(
        &self,
        credential: &GcpCredential,
        page_token: Option<&str>,
    ) -> Result<ScopePage, ServiceError> {
        let page =
            projects::list_projects_page(&credential.http, &self.endpoints.resource_manager, page_token).await?;
        Ok(page)
    }
}

#[cfg(test)]
mod tests {
    use domain_inventory::{InventoryError, OptionBlock, Provider};
    use serde_json::json;
    use tokio_util::sync::CancellationToken;
    use wiremock::matchers::{method, path, query_param, query_param_is_missing};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    const TOKEN_CREDENTIAL: &str = r#"{"access_token": "test-token"}"#;

    async fn mount_projects(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/v1/projects"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "projects": [{"projectId": "proj-a", "lifecycleState": "ACTIVE"}]
            })))
            .mount(server)
            .await;
    }

    #[test]
    fn test_single_endpoint_trims_trailing_slash() {
        let endpoints = GcpEndpoints::single("http://127.0.0.1:9000/");
        assert_eq!(endpoints.run, "http://127.0.0.1:9000");
        assert_eq!(endpoints.resource_manager, "http://127.0.0.1:9000");
    }

    #[tokio::test]
    async fn test_provider_collects_from_mock_apis() {
        let server = MockServer::start().await;
        mount_projects(&server).await;

        Mock::given(method("GET"))
            .and(path("/storage/v1/b"))
            .and(query_param("project", "proj-a"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [{"name": "assets"}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/storage/v1/b/assets/iam"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "bindings": [{"role": "roles/storage.objectViewer", "members": ["allUsers"]}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1beta1/projects/proj-a/locations/-/clusters"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let backend = GcpBackend::with_endpoints(GcpEndpoints::single(&server.uri()));
        let options = OptionBlock::new()
            .with(SERVICE_ACCOUNT_KEY, TOKEN_CREDENTIAL)
            .with("id", "mock")
            .with("services", "s3,gke");
        let cancel = CancellationToken::new();

        let provider = Provider::new(&backend, &options, &cancel).await.unwrap();
        let aggregation = provider.aggregate(&cancel).await.unwrap();

        assert_eq!(provider.name(), "gcp");
        assert_eq!(aggregation.resources.len(), 1);
        let bucket = aggregation.resources.iter().next().unwrap();
        assert_eq!(bucket.dns_name.as_deref(), Some("assets.storage.googleapis.com"));
        assert!(bucket.public);
        assert_eq!(bucket.id, "mock");
        // GKE is best-effort by default
        assert_eq!(aggregation.skipped.len(), 1);
        assert_eq!(aggregation.skipped[0].service, Service::Gke);
    }

    #[tokio::test]
    async fn test_scopes_keep_every_listed_project_across_pages() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/projects"))
            .and(query_param_is_missing("pageToken"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "projects": [
                    {"projectId": "live", "lifecycleState": "ACTIVE"},
                    {"projectId": "pending", "lifecycleState": "DELETE_REQUESTED"}
                ],
                "nextPageToken": "page-2"
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/projects"))
            .and(query_param("pageToken", "page-2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "projects": [{"projectId": "last"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let backend = GcpBackend::with_endpoints(GcpEndpoints::single(&server.uri()));
        let options = OptionBlock::new()
            .with(SERVICE_ACCOUNT_KEY, TOKEN_CREDENTIAL)
            .with("services", "dns");

        let provider = Provider::new(&backend, &options, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(
            provider.scopes().iter().collect::<Vec<_>>(),
            vec!["live", "pending", "last"]
        );
    }

    #[tokio::test]
    async fn test_verify_probes_compute_regions() {
        let server = MockServer::start().await;
        mount_projects(&server).await;

        Mock::given(method("GET"))
            .and(path("/compute/v1/projects/proj-a/regions"))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({
                "error": {"code": 403, "message": "Required 'compute.regions.list' permission"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let backend = GcpBackend::with_endpoints(GcpEndpoints::single(&server.uri()));
        let options = OptionBlock::new()
            .with(SERVICE_ACCOUNT_KEY, TOKEN_CREDENTIAL)
            .with("services", "compute,dns");
        let cancel = CancellationToken::new();

        let provider = Provider::new(&backend, &options, &cancel).await.unwrap();
        let err = provider.verify(&cancel).await.unwrap_err();

        assert!(matches!(
            err,
            InventoryError::Verification {
                service: Service::Compute,
                ..
            }
        ));
        assert!(err.to_string().contains("compute.regions.list"));
    }

    #[tokio::test]
    async fn test_unusable_credential_fails_construction() {
        let backend = GcpBackend::new();
        let options = OptionBlock::new().with(SERVICE_ACCOUNT_KEY, "{\"type\": \"service_account\"}");

        let result = Provider::new(&backend, &options, &CancellationToken::new()).await;

        assert!(matches!(result, Err(InventoryError::Credential(_))));
    }
}
