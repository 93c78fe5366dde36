//! Cloud Run service hosts.

use async_trait::async_trait;
use domain_inventory::{ProviderIdentity, Resource, Resources, ScopeSet, Service, ServiceClient, ServiceError};
use serde::Deserialize;

use super::http::{GcpHttp, Page, url_host};

const INTERNAL_ONLY_INGRESS: &str = "INGRESS_TRAFFIC_INTERNAL_ONLY";

#[derive(Debug, Deserialize)]
struct RunService {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    uri: Option<String>,
    #[serde(default)]
    ingress: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServicesPage {
    #[serde(default)]
    services: Vec<RunService>,
    next_page_token: Option<String>,
}

impl Page for ServicesPage {
    type Item = RunService;

    fn into_parts(self) -> (Vec<RunService>, Option<String>) {
        (self.services, self.next_page_token)
    }
}

fn service_resource(identity: &ProviderIdentity, scope: &str, service: &RunService) -> Option<Resource> {
    let host = service.uri.as_deref().and_then(url_host)?;
    let public = service.ingress.as_deref() != Some(INTERNAL_ONLY_INGRESS);

    let mut resource = identity
        .resource(Service::CloudRun, scope)
        .with_dns_name(host)
        .public(public);
    if let Some(name) = &service.name {
        resource = resource.with_name(name.as_str());
    }
    Some(resource)
}

pub struct RunClient {
    http: GcpHttp,
    base: String,
    identity: ProviderIdentity,
}

impl RunClient {
    pub fn new(http: GcpHttp, base: &str, identity: ProviderIdentity) -> Self {
        Self {
            http,
            base: base.to_string(),
            identity,
        }
    }
}

#[async_trait]
impl ServiceClient for RunClient {
    fn service(&self) -> Service {
        Service::CloudRun
    }

    async fn collect(&self, scopes: &ScopeSet) -> Result<Resources, ServiceError> {
        let mut resources = Resources::new();
        for project in scopes.iter() {
            let url = format!("{}/v2/projects/{}/locations/-/services", self.base, project);
            let services = self.http.list_all::<ServicesPage>(&url, &[]).await?;
            resources.extend(
                services
                    .iter()
                    .filter_map(|service| service_resource(&self.identity, project, service)),
            );
        }
        Ok(resources)
    }

    async fn probe(&self, scope: &str) -> Result<(), ServiceError> {
        let url = format!("{}/v1/projects/{}/locations", self.base, scope);
        self.http
            .get_json::<serde_json::Value>(&url, &[("pageSize", "1")])
            .await?;
        Ok(())
    }
}
