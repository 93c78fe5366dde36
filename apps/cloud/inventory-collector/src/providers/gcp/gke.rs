//! Google Kubernetes Engine cluster endpoints.

use std::net::Ipv4Addr;

use async_trait::async_trait;
use domain_inventory::{ProviderIdentity, Resource, Resources, ScopeSet, Service, ServiceClient, ServiceError};
use serde::Deserialize;

use super::http::GcpHttp;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PrivateClusterConfig {
    #[serde(default)]
    enable_private_endpoint: bool,
    #[serde(default)]
    private_endpoint: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Cluster {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    endpoint: Option<String>,
    #[serde(default)]
    private_cluster_config: Option<PrivateClusterConfig>,
}

#[derive(Debug, Default, Deserialize)]
struct ListClustersResponse {
    #[serde(default)]
    clusters: Vec<Cluster>,
}

fn cluster_resource(identity: &ProviderIdentity, scope: &str, cluster: &Cluster) -> Option<Resource> {
    let private = cluster.private_cluster_config.as_ref();
    let private_only = private.is_some_and(|config| config.enable_private_endpoint);

    let endpoint = cluster
        .endpoint
        .as_deref()
        .and_then(|ip| ip.parse::<Ipv4Addr>().ok());
    let private_endpoint = private
        .and_then(|config| config.private_endpoint.as_deref())
        .and_then(|ip| ip.parse::<Ipv4Addr>().ok());

    if endpoint.is_none() && private_endpoint.is_none() {
        return None;
    }

    let mut resource = identity.resource(Service::Gke, scope).public(!private_only);
    if let Some(ip) = endpoint {
        resource = if private_only {
            resource.with_private_ipv4(ip)
        } else {
            resource.with_public_ipv4(ip)
        };
    }
    if let Some(ip) = private_endpoint {
        resource = resource.with_private_ipv4(ip);
    }
    if let Some(name) = &cluster.name {
        resource = resource.with_name(name.as_str());
    }
    Some(resource)
}

pub struct GkeClient {
    http: GcpHttp,
    base: String,
    identity: ProviderIdentity,
}

impl GkeClient {
    pub fn new(http: GcpHttp, base: &str, identity: ProviderIdentity) -> Self {
        Self {
            http,
            base: format!("{}/v1beta1/projects", base),
            identity,
        }
    }

    fn clusters_url(&self, project: &str) -> String {
        format!("{}/{}/locations/-/clusters", self.base, project)
    }
}

#[async_trait]
impl ServiceClient for GkeClient {
    fn service(&self) -> Service {
        Service::Gke
    }

    async fn collect(&self, scopes: &ScopeSet) -> Result<Resources, ServiceError> {
        let mut resources = Resources::new();
        for project in scopes.iter() {
            let response: ListClustersResponse = self.http.get_json(&self.clusters_url(project), &[]).await?;
            resources.extend(
                response
                    .clusters
                    .iter()
                    .filter_map(|cluster| cluster_resource(&self.identity, project, cluster)),
            );
        }
        Ok(resources)
    }

    async fn probe(&self, scope: &str) -> Result<(), ServiceError> {
        self.http
            .get_json::<serde_json::Value>(&self.clusters_url(scope), &[])
            .await?;
        Ok(())
    }
}
