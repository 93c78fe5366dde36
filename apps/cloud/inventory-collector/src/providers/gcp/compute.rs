//! Compute Engine instance addresses.

use std::collections::BTreeMap;
use std::net::{Ipv4Addr, Ipv6Addr};

use async_trait::async_trait;
use domain_inventory::{ProviderIdentity, Resource, Resources, ScopeSet, Service, ServiceClient, ServiceError};
use serde::Deserialize;

use super::http::{GcpHttp, Page};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccessConfig {
    #[serde(rename = "natIP", default)]
    nat_ip: Option<String>,
    #[serde(default)]
    external_ipv6: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NetworkInterface {
    #[serde(rename = "networkIP", default)]
    network_ip: Option<String>,
    #[serde(default)]
    access_configs: Vec<AccessConfig>,
    #[serde(default)]
    ipv6_access_configs: Vec<AccessConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Instance {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    network_interfaces: Vec<NetworkInterface>,
}

#[derive(Debug, Default, Deserialize)]
struct InstancesScopedList {
    #[serde(default)]
    instances: Vec<Instance>,
}

/// `instances.aggregatedList` response, keyed by `zones/<zone>`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AggregatedInstancesPage {
    #[serde(default)]
    items: BTreeMap<String, InstancesScopedList>,
    next_page_token: Option<String>,
}

impl Page for AggregatedInstancesPage {
    type Item = Instance;

    fn into_parts(self) -> (Vec<Instance>, Option<String>) {
        let instances = self
            .items
            .into_values()
            .flat_map(|scoped| scoped.instances)
            .collect();
        (instances, self.next_page_token)
    }
}

/// One resource per network interface that carries an address.
fn instance_resources(identity: &ProviderIdentity, scope: &str, instance: &Instance) -> Vec<Resource> {
    let mut resources = Vec::new();

    for nic in &instance.network_interfaces {
        let private = nic
            .network_ip
            .as_deref()
            .and_then(|ip| ip.parse::<Ipv4Addr>().ok());
        let public_v4 = nic
            .access_configs
            .iter()
            .find_map(|config| config.nat_ip.as_deref()?.parse::<Ipv4Addr>().ok());
        let public_v6 = nic
            .ipv6_access_configs
            .iter()
            .find_map(|config| config.external_ipv6.as_deref()?.parse::<Ipv6Addr>().ok());

        if private.is_none() && public_v4.is_none() && public_v6.is_none() {
            continue;
        }

        let mut resource = identity
            .resource(Service::Compute, scope)
            .public(public_v4.is_some() || public_v6.is_some());
        if let Some(ip) = private {
            resource = resource.with_private_ipv4(ip);
        }
        if let Some(ip) = public_v4 {
            resource = resource.with_public_ipv4(ip);
        }
        if let Some(ip) = public_v6 {
            resource = resource.with_public_ipv6(ip);
        }
        if let Some(name) = &instance.name {
            resource = resource.with_name(name.as_str());
        }
        resources.push(resource);
    }

    resources
}

pub struct ComputeClient {
    http: GcpHttp,
    base: String,
    identity: ProviderIdentity,
}

impl ComputeClient {
    pub fn new(http: GcpHttp, base: &str, identity: ProviderIdentity) -> Self {
        Self {
            http,
            base: format!("{}/compute/v1/projects", base),
            identity,
        }
    }
}

#[async_trait]
impl ServiceClient for ComputeClient {
    fn service(&self) -> Service {
        Service::Compute
    }

    async fn collect(&self, scopes: &ScopeSet) -> Result<Resources, ServiceError> {
        let mut resources = Resources::new();
        for project in scopes.iter() {
            let url = format!("{}/{}/aggregated/instances", self.base, project);
            let instances = self.http.list_all::<AggregatedInstancesPage>(&url, &[]).await?;
            for instance in &instances {
                resources.extend(instance_resources(&self.identity, project, instance));
            }
        }
        Ok(resources)
    }

    async fn probe(&self, scope: &str) -> Result<(), ServiceError> {
        let url = format!("{}/{}/regions", self.base, scope);
        self.http
            .get_json::<serde_json::Value>(&url, &[("maxResults", "1")])
            .await?;
        Ok(())
    }
}
