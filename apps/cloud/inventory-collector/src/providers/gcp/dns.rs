//! Cloud DNS: address and alias records of every managed zone.

use std::net::{Ipv4Addr, Ipv6Addr};

use async_trait::async_trait;
use domain_inventory::{ProviderIdentity, Resource, Resources, ScopeSet, Service, ServiceClient, ServiceError};
use serde::Deserialize;
use tracing::debug;

use super::GcpResult;
use super::http::{GcpHttp, Page};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ManagedZone {
    name: String,
    #[serde(default)]
    visibility: Option<String>,
}

impl ManagedZone {
    fn is_public(&self) -> bool {
        self.visibility.as_deref() != Some("private")
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ManagedZonesPage {
    #[serde(default)]
    managed_zones: Vec<ManagedZone>,
    next_page_token: Option<String>,
}

impl Page for ManagedZonesPage {
    type Item = ManagedZone;

    fn into_parts(self) -> (Vec<ManagedZone>, Option<String>) {
        (self.managed_zones, self.next_page_token)
    }
}

#[derive(Debug, Deserialize)]
struct RecordSet {
    name: String,
    #[serde(rename = "type")]
    record_type: String,
    #[serde(default)]
    rrdatas: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecordSetsPage {
    #[serde(default)]
    rrsets: Vec<RecordSet>,
    next_page_token: Option<String>,
}

impl Page for RecordSetsPage {
    type Item = RecordSet;

    fn into_parts(self) -> (Vec<RecordSet>, Option<String>) {
        (self.rrsets, self.next_page_token)
    }
}

/// Turn one record set into resources.
///
/// A and AAAA records yield one resource per address; CNAME records yield a
/// single name-only resource. Other record types are ignored.
fn record_resources(identity: &ProviderIdentity, scope: &str, zone_public: bool, record: &RecordSet) -> Vec<Resource> {
    let dns_name = record.name.trim_end_matches('.');
    let base = || {
        identity
            .resource(Service::Dns, scope)
            .with_dns_name(dns_name)
            .public(zone_public)
    };

    match record.record_type.as_str() {
        "A" => record
            .rrdatas
            .iter()
            .filter_map(|data| data.parse::<Ipv4Addr>().ok())
            .map(|ip| {
                if zone_public {
                    base().with_public_ipv4(ip)
                } else {
                    base().with_private_ipv4(ip)
                }
            })
            .collect(),
        "AAAA" => record
            .rrdatas
            .iter()
            .filter_map(|data| data.parse::<Ipv6Addr>().ok())
            .map(|ip| {
                if zone_public {
                    base().with_public_ipv6(ip)
                } else {
                    base().with_private_ipv6(ip)
                }
            })
            .collect(),
        "CNAME" => vec![base()],
        _ => Vec::new(),
    }
}

pub struct DnsClient {
    http: GcpHttp,
    base: String,
    identity: ProviderIdentity,
}

impl DnsClient {
    pub fn new(http: GcpHttp, base: &str, identity: ProviderIdentity) -> Self {
        Self {
            http,
            base: format!("{}/dns/v1/projects", base),
            identity,
        }
    }

    async fn collect_project(&self, project: &str, resources: &mut Resources) -> GcpResult<()> {
        let zones_url = format!("{}/{}/managedZones", self.base, project);
        let zones = self.http.list_all::<ManagedZonesPage>(&zones_url, &[]).await?;

        for zone in zones {
            let url = format!("{}/{}/rrsets", zones_url, zone.name);
            let records = self.http.list_all::<RecordSetsPage>(&url, &[]).await?;
            debug!(project = project, zone = %zone.name, records = records.len(), "Listed record sets");

            for record in &records {
                resources.extend(record_resources(&self.identity, project, zone.is_public(), record));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ServiceClient for DnsClient {
    fn service(&self) -> Service {
        Service::Dns
    }

    async fn collect(&self, scopes: &ScopeSet) -> Result<Resources, ServiceError> {
        let mut resources = Resources::new();
        for project in scopes.iter() {
            self.collect_project(project, &mut resources).await?;
        }
        Ok(resources)
    }

    async fn probe(&self, scope: &str) -> Result<(), ServiceError> {
        let url = format!("{}/{}/managedZones", self.base, scope);
        self.http
            .get_json::<serde_json::Value>(&url, &[("maxResults", "1")])
            .await?;
        Ok(())
    }
}
