use std::collections::BTreeMap;
use std::net::{Ipv4Addr, Ipv6Addr};

use serde::{Deserialize, Serialize};

use crate::services::Service;

/// Attribution attached to every resource a provider reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderIdentity {
    /// Fixed provider type name, e.g. `gcp`
    pub provider: String,
    /// Caller-supplied label, may be empty
    pub id: String,
}

impl ProviderIdentity {
    pub fn new(provider: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            id: id.into(),
        }
    }

    /// Start a record for a resource discovered in `scope`.
    pub fn resource(&self, service: Service, scope: &str) -> Resource {
        Resource {
            provider: self.provider.clone(),
            id: self.id.clone(),
            service,
            scope: scope.to_string(),
            public: false,
            name: None,
            dns_name: None,
            public_ipv4: None,
            public_ipv6: None,
            private_ipv4: None,
            private_ipv6: None,
        }
    }
}

/// A single discovered cloud object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resource {
    pub provider: String,
    pub id: String,
    pub service: Service,
    /// Project the resource was found in
    pub scope: String,
    pub public: bool,
    /// Vendor name of the instance, cluster, bucket or service
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dns_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_ipv4: Option<Ipv4Addr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_ipv6: Option<Ipv6Addr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_ipv4: Option<Ipv4Addr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_ipv6: Option<Ipv6Addr>,
}

impl Resource {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_dns_name(mut self, dns_name: impl Into<String>) -> Self {
        self.dns_name = Some(dns_name.into());
        self
    }

    pub fn with_public_ipv4(mut self, ip: Ipv4Addr) -> Self {
        self.public_ipv4 = Some(ip);
        self
    }

    pub fn with_public_ipv6(mut self, ip: Ipv6Addr) -> Self {
        self.public_ipv6 = Some(ip);
        self
    }

    pub fn with_private_ipv4(mut self, ip: Ipv4Addr) -> Self {
        self.private_ipv4 = Some(ip);
        self
    }

    pub fn with_private_ipv6(mut self, ip: Ipv6Addr) -> Self {
        self.private_ipv6 = Some(ip);
        self
    }

    pub fn public(mut self, public: bool) -> Self {
        self.public = public;
        self
    }
}

/// Append-only collection of discovered resources.
///
/// Merging is plain concatenation: no deduplication, no reconciliation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Resources(Vec<Resource>);

impl Resources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, resource: Resource) {
        self.0.push(resource);
    }

    pub fn merge(&mut self, other: Resources) {
        self.0.extend(other.0);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Resource> {
        self.0.iter()
    }

    pub fn count_by_service(&self) -> BTreeMap<Service, usize> {
        let mut counts = BTreeMap::new();
        for resource in &self.0 {
            *counts.entry(resource.service).or_insert(0) += 1;
        }
        counts
    }
}

impl From<Vec<Resource>> for Resources {
    fn from(resources: Vec<Resource>) -> Self {
        Self(resources)
    }
}

impl FromIterator<Resource> for Resources {
    fn from_iter<T: IntoIterator<Item = Resource>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Extend<Resource> for Resources {
    fn extend<T: IntoIterator<Item = Resource>>(&mut self, iter: T) {
        self.0.extend(iter);
    }
}

impl IntoIterator for Resources {
    type Item = Resource;
    type IntoIter = std::vec::IntoIter<Resource>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Resources {
    type Item = &'a Resource;
    type IntoIter = std::slice::Iter<'a, Resource>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Scopes (projects) the credential can enumerate, in discovery order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScopeSet(Vec<String>);

impl ScopeSet {
    pub fn new(scopes: Vec<String>) -> Self {
        Self(scopes)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for ScopeSet {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// One page of a scope listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopePage {
    pub scopes: Vec<String>,
    /// `None` once the remote side reports no further pages
    pub next_page_token: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> ProviderIdentity {
        ProviderIdentity::new("gcp", "main")
    }

    fn record(service: Service, name: &str) -> Resource {
        identity().resource(service, "proj-a").with_dns_name(name)
    }

    fn sorted(resources: &Resources) -> Vec<Resource> {
        let mut items: Vec<Resource> = resources.iter().cloned().collect();
        items.sort_by(|a, b| a.dns_name.cmp(&b.dns_name).then(a.service.cmp(&b.service)));
        items
    }

    #[test]
    fn test_identity_is_stamped_on_resources() {
        let resource = identity().resource(Service::Compute, "proj-b");
        assert_eq!(resource.provider, "gcp");
        assert_eq!(resource.id, "main");
        assert_eq!(resource.scope, "proj-b");
        assert!(!resource.public);
    }

    #[test]
    fn test_merge_keeps_duplicates() {
        let mut a = Resources::from(vec![record(Service::Dns, "a.example.com")]);
        let b = Resources::from(vec![record(Service::Dns, "a.example.com")]);
        a.merge(b);
        assert_eq!(a.len(), 2);
    }

    #[test]
    fn test_merge_is_commutative_and_associative() {
        let a = Resources::from(vec![record(Service::Dns, "a"), record(Service::Dns, "b")]);
        let b = Resources::from(vec![record(Service::Storage, "c")]);
        let c = Resources::from(vec![record(Service::Compute, "d"), record(Service::Dns, "a")]);

        let mut left = Resources::new();
        left.merge(a.clone());
        left.merge(b.clone());
        left.merge(c.clone());

        let mut bc = b.clone();
        bc.merge(c.clone());
        let mut right = c.clone();
        right.merge(a.clone());
        right.merge(b.clone());

        let mut grouped = a.clone();
        grouped.merge(bc);

        assert_eq!(sorted(&left), sorted(&right));
        assert_eq!(sorted(&left), sorted(&grouped));
        assert_eq!(left.len(), 5);
    }

    #[test]
    fn test_count_by_service() {
        let resources: Resources = vec![
            record(Service::Dns, "a"),
            record(Service::Dns, "b"),
            record(Service::CloudRun, "c"),
        ]
        .into_iter()
        .collect();

        let counts = resources.count_by_service();
        assert_eq!(counts.get(&Service::Dns), Some(&2));
        assert_eq!(counts.get(&Service::CloudRun), Some(&1));
        assert_eq!(counts.get(&Service::Compute), None);
    }

    #[test]
    fn test_resource_serialization_skips_missing_addresses() {
        let resource = identity()
            .resource(Service::Compute, "proj-a")
            .with_public_ipv4(Ipv4Addr::new(34, 1, 2, 3))
            .public(true);
        let json = serde_json::to_value(&resource).unwrap();
        assert_eq!(json["service"], "compute");
        assert_eq!(json["public_ipv4"], "34.1.2.3");
        assert!(json.get("dns_name").is_none());
        assert!(json.get("private_ipv4").is_none());
        assert!(json.get("private_ipv6").is_none());
        assert!(json.get("name").is_none());
    }

    #[test]
    fn test_resource_name_and_private_ipv6_are_serialized() {
        let resource = identity()
            .resource(Service::Compute, "proj-a")
            .with_name("web-1")
            .with_private_ipv6("fd20::5".parse().unwrap());
        let json = serde_json::to_value(&resource).unwrap();
        assert_eq!(json["name"], "web-1");
        assert_eq!(json["private_ipv6"], "fd20::5");
        assert!(json.get("public_ipv6").is_none());
    }

    #[test]
    fn test_scope_set_preserves_discovery_order() {
        let scopes: ScopeSet = ["b", "a", "c"].into_iter().collect();
        assert_eq!(scopes.iter().collect::<Vec<_>>(), vec!["b", "a", "c"]);
        assert!(!scopes.is_empty());
        assert!(ScopeSet::default().is_empty());
    }
}
