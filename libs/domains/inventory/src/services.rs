//! Service catalog, selection and failure policy.
//!
//! The catalog is a static table: every supported service, the order it is
//! aggregated in, whether its listing failure aborts an inventory run, and
//! where it sits in the verification probe order.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

/// A cloud capability area with its own client and listing semantics.
///
/// Declaration order is catalog order; `Ord` follows it, so ordered
/// collections keyed by `Service` iterate in aggregation order.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    IntoStaticStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Service {
    /// Managed DNS zones and their record sets
    Dns,
    /// Kubernetes cluster control planes
    Gke,
    /// Virtual machine instances
    Compute,
    /// Object storage buckets
    #[serde(rename = "s3")]
    #[strum(serialize = "s3")]
    Storage,
    /// Serverless functions
    CloudFunction,
    /// Managed containers
    CloudRun,
}

/// Whether a service's listing failure aborts the whole inventory run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Criticality {
    Critical,
    BestEffort,
}

/// Static description of one catalog entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceDescriptor {
    pub service: Service,
    pub criticality: Criticality,
    /// Position in the verification probe order, `None` if never probed
    pub probe_rank: Option<u8>,
    pub description: &'static str,
}

/// The supported service catalog, in aggregation order.
pub const CATALOG: [ServiceDescriptor; 6] = [
    ServiceDescriptor {
        service: Service::Dns,
        criticality: Criticality::Critical,
        probe_rank: Some(1),
        description: "Managed DNS zones and record sets",
    },
    ServiceDescriptor {
        service: Service::Gke,
        criticality: Criticality::BestEffort,
        probe_rank: None,
        description: "Kubernetes cluster endpoints",
    },
    ServiceDescriptor {
        service: Service::Compute,
        criticality: Criticality::Critical,
        probe_rank: Some(0),
        description: "Virtual machine instances",
    },
    ServiceDescriptor {
        service: Service::Storage,
        criticality: Criticality::Critical,
        probe_rank: Some(2),
        description: "Object storage buckets",
    },
    ServiceDescriptor {
        service: Service::CloudFunction,
        criticality: Criticality::Critical,
        probe_rank: Some(3),
        description: "Serverless functions with HTTPS triggers",
    },
    ServiceDescriptor {
        service: Service::CloudRun,
        criticality: Criticality::Critical,
        probe_rank: Some(4),
        description: "Managed container services",
    },
];

impl Service {
    /// Every catalog service, in catalog order.
    pub fn all() -> impl Iterator<Item = Service> {
        CATALOG.iter().map(|d| d.service)
    }

    pub fn descriptor(self) -> &'static ServiceDescriptor {
        // CATALOG is indexed by declaration order
        &CATALOG[self as usize]
    }

    pub fn as_str(self) -> &'static str {
        self.into()
    }

    /// Services that can be probed during verification, highest priority first.
    pub fn probe_order() -> Vec<Service> {
        let mut ranked: Vec<_> = CATALOG
            .iter()
            .filter_map(|d| d.probe_rank.map(|rank| (rank, d.service)))
            .collect();
        ranked.sort_by_key(|(rank, _)| *rank);
        ranked.into_iter().map(|(_, service)| service).collect()
    }
}

/// The set of services active for one provider instance.
///
/// Never empty: a request that names no known service selects the whole
/// catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceSelection(BTreeSet<Service>);

impl ServiceSelection {
    /// Intersect the requested tokens with the catalog.
    ///
    /// Tokens are trimmed; unknown tokens are dropped. An empty
    /// intersection yields the full catalog.
    pub fn resolve<I, S>(requested: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let services: BTreeSet<Service> = requested
            .into_iter()
            .filter_map(|token| token.as_ref().trim().parse().ok())
            .collect();

        if services.is_empty() {
            Self::all()
        } else {
            Self(services)
        }
    }

    /// Resolve a comma-separated option value.
    pub fn from_option(value: Option<&str>) -> Self {
        Self::resolve(value.unwrap_or_default().split(','))
    }

    pub fn all() -> Self {
        Self(Service::all().collect())
    }

    pub fn contains(&self, service: Service) -> bool {
        self.0.contains(&service)
    }

    /// Selected services in catalog order.
    pub fn iter(&self) -> impl Iterator<Item = Service> + '_ {
        self.0.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.iter().map(|s| s.to_string()).collect()
    }
}

/// Per-service failure classification used by the aggregator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServicePolicy(BTreeMap<Service, Criticality>);

impl Default for ServicePolicy {
    fn default() -> Self {
        Self(CATALOG.iter().map(|d| (d.service, d.criticality)).collect())
    }
}

impl ServicePolicy {
    /// Listed services become best-effort, every other service critical.
    pub fn with_best_effort<I>(services: I) -> Self
    where
        I: IntoIterator<Item = Service>,
    {
        let mut policy = Self(
            Service::all()
                .map(|service| (service, Criticality::Critical))
                .collect(),
        );
        for service in services {
            policy.set(service, Criticality::BestEffort);
        }
        policy
    }

    /// Build from a comma-separated `best_effort_services` option value.
    ///
    /// Falls back to the catalog defaults when the value is absent or names
    /// no known service.
    pub fn from_option(value: Option<&str>) -> Self {
        let listed: Vec<Service> = value
            .unwrap_or_default()
            .split(',')
            .filter_map(|token| token.trim().parse().ok())
            .collect();

        if listed.is_empty() {
            Self::default()
        } else {
            Self::with_best_effort(listed)
        }
    }

    pub fn set(&mut self, service: Service, criticality: Criticality) {
        self.0.insert(service, criticality);
    }

    pub fn criticality(&self, service: Service) -> Criticality {
        self.0
            .get(&service)
            .copied()
            .unwrap_or(service.descriptor().criticality)
    }

    pub fn is_critical(&self, service: Service) -> bool {
        self.criticality(service) == Criticality::Critical
    }
}
