//! Cloud Storage buckets, reported under the `s3` service id.

use async_trait::async_trait;
use domain_inventory::{ProviderIdentity, Resource, Resources, ScopeSet, Service, ServiceClient, ServiceError};
use serde::Deserialize;
use tracing::debug;

use super::http::{GcpHttp, Page};

const PUBLIC_MEMBERS: [&str; 2] = ["allUsers", "allAuthenticatedUsers"];

#[derive(Debug, Deserialize)]
struct Bucket {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BucketsPage {
    #[serde(default)]
    items: Vec<Bucket>,
    next_page_token: Option<String>,
}

impl Page for BucketsPage {
    type Item = Bucket;

    fn into_parts(self) -> (Vec<Bucket>, Option<String>) {
        (self.items, self.next_page_token)
    }
}

#[derive(Debug, Deserialize)]
struct Binding {
    #[serde(default)]
    members: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct IamPolicy {
    #[serde(default)]
    bindings: Vec<Binding>,
}

impl IamPolicy {
    fn grants_public_access(&self) -> bool {
        self.bindings
            .iter()
            .flat_map(|binding| binding.members.iter())
            .any(|member| PUBLIC_MEMBERS.contains(&member.as_str()))
    }
}

fn bucket_resource(identity: &ProviderIdentity, scope: &str, bucket: &str, public: bool) -> Resource {
    identity
        .resource(Service::Storage, scope)
        .with_name(bucket)
        .with_dns_name(format!("{}.storage.googleapis.com", bucket))
        .public(public)
}

pub struct StorageClient {
    http: GcpHttp,
    base: String,
    identity: ProviderIdentity,
}

impl StorageClient {
    pub fn new(http: GcpHttp, base: &str, identity: ProviderIdentity) -> Self {
        Self {
            http,
            base: format!("{}/storage/v1/b", base),
            identity,
        }
    }

    /// Whether the bucket policy admits anonymous or any-account readers.
    ///
    /// A policy that cannot be read counts as not public.
    async fn is_public(&self, bucket: &str) -> bool {
        let url = format!("{}/{}/iam", self.base, urlencoding::encode(bucket));
        match self.http.get_json::<IamPolicy>(&url, &[]).await {
            Ok(policy) => policy.grants_public_access(),
            Err(e) => {
                debug!(bucket = bucket, error = %e, "Could not read bucket IAM policy");
                false
            }
        }
    }
}

#[async_trait]
impl ServiceClient for StorageClient {
    fn service(&self) -> Service {
        Service::Storage
    }

    async fn collect(&self, scopes: &ScopeSet) -> Result<Resources, ServiceError> {
        let mut resources = Resources::new();
        for project in scopes.iter() {
            let buckets = self
                .http
                .list_all::<BucketsPage>(&self.base, &[("project", project)])
                .await?;
            for bucket in buckets {
                let public = self.is_public(&bucket.name).await;
                resources.push(bucket_resource(&self.identity, project, &bucket.name, public));
            }
        }
        Ok(resources)
    }

    async fn probe(&self, scope: &str) -> Result<(), ServiceError> {
        self.http
            .get_json::<serde_json::Value>(&self.base, &[("project", scope), ("maxResults", "1")])
            .await?;
        Ok(())
    }
}
