//! Cloud Functions HTTPS trigger hosts.

use async_trait::async_trait;
use domain_inventory::{ProviderIdentity, Resource, Resources, ScopeSet, Service, ServiceClient, ServiceError};
use serde::Deserialize;

use super::http::{GcpHttp, Page, url_host};

#[derive(Debug, Deserialize)]
struct HttpsTrigger {
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CloudFunction {
    /// Full resource name, `projects/<p>/locations/<l>/functions/<f>`
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    https_trigger: Option<HttpsTrigger>,
    #[serde(default)]
    ingress_settings: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FunctionsPage {
    #[serde(default)]
    functions: Vec<CloudFunction>,
    next_page_token: Option<String>,
}

impl Page for FunctionsPage {
    type Item = CloudFunction;

    fn into_parts(self) -> (Vec<CloudFunction>, Option<String>) {
        (self.functions, self.next_page_token)
    }
}

/// Event-triggered functions have no host and are not reported.
fn function_resource(identity: &ProviderIdentity, scope: &str, function: &CloudFunction) -> Option<Resource> {
    let host = function
        .https_trigger
        .as_ref()
        .and_then(|trigger| trigger.url.as_deref())
        .and_then(url_host)?;
    let internal = function.ingress_settings.as_deref() == Some("ALLOW_INTERNAL_ONLY");

    let mut resource = identity
        .resource(Service::CloudFunction, scope)
        .with_dns_name(host)
        .public(!internal);
    if let Some(name) = &function.name {
        resource = resource.with_name(name.as_str());
    }
    Some(resource)
}

pub struct FunctionsClient {
    http: GcpHttp,
    base: String,
    identity: ProviderIdentity,
}

impl FunctionsClient {
    pub fn new(http: GcpHttp, base: &str, identity: ProviderIdentity) -> Self {
        Self {
            http,
            base: format!("{}/v1/projects", base),
            identity,
        }
    }
}

#[async_trait]
impl ServiceClient for FunctionsClient {
    fn service(&self) -> Service {
        Service::CloudFunction
    }

    async fn collect(&self, scopes: &ScopeSet) -> Result<Resources, ServiceError> {
        let mut resources = Resources::new();
        for project in scopes.iter() {
            let url = format!("{}/{}/locations/-/functions", self.base, project);
            let functions = self.http.list_all::<FunctionsPage>(&url, &[]).await?;
            resources.extend(
                functions
                    .iter()
                    .filter_map(|function| function_resource(&self.identity, project, function)),
            );
        }
        Ok(resources)
    }

    async fn probe(&self, scope: &str) -> Result<(), ServiceError> {
        let url = format!("{}/{}/locations", self.base, scope);
        self.http
            .get_json::<serde_json::Value>(&url, &[("pageSize", "1")])
            .await?;
        Ok(())
    }
}
