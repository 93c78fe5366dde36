//! Project discovery through the Cloud Resource Manager v1 API.

use domain_inventory::ScopePage;
use serde::Deserialize;

use super::GcpResult;
use super::http::GcpHttp;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Project {
    project_id: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListProjectsResponse {
    #[serde(default)]
    projects: Vec<Project>,
    #[serde(default)]
    next_page_token: Option<String>,
}

fn into_page(response: ListProjectsResponse) -> ScopePage {
    ScopePage {
        scopes: response
            .projects
            .into_iter()
            .map(|project| project.project_id)
            .collect(),
        next_page_token: response.next_page_token.filter(|token| !token.is_empty()),
    }
}

/// Fetch one page of projects visible to the credential.
pub async fn list_projects_page(
    http: &GcpHttp,
    base: &str,
    page_token: Option<&str>,
) -> GcpResult<ScopePage> {
    let url = format!("{}/v1/projects", base);
    let mut query = Vec::new();
    if let Some(token) = page_token {
        query.push(("pageToken", token));
    }

    let response: ListProjectsResponse = http.get_json(&url, &query).await?;
    Ok(into_page(response))
}
