//! Authenticated JSON requests and page-token pagination for Google APIs.

use std::sync::Arc;

use reqwest::{Client, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::trace;

use super::auth::TokenSource;
use super::{GcpError, GcpResult};

const USER_AGENT: &str = concat!("inventory-collector/", env!("CARGO_PKG_VERSION"));

/// A list response carrying one page of items.
pub trait Page: DeserializeOwned {
    type Item;

    fn into_parts(self) -> (Vec<Self::Item>, Option<String>);
}

/// Google API error envelope
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// HTTP client bound to a credential.
#[derive(Clone)]
pub struct GcpHttp {
    client: Client,
    auth: Arc<TokenSource>,
}

impl GcpHttp {
    pub fn new(auth: Arc<TokenSource>) -> GcpResult<Self> {
        let client = Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self { client, auth })
    }

    /// GET `url` and decode the JSON body.
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str, query: &[(&str, &str)]) -> GcpResult<T> {
        let token = self.auth.access_token(&self.client).await?;

        trace!(url = url, "GET");
        let response = self
            .client
            .get(url)
            .bearer_auth(token)
            .query(query)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorEnvelope>(&body)
                .map(|envelope| envelope.error.message)
                .unwrap_or(body);
            return Err(GcpError::Api {
                status: status.as_u16(),
                url: url.to_string(),
                message,
            });
        }

        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| GcpError::Parse {
            url: url.to_string(),
            details: e.to_string(),
        })
    }

    /// Fetch every page of a list call, following `nextPageToken`.
    pub async fn list_all<P: Page>(&self, url: &str, query: &[(&str, &str)]) -> GcpResult<Vec<P::Item>> {
        let mut items = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut params = query.to_vec();
            if let Some(token) = page_token.as_deref() {
                params.push(("pageToken", token));
            }

            let page: P = self.get_json(url, &params).await?;
            let (page_items, next) = page.into_parts();
            items.extend(page_items);

            match next {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        Ok(items)
    }
}

/// Host part of a URL such as `https://svc-abc-uc.a.run.app`.
pub fn url_host(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()
        .and_then(|parsed| parsed.host_str().map(str::to_string))
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param, query_param_is_missing};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    #[derive(Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct NamesPage {
        #[serde(default)]
        names: Vec<String>,
        next_page_token: Option<String>,
    }

    impl Page for NamesPage {
        type Item = String;

        fn into_parts(self) -> (Vec<String>, Option<String>) {
            (self.names, self.next_page_token)
        }
    }

    fn http() -> GcpHttp {
        let auth = TokenSource::from_json(br#"{"access_token": "test-token"}"#).unwrap();
        GcpHttp::new(Arc::new(auth)).unwrap()
    }

    #[tokio::test]
    async fn test_list_all_follows_page_tokens() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/items"))
            .and(query_param_is_missing("pageToken"))
            .and(header("authorization", "Bearer test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "names": ["a", "b"],
                "nextPageToken": "p2"
            })))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/items"))
            .and(query_param("pageToken", "p2"))
            .and(query_param("filter", "x"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "names": ["c"]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let url = format!("{}/items", server.uri());
        let names = http()
            .list_all::<NamesPage>(&url, &[("filter", "x")])
            .await
            .unwrap();

        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_api_error_message_is_extracted() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/denied"))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({
                "error": {
                    "code": 403,
                    "message": "Compute Engine API has not been used in project",
                    "status": "PERMISSION_DENIED"
                }
            })))
            .mount(&server)
            .await;

        let url = format!("{}/denied", server.uri());
        let err = http()
            .get_json::<serde_json::Value>(&url, &[])
            .await
            .unwrap_err();

        match err {
            GcpError::Api { status, message, .. } => {
                assert_eq!(status, 403);
                assert!(message.starts_with("Compute Engine API"));
            }
            other => panic!("expected api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_invalid_body_is_a_parse_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/garbage"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let url = format!("{}/garbage", server.uri());
        let err = http()
            .get_json::<serde_json::Value>(&url, &[])
            .await
            .unwrap_err();

        assert!(matches!(err, GcpError::Parse { .. }));
    }

    #[test]
    fn test_url_host() {
        assert_eq!(
            url_host("https://hello-abc123-uc.a.run.app").as_deref(),
            Some("hello-abc123-uc.a.run.app")
        );
        assert_eq!(
            url_host("https://us-central1-proj.cloudfunctions.net/fn").as_deref(),
            Some("us-central1-proj.cloudfunctions.net")
        );
        assert_eq!(url_host("not a url"), None);
    }
}
