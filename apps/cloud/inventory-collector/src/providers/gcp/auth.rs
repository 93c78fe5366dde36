//! Service account authentication.
//!
//! A service account JSON key is exchanged for an OAuth2 access token with a
//! signed JWT assertion (RS256). Tokens are cached until shortly before they
//! expire.

use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;

use super::{GcpError, GcpResult};

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
/// Refresh this many seconds before the token expires
const EXPIRY_MARGIN_SECS: i64 = 60;
const ASSERTION_LIFETIME_SECS: i64 = 3600;

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

/// Service account key structure (from Google JSON key file)
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    #[serde(rename = "type")]
    pub key_type: Option<String>,
    pub client_email: String,
    /// RSA private key in PEM format
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

impl std::fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("private_key_id", &self.private_key_id)
            .field("project_id", &self.project_id)
            .field("token_uri", &self.token_uri)
            .finish_non_exhaustive()
    }
}

/// Accepted raw credential shapes.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawCredential {
    ServiceAccount(ServiceAccountKey),
    AccessToken { access_token: String },
}

enum Credentials {
    ServiceAccount {
        key: ServiceAccountKey,
        signing_key: EncodingKey,
    },
    /// Pre-minted bearer token, never refreshed
    AccessToken(String),
}

#[derive(Clone)]
struct CachedToken {
    access_token: String,
    expires_at: i64,
}

/// JWT claims for the Google OAuth2 JWT-bearer grant
#[derive(Debug, Serialize)]
struct JwtClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

/// Token response from Google OAuth2
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

/// Registered credential shared by every service client.
pub struct TokenSource {
    credentials: Credentials,
    cache: RwLock<Option<CachedToken>>,
}

impl TokenSource {
    /// Parse and validate raw credential material.
    ///
    /// Accepts a service account JSON key or `{"access_token": "..."}`.
    pub fn from_json(raw: &[u8]) -> GcpResult<Self> {
        let raw: RawCredential = serde_json::from_slice(raw)
            .map_err(|e| GcpError::Credential(format!("could not parse credential JSON: {}", e)))?;

        let credentials = match raw {
            RawCredential::ServiceAccount(key) => {
                match key.key_type.as_deref() {
                    None | Some("service_account") => {}
                    Some(other) => {
                        return Err(GcpError::Credential(format!(
                            "unsupported credential type '{}'",
                            other
                        )));
                    }
                }
                let signing_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
                    .map_err(|e| GcpError::Credential(format!("invalid private key: {}", e)))?;
                debug!(client_email = %key.client_email, "Registered service account");
                Credentials::ServiceAccount { key, signing_key }
            }
            RawCredential::AccessToken { access_token } => {
                if access_token.trim().is_empty() {
                    return Err(GcpError::Credential("empty access token".to_string()));
                }
                Credentials::AccessToken(access_token)
            }
        };

        Ok(Self {
            credentials,
            cache: RwLock::new(None),
        })
    }

    /// Project the key was issued in, when the key says so.
    pub fn key_project(&self) -> Option<&str> {
        match &self.credentials {
            Credentials::ServiceAccount { key, .. } => key.project_id.as_deref(),
            Credentials::AccessToken(_) => None,
        }
    }

    /// Get a valid access token, refreshing if necessary
    pub async fn access_token(&self, client: &Client) -> GcpResult<String> {
        let (key, signing_key) = match &self.credentials {
            Credentials::AccessToken(token) => return Ok(token.clone()),
            Credentials::ServiceAccount { key, signing_key } => (key, signing_key),
        };

        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.as_ref() {
                if cached.expires_at > Utc::now().timestamp() + EXPIRY_MARGIN_SECS {
                    return Ok(cached.access_token.clone());
                }
            }
        }

        let token = fetch_access_token(client, key, signing_key).await?;
        let access_token = token.access_token.clone();

        let mut cache = self.cache.write().await;
        *cache = Some(CachedToken {
            access_token: token.access_token,
            expires_at: Utc::now().timestamp() + token.expires_in,
        });

        Ok(access_token)
    }
}

/// Exchange a signed JWT assertion for an access token
async fn fetch_access_token(
    client: &Client,
    key: &ServiceAccountKey,
    signing_key: &EncodingKey,
) -> GcpResult<TokenResponse> {
    let now = Utc::now().timestamp();
    let claims = JwtClaims {
        iss: &key.client_email,
        scope: CLOUD_PLATFORM_SCOPE,
        aud: &key.token_uri,
        iat: now,
        exp: now + ASSERTION_LIFETIME_SECS,
    };

    let mut header = Header::new(Algorithm::RS256);
    header.kid = key.private_key_id.clone();
    let assertion = jsonwebtoken::encode(&header, &claims, signing_key)
        .map_err(|e| GcpError::Auth(format!("could not sign assertion: {}", e)))?;

    let response = client
        .post(&key.token_uri)
        .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
        .send()
        .await?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(GcpError::Auth(format!(
            "token exchange failed with status {}: {}",
            status, body
        )));
    }

    debug!(client_email = %key.client_email, "Minted access token");
    response
        .json::<TokenResponse>()
        .await
        .map_err(|e| GcpError::Auth(format!("could not parse token response: {}", e)))
}
