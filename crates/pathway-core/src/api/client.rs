//! HTTP client for the Pathway backend's authentication endpoints.
//!
//! The client only knows how to talk to the wire: it turns non-success
//! statuses into [`ApiError`] and leaves the meaning of those failures to the
//! auth components that call it.

use std::fmt;
use std::time::Duration;

use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, warn};

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// Credential exchange endpoint, relative to the API base URL
const TOKEN_PATH: &str = "/auth/token/";

/// Refresh endpoint, relative to the API base URL
const TOKEN_REFRESH_PATH: &str = "/auth/token/refresh/";

/// Current user profile endpoint, relative to the API base URL
const PROFILE_PATH: &str = "/users/me/";

/// Maximum number of retries for rate-limited (429) idempotent requests.
/// Token exchange and refresh are never retried.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 500;

// ============================================================================
// Wire types
// ============================================================================

#[derive(Serialize)]
struct TokenRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct RefreshRequest<'a> {
    refresh: &'a str,
}

/// Body of a successful credential exchange. Both fields are required by
/// contract, but a misconfigured backend can omit either, so they stay
/// optional here and are checked by the verifier.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access: Option<String>,
    pub refresh: Option<String>,
}

/// Body of a successful refresh. Refresh-token rotation is optional.
#[derive(Debug, Clone, Deserialize)]
pub struct RefreshResponse {
    pub access: String,
    #[serde(default)]
    pub refresh: Option<String>,
}

/// Backends disagree on whether user ids are numbers or strings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ProfileId {
    Number(i64),
    Text(String),
}

impl fmt::Display for ProfileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProfileId::Number(n) => write!(f, "{}", n),
            ProfileId::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserProfile {
    pub id: ProfileId,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default, alias = "full_name")]
    pub name: Option<String>,
}

impl UserProfile {
    /// Best available display name, if the profile carries one
    pub fn display_name(&self) -> Option<String> {
        if let Some(name) = self.name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
            return Some(name.to_string());
        }
        let parts: Vec<&str> = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" "))
        }
    }
}

// ============================================================================
// Client
// ============================================================================

/// API client for the Pathway backend.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    /// Create a new API client rooted at `base_url`
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Exchange an email/password pair for an access/refresh token pair
    pub async fn obtain_token_pair(
        &self,
        email: &str,
        password: &str,
    ) -> Result<TokenResponse, ApiError> {
        let url = self.url(TOKEN_PATH);
        debug!(url = %url, "Requesting token pair");

        let response = self
            .client
            .post(&url)
            .json(&TokenRequest { email, password })
            .send()
            .await?;

        Self::parse_json(Self::check_response(response).await?).await
    }

    /// Exchange a refresh token for a new access token (and maybe a new
    /// refresh token). Never retried: many backends invalidate a refresh
    /// token after first use.
    pub async fn refresh_access_token(
        &self,
        refresh_token: &str,
    ) -> Result<RefreshResponse, ApiError> {
        let url = self.url(TOKEN_REFRESH_PATH);
        debug!(url = %url, "Refreshing access token");

        let response = self
            .client
            .post(&url)
            .json(&RefreshRequest {
                refresh: refresh_token,
            })
            .send()
            .await?;

        Self::parse_json(Self::check_response(response).await?).await
    }

    /// Fetch the profile of the user the access token belongs to
    pub async fn fetch_profile(&self, access_token: &str) -> Result<UserProfile, ApiError> {
        self.get(PROFILE_PATH, access_token).await
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    async fn parse_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| ApiError::UnexpectedBody(e.to_string()))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, token: &str) -> Result<T, ApiError> {
        let url = self.url(path);
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let response = self.client.get(&url).bearer_auth(token).send().await?;

            match Self::check_response(response).await {
                Ok(response) => return Self::parse_json(response).await,
                Err(ApiError::RateLimited) => {
                    retries += 1;
                    if retries > MAX_RATE_LIMIT_RETRIES {
                        return Err(ApiError::RateLimited);
                    }
                    warn!(url = %url, retry = retries, backoff_ms = backoff_ms, "Rate limited, backing off");
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms *= 2; // Exponential backoff
                }
                Err(e) => return Err(e),
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let client = ApiClient::new("http://localhost:8000/api/", Duration::from_secs(5))
            .expect("client should build");
        assert_eq!(client.base_url(), "http://localhost:8000/api");
        assert_eq!(
            client.url(TOKEN_REFRESH_PATH),
            "http://localhost:8000/api/auth/token/refresh/"
        );
    }

    #[test]
    fn test_parse_profile_numeric_and_string_ids() {
        let numeric: UserProfile =
            serde_json::from_str(r#"{"id": 42, "email": "a@b.com"}"#).expect("numeric id");
        assert_eq!(numeric.id.to_string(), "42");

        let text: UserProfile =
            serde_json::from_str(r#"{"id": "1", "email": "a@b.com"}"#).expect("string id");
        assert_eq!(text.id, ProfileId::Text("1".to_string()));
        assert_eq!(text.id.to_string(), "1");
    }

    #[test]
    fn test_profile_display_name() {
        let named: UserProfile =
            serde_json::from_str(r#"{"id": 1, "full_name": " Ada Lovelace "}"#).expect("named");
        assert_eq!(named.display_name().as_deref(), Some("Ada Lovelace"));

        let split: UserProfile =
            serde_json::from_str(r#"{"id": 1, "first_name": "Ada", "last_name": "Lovelace"}"#)
                .expect("split");
        assert_eq!(split.display_name().as_deref(), Some("Ada Lovelace"));

        let first_only: UserProfile =
            serde_json::from_str(r#"{"id": 1, "first_name": "Ada", "last_name": ""}"#)
                .expect("first only");
        assert_eq!(first_only.display_name().as_deref(), Some("Ada"));

        let anonymous: UserProfile = serde_json::from_str(r#"{"id": 1}"#).expect("anonymous");
        assert_eq!(anonymous.display_name(), None);
    }

    #[test]
    fn test_parse_token_response_with_missing_refresh() {
        let resp: TokenResponse = serde_json::from_str(r#"{"access": "a"}"#).expect("parse");
        assert_eq!(resp.access.as_deref(), Some("a"));
        assert!(resp.refresh.is_none());
    }

    #[test]
    fn test_parse_refresh_response_rotation_optional() {
        let rotated: RefreshResponse =
            serde_json::from_str(r#"{"access": "a2", "refresh": "r2"}"#).expect("rotated");
        assert_eq!(rotated.refresh.as_deref(), Some("r2"));

        let kept: RefreshResponse = serde_json::from_str(r#"{"access": "a2"}"#).expect("kept");
        assert!(kept.refresh.is_none());
    }
}
