//! HTTP implementation of the [`MastodonApi`] trait on reqwest.
//!
//! One client instance per host. Unauthenticated clients serve trending
//! fetches from remote hosts; the publishing-host client carries the
//! long-lived access token. Rate-limit responses (429) are paced with a
//! bounded retry honoring `Retry-After`.

use std::time::Duration;

use serde::Serialize;

use super::types::{AppCredentials, SearchResults, Status};
use super::MastodonApi;
use crate::error::ApiError;

const USER_AGENT: &str = concat!("hype v", env!("CARGO_PKG_VERSION"));
const CLIENT_NAME: &str = "hype";
const OOB_URI: &str = "urn:ietf:wg:oauth:2.0:oob";

/// Requests are retried this many times on 429 before giving up.
const RATE_LIMIT_RETRIES: u32 = 2;

/// Backoff ceiling when a host sends an absurd `Retry-After`.
const MAX_BACKOFF_SECS: u64 = 30;

/// App registration payload for `POST /api/v1/apps`.
#[derive(Serialize)]
struct AppRegistration<'a> {
    client_name: &'a str,
    redirect_uris: &'a str,
    scopes: &'a str,
    website: &'a str,
}

/// A Mastodon API client bound to one host.
pub struct HttpMastodonClient {
    http: reqwest::Client,
    base_url: String,
    access_token: Option<String>,
}

impl HttpMastodonClient {
    fn build_http() -> Result<reqwest::Client, ApiError> {
        reqwest::Client::builder()
            .timeout(Duration::from_secs(20))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ApiError::Network { source: e })
    }

    /// Unauthenticated client for a remote host, named by DNS label.
    pub fn unauthenticated(host: &str) -> Result<Self, ApiError> {
        Ok(Self {
            http: Self::build_http()?,
            base_url: format!("https://{host}"),
            access_token: None,
        })
    }

    /// Authenticated client for the publishing host.
    pub fn with_token(host: &str, access_token: &str) -> Result<Self, ApiError> {
        Ok(Self {
            http: Self::build_http()?,
            base_url: format!("https://{host}"),
            access_token: Some(access_token.to_string()),
        })
    }

    /// Client against an explicit base URL. Used by tests to point at a
    /// local mock server.
    pub fn with_base_url(base_url: &str, access_token: Option<&str>) -> Result<Self, ApiError> {
        Ok(Self {
            http: Self::build_http()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            access_token: access_token.map(String::from),
        })
    }

    /// Register a new app with the host, yielding client credentials.
    /// The registry persists these so registration happens once per host.
    pub async fn register_app(&self) -> Result<AppCredentials, ApiError> {
        let url = format!("{}/api/v1/apps", self.base_url);
        let response = self
            .http
            .post(&url)
            .json(&AppRegistration {
                client_name: CLIENT_NAME,
                redirect_uris: OOB_URI,
                scopes: "read",
                website: "https://github.com/goingdark-social/hype",
            })
            .send()
            .await
            .map_err(|e| ApiError::Network { source: e })?;
        let response = Self::check_status(response).await?;
        response
            .json::<AppCredentials>()
            .await
            .map_err(|e| ApiError::Parse {
                message: e.to_string(),
            })
    }

    /// Issue a GET with bearer auth (when configured) and rate-limit pacing.
    async fn get(&self, url: &str, query: &[(&str, String)]) -> Result<reqwest::Response, ApiError> {
        let mut attempt = 0;
        loop {
            let mut req = self.http.get(url).query(query);
            if let Some(token) = &self.access_token {
                req = req.bearer_auth(token);
            }
            let response = req.send().await.map_err(|e| ApiError::Network { source: e })?;
            if response.status().as_u16() != 429 {
                return Self::check_status(response).await;
            }
            if attempt >= RATE_LIMIT_RETRIES {
                return Err(ApiError::RateLimited);
            }
            let wait = Self::retry_after(&response);
            tracing::debug!(url, wait_secs = wait.as_secs(), "rate limited, pacing");
            tokio::time::sleep(wait).await;
            attempt += 1;
        }
    }

    /// Issue an authenticated POST with rate-limit pacing.
    async fn post(&self, url: &str) -> Result<reqwest::Response, ApiError> {
        let mut attempt = 0;
        loop {
            let mut req = self.http.post(url);
            if let Some(token) = &self.access_token {
                req = req.bearer_auth(token);
            }
            let response = req.send().await.map_err(|e| ApiError::Network { source: e })?;
            if response.status().as_u16() != 429 {
                return Self::check_status(response).await;
            }
            if attempt >= RATE_LIMIT_RETRIES {
                return Err(ApiError::RateLimited);
            }
            let wait = Self::retry_after(&response);
            tracing::debug!(url, wait_secs = wait.as_secs(), "rate limited, pacing");
            tokio::time::sleep(wait).await;
            attempt += 1;
        }
    }

    fn retry_after(response: &reqwest::Response) -> Duration {
        let secs = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .unwrap_or(1);
        Duration::from_secs(secs.min(MAX_BACKOFF_SECS))
    }

    /// Map non-success statuses onto the error variants the engine reacts to.
    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let code = status.as_u16();
        let message = response.text().await.unwrap_or_default();
        Err(match code {
            404 => ApiError::NotFound { message },
            401 | 403 => ApiError::Unauthorized { message },
            _ => ApiError::Http {
                status: code,
                message,
            },
        })
    }

    async fn json_statuses(response: reqwest::Response) -> Result<Vec<Status>, ApiError> {
        response
            .json::<Vec<Status>>()
            .await
            .map_err(|e| ApiError::Parse {
                message: e.to_string(),
            })
    }
}

#[async_trait::async_trait]
impl MastodonApi for HttpMastodonClient {
    async fn trending_statuses(&self, limit: u32) -> Result<Vec<Status>, ApiError> {
        let url = format!("{}/api/v1/trends/statuses", self.base_url);
        let response = self.get(&url, &[("limit", limit.to_string())]).await?;
        Self::json_statuses(response).await
    }

    async fn timeline_local(&self, limit: u32) -> Result<Vec<Status>, ApiError> {
        let url = format!("{}/api/v1/timelines/public", self.base_url);
        let response = self
            .get(
                &url,
                &[("local", "true".to_string()), ("limit", limit.to_string())],
            )
            .await?;
        Self::json_statuses(response).await
    }

    async fn status_reblog(&self, status_id: &str) -> Result<Status, ApiError> {
        let url = format!("{}/api/v1/statuses/{status_id}/reblog", self.base_url);
        let response = self.post(&url).await?;
        response.json::<Status>().await.map_err(|e| ApiError::Parse {
            message: e.to_string(),
        })
    }

    async fn search_statuses(
        &self,
        query: &str,
        resolve: bool,
    ) -> Result<Vec<Status>, ApiError> {
        let url = format!("{}/api/v2/search", self.base_url);
        let response = self
            .get(
                &url,
                &[
                    ("q", query.to_string()),
                    ("type", "statuses".to_string()),
                    ("resolve", resolve.to_string()),
                ],
            )
            .await?;
        let results: SearchResults = response.json().await.map_err(|e| ApiError::Parse {
            message: e.to_string(),
        })?;
        Ok(results.statuses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn status_json(id: &str, uri: &str) -> serde_json::Value {
        serde_json::json!({
            "id": id,
            "uri": uri,
            "account": {"acct": "a@b"},
            "reblogs_count": 1,
            "favourites_count": 2,
            "replies_count": 0,
        })
    }

    #[tokio::test]
    async fn trending_statuses_passes_limit() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/trends/statuses"))
            .and(query_param("limit", "15"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(vec![status_json("1", "https://a/1")]),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = HttpMastodonClient::with_base_url(&server.uri(), None).expect("client");
        let statuses = client.trending_statuses(15).await.expect("fetch");
        assert_eq!(statuses.len(), 1);
        assert_eq!(statuses[0].id, "1");
    }

    #[tokio::test]
    async fn timeline_local_requests_local_only() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/timelines/public"))
            .and(query_param("local", "true"))
            .and(query_param("limit", "20"))
            .respond_with(ResponseTemplate::new(200).set_body_json(Vec::<Status>::new()))
            .expect(1)
            .mount(&server)
            .await;

        let client =
            HttpMastodonClient::with_base_url(&server.uri(), Some("token")).expect("client");
        let statuses = client.timeline_local(20).await.expect("fetch");
        assert!(statuses.is_empty());
    }

    #[tokio::test]
    async fn search_sets_resolve_and_type() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/search"))
            .and(query_param("q", "https://a/1"))
            .and(query_param("type", "statuses"))
            .and(query_param("resolve", "true"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "statuses": [status_json("9", "https://a/1")]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client =
            HttpMastodonClient::with_base_url(&server.uri(), Some("token")).expect("client");
        let results = client
            .search_statuses("https://a/1", true)
            .await
            .expect("search");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "9");
    }

    #[tokio::test]
    async fn reblog_maps_404_to_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/statuses/123/reblog"))
            .respond_with(ResponseTemplate::new(404).set_body_string("Record not found"))
            .mount(&server)
            .await;

        let client =
            HttpMastodonClient::with_base_url(&server.uri(), Some("token")).expect("client");
        let err = client.status_reblog("123").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn search_maps_403_to_unauthorized() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/search"))
            .respond_with(ResponseTemplate::new(403).set_body_string("scope missing"))
            .mount(&server)
            .await;

        let client =
            HttpMastodonClient::with_base_url(&server.uri(), Some("token")).expect("client");
        let err = client.search_statuses("q", true).await.unwrap_err();
        assert!(err.is_unauthorized());
    }

    #[tokio::test]
    async fn rate_limited_request_retries_then_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/trends/statuses"))
            .respond_with(
                ResponseTemplate::new(429).insert_header("retry-after", "0"),
            )
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/trends/statuses"))
            .respond_with(ResponseTemplate::new(200).set_body_json(Vec::<Status>::new()))
            .mount(&server)
            .await;

        let client = HttpMastodonClient::with_base_url(&server.uri(), None).expect("client");
        let statuses = client.trending_statuses(5).await.expect("fetch");
        assert!(statuses.is_empty());
    }

    #[tokio::test]
    async fn register_app_parses_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/apps"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "client_id": "cid",
                "client_secret": "csecret"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = HttpMastodonClient::with_base_url(&server.uri(), None).expect("client");
        let creds = client.register_app().await.expect("register");
        assert_eq!(creds.client_id, "cid");
        assert_eq!(creds.client_secret, "csecret");
    }
}
