//! Shared provider connection and the access token cache
//!
//! ProviderConfig is built once during provider configuration and shared by
//! every resource and data source. It owns the base server URL, the HTTP
//! connection pool, and a process-wide cache of the app access token so
//! repeated reads don't re-run the OAuth exchange.

use super::error::ApiError;
use reqwest::{Client as HttpClient, ClientBuilder};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use url::Url;

pub struct ProviderConfig {
    http: HttpClient,
    server: String,
    access_token: RwLock<Option<String>>,
}

/// Handle for talking to one Mastodon server, optionally authenticated.
/// Cheap to clone, endpoint methods live in the sibling modules.
#[derive(Clone)]
pub struct Client {
    pub(super) http: HttpClient,
    pub(super) server: String,
    pub(super) access_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

impl ProviderConfig {
    pub fn new(domain: &str, use_https: bool) -> Result<Arc<Self>, ApiError> {
        let scheme = if use_https { "https" } else { "http" };
        let server = format!("{}://{}", scheme, domain.trim_end_matches('/'));

        Url::parse(&server).map_err(|e| ApiError::InvalidUrl(format!("{}: {}", server, e)))?;

        let http = ClientBuilder::new()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Arc::new(Self {
            http,
            server,
            access_token: RwLock::new(None),
        }))
    }

    pub fn server(&self) -> &str {
        &self.server
    }

    pub fn unauthenticated_client(&self) -> Client {
        Client {
            http: self.http.clone(),
            server: self.server.clone(),
            access_token: None,
        }
    }

    fn client_with_token(&self, access_token: &str) -> Client {
        Client {
            http: self.http.clone(),
            server: self.server.clone(),
            access_token: Some(access_token.to_string()),
        }
    }

    async fn cached_access_token(&self) -> Option<String> {
        self.access_token.read().await.clone()
    }

    /// Build a client holding an app access token.
    ///
    /// An explicitly supplied token is used as-is without touching the
    /// cache. Otherwise the cache is probed under a read lock, and on a
    /// miss the write lock is held across the OAuth exchange. Callers
    /// racing through a cold cache may each run the exchange; the last
    /// stored token wins, and every caller still gets a valid client.
    pub async fn authenticated_client(
        &self,
        client_id: &str,
        client_secret: &str,
        access_token: &str,
    ) -> Result<Client, ApiError> {
        if !access_token.is_empty() {
            return Ok(self.client_with_token(access_token));
        }

        if let Some(cached) = self.cached_access_token().await {
            return Ok(self.client_with_token(&cached));
        }

        let mut cache = self.access_token.write().await;

        let token = self.authenticate_app(client_id, client_secret).await?;
        *cache = Some(token.clone());

        Ok(self.client_with_token(&token))
    }

    /// OAuth client credentials exchange against /oauth/token
    async fn authenticate_app(
        &self,
        client_id: &str,
        client_secret: &str,
    ) -> Result<String, ApiError> {
        let url = format!("{}/oauth/token", self.server);
        tracing::debug!(%url, "authenticating app");

        let params = [
            ("client_id", client_id),
            ("client_secret", client_secret),
            ("grant_type", "client_credentials"),
            ("redirect_uri", "urn:ietf:wg:oauth:2.0:oob"),
        ];

        let response = self.http.post(url).form(&params).send().await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ApiError::AuthenticationFailed {
                status: status.as_u16(),
                message,
            });
        }

        let token: TokenResponse = response.json().await?;
        Ok(token.access_token)
    }
}

impl Client {
    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }

    pub(super) fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.request(reqwest::Method::GET, path)
    }

    pub(super) fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.request(reqwest::Method::POST, path)
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.server, path);
        let builder = self.http.request(method, url);

        match &self.access_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }
}

/// Turn a non-2xx response into an ApiError, or hand back the response
pub(super) async fn check_response(
    response: reqwest::Response,
) -> Result<reqwest::Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    tracing::error!(status = status.as_u16(), %message, "API error response");

    Err(ApiError::Api {
        status: status.as_u16(),
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;

    fn config_for(server: &mockito::Server) -> Arc<ProviderConfig> {
        let domain = server.url().trim_start_matches("http://").to_string();
        ProviderConfig::new(&domain, false).unwrap()
    }

    #[test]
    fn server_url_uses_https_by_default() {
        let config = ProviderConfig::new("fedi.example", true).unwrap();
        assert_eq!(config.server(), "https://fedi.example");

        let config = ProviderConfig::new("fedi.example", false).unwrap();
        assert_eq!(config.server(), "http://fedi.example");
    }

    #[test]
    fn invalid_domain_is_rejected() {
        let result = ProviderConfig::new("not a domain", true);
        assert!(matches!(result, Err(ApiError::InvalidUrl(_))));
    }

    #[tokio::test]
    async fn explicit_token_skips_cache_and_exchange() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/oauth/token")
            .expect(0)
            .create_async()
            .await;

        let config = config_for(&server);
        let client = config
            .authenticated_client("id", "secret", "explicit-token")
            .await
            .unwrap();

        assert_eq!(client.access_token(), Some("explicit-token"));
        // Explicit tokens must not populate the cache either
        assert!(config.cached_access_token().await.is_none());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn first_call_exchanges_and_caches_token() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/oauth/token")
            .match_body(mockito::Matcher::AllOf(vec![
                mockito::Matcher::UrlEncoded("client_id".into(), "id".into()),
                mockito::Matcher::UrlEncoded("client_secret".into(), "secret".into()),
                mockito::Matcher::UrlEncoded("grant_type".into(), "client_credentials".into()),
            ]))
            .with_body(r#"{"access_token":"cached-token","token_type":"Bearer","scope":"read","created_at":1}"#)
            .expect(1)
            .create_async()
            .await;

        let config = config_for(&server);

        let first = config.authenticated_client("id", "secret", "").await.unwrap();
        assert_eq!(first.access_token(), Some("cached-token"));

        // Second call is served from the cache, no new exchange
        let second = config.authenticated_client("id", "secret", "").await.unwrap();
        assert_eq!(second.access_token(), Some("cached-token"));

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn failed_exchange_leaves_cache_empty() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/oauth/token")
            .with_status(401)
            .with_body(r#"{"error":"invalid_client"}"#)
            .create_async()
            .await;

        let config = config_for(&server);

        let result = config.authenticated_client("id", "wrong", "").await;
        match result {
            Err(ApiError::AuthenticationFailed { status: 401, .. }) => {}
            other => panic!("Expected AuthenticationFailed, got {:?}", other.map(|_| ())),
        }

        assert!(config.cached_access_token().await.is_none());

        // A later call retries the exchange instead of failing permanently
        let _mock_ok = server
            .mock("POST", "/oauth/token")
            .with_body(r#"{"access_token":"second-try","token_type":"Bearer","scope":"read","created_at":1}"#)
            .create_async()
            .await;

        let client = config.authenticated_client("id", "right", "").await.unwrap();
        assert_eq!(client.access_token(), Some("second-try"));
    }

    #[tokio::test]
    async fn concurrent_cold_cache_calls_all_get_tokens() {
        let mut server = Server::new_async().await;
        // Both callers may run the exchange if they race past the read
        // probe before either stores a token
        let _mock = server
            .mock("POST", "/oauth/token")
            .with_body(r#"{"access_token":"race-token","token_type":"Bearer","scope":"read","created_at":1}"#)
            .expect_at_least(1)
            .expect_at_most(2)
            .create_async()
            .await;

        let config = config_for(&server);

        let (a, b) = tokio::join!(
            config.authenticated_client("id", "secret", ""),
            config.authenticated_client("id", "secret", "")
        );

        assert_eq!(a.unwrap().access_token(), Some("race-token"));
        assert_eq!(b.unwrap().access_token(), Some("race-token"));
        assert_eq!(
            config.cached_access_token().await.as_deref(),
            Some("race-token")
        );
    }

    #[tokio::test]
    async fn client_handles_network_errors() {
        let config = ProviderConfig::new("localhost:1", false).unwrap();

        let result = config.authenticated_client("id", "secret", "").await;
        assert!(matches!(result, Err(ApiError::Request(_))));
    }
}
