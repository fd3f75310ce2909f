//! Network access for the gateway.
//!
//! ### Network trait
//! - Strategies talk to the network only through [`Network`], so a scripted
//!   implementation can stand in for the real one.
//! - Any received response is `Ok`, whatever its status. Only transport
//!   failures (refused, reset, DNS, timeout) are errors.
//!
//! ### URL resolution
//! - Relative references resolve against the site origin.
//! - Lowercase host, remove fragments, preserve query string.
//! - Same-origin requests and allow-listed hosts are intercepted; the rest pass through.

pub mod request;
pub mod url;

use bytes::Bytes;
use reqwest::Client;
use std::time::{Duration, Instant};

pub use request::{GatewayRequest, GatewayResponse, RequestMode};
pub use url::{Scope, UrlError, resolve};

use offgrid_core::{AppConfig, Error};

/// Source of responses for intercepted requests.
#[async_trait::async_trait]
pub trait Network: Send + Sync {
    /// Perform the request and return whatever the server answered.
    async fn fetch(&self, request: &GatewayRequest) -> Result<GatewayResponse, Error>;
}

/// Configuration for the HTTP network.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "offgrid/0.1")
    pub user_agent: String,

    /// Request timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self { user_agent: "offgrid/0.1".to_string(), timeout: Duration::from_millis(20000), max_redirects: 5 }
    }
}

impl From<&AppConfig> for FetchConfig {
    fn from(config: &AppConfig) -> Self {
        Self { user_agent: config.user_agent.clone(), timeout: config.request_timeout(), ..Default::default() }
    }
}

/// reqwest-backed network.
pub struct HttpNetwork {
    http: Client,
    config: FetchConfig,
}

impl HttpNetwork {
    /// Create a new HTTP network with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::Network(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }
}

fn transport_error(err: reqwest::Error, url: &::url::Url) -> Error {
    if err.is_timeout() {
        Error::FetchTimeout(format!("{url}: {err}"))
    } else {
        Error::Network(format!("{url}: {err}"))
    }
}

#[async_trait::async_trait]
impl Network for HttpNetwork {
    async fn fetch(&self, request: &GatewayRequest) -> Result<GatewayResponse, Error> {
        let start = Instant::now();

        let mut builder = self
            .http
            .request(request.method.clone(), request.url.as_str())
            .headers(request.headers.clone());
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await.map_err(|e| transport_error(e, &request.url))?;

        let status = response.status();
        let final_url = response.url().clone();
        let headers = response.headers().clone();
        let body: Bytes = response.bytes().await.map_err(|e| transport_error(e, &request.url))?;

        tracing::debug!(
            method = %request.method,
            url = %request.url,
            status = status.as_u16(),
            bytes = body.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "network fetch"
        );

        Ok(GatewayResponse { url: final_url, status, headers, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::{Method, StatusCode};

    #[test]
    fn test_fetch_config_default() {
        let config = FetchConfig::default();
        assert_eq!(config.user_agent, "offgrid/0.1");
        assert_eq!(config.timeout, Duration::from_millis(20000));
        assert_eq!(config.max_redirects, 5);
    }

    #[test]
    fn test_fetch_config_from_app_config() {
        let app = AppConfig { user_agent: "studio/2".into(), request_timeout_ms: 1500, ..Default::default() };
        let config = FetchConfig::from(&app);
        assert_eq!(config.user_agent, "studio/2");
        assert_eq!(config.timeout, Duration::from_millis(1500));
    }

    #[tokio::test]
    async fn test_http_network_returns_non_success_as_ok() {
        let mut server = mockito::Server::new_async().await;
        let mock = server.mock("GET", "/missing").with_status(404).with_body("nope").create_async().await;

        let network = HttpNetwork::new(FetchConfig::default()).unwrap();
        let url = ::url::Url::parse(&format!("{}/missing", server.url())).unwrap();
        let response = network.fetch(&GatewayRequest::get(url)).await.unwrap();

        mock.assert_async().await;
        assert_eq!(response.status, StatusCode::NOT_FOUND);
        assert_eq!(response.body.as_ref(), b"nope");
    }

    #[tokio::test]
    async fn test_http_network_posts_json() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/contact")
            .match_header("content-type", "application/json")
            .match_body(mockito::Matcher::JsonString(r#"{"name":"Ada"}"#.to_string()))
            .with_status(201)
            .create_async()
            .await;

        let network = HttpNetwork::new(FetchConfig::default()).unwrap();
        let url = ::url::Url::parse(&format!("{}/api/contact", server.url())).unwrap();
        let request = GatewayRequest::post_json(url, &serde_json::json!({"name": "Ada"})).unwrap();
        assert_eq!(request.method, Method::POST);

        let response = network.fetch(&request).await.unwrap();
        mock.assert_async().await;
        assert!(response.is_success());
    }

    #[tokio::test]
    async fn test_http_network_connection_refused_is_network_error() {
        let network = HttpNetwork::new(FetchConfig { timeout: Duration::from_secs(2), ..Default::default() }).unwrap();
        let url = ::url::Url::parse("http://127.0.0.1:9/").unwrap();
        let err = network.fetch(&GatewayRequest::get(url)).await.unwrap_err();
        assert!(err.is_network_failure());
    }
}
