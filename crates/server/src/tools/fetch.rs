//! gateway_fetch tool implementation.
//!
//! Offers a request to the gateway as if the controlled page had issued it.

use offgrid_client::{Gateway, GatewayRequest, GatewayResponse, Interception, RequestMode, ResponseSource};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::json_result;

/// Input parameters for the gateway_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GatewayFetchParams {
    /// URL to request. Relative references resolve against the site origin.
    pub url: String,

    /// HTTP method (default: GET).
    #[serde(default = "default_method")]
    pub method: String,

    /// Request mode: "navigate" for page loads (default: "same-origin").
    #[serde(default)]
    pub mode: RequestMode,

    /// Optional request body.
    #[serde(default)]
    pub body: Option<String>,

    /// Content-Type of the body.
    #[serde(default)]
    pub content_type: Option<String>,
}

fn default_method() -> String {
    "GET".into()
}

/// Output structure for the gateway_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GatewayFetchOutput {
    /// The resolved request URL.
    pub url: String,
    /// Whether the gateway handled the request. Passed-through requests go straight to the network.
    pub intercepted: bool,
    /// Where the response came from, for intercepted requests.
    pub source: Option<ResponseSource>,
    pub status: u16,
    pub content_type: Option<String>,
    /// Response body, lossily decoded as UTF-8.
    pub body: String,
    /// Body size in bytes.
    pub bytes: usize,
    /// Whether a background refresh of the cached entry was started.
    pub revalidating: bool,
}

impl GatewayFetchOutput {
    fn new(response: &GatewayResponse, intercepted: bool, source: Option<ResponseSource>, revalidating: bool) -> Self {
        Self {
            url: response.url.to_string(),
            intercepted,
            source,
            status: response.status.as_u16(),
            content_type: response.content_type().map(str::to_string),
            body: String::from_utf8_lossy(&response.body).into_owned(),
            bytes: response.body.len(),
            revalidating,
        }
    }
}

/// Implementation of the gateway_fetch tool.
pub async fn fetch_impl(gateway: &Gateway, params: GatewayFetchParams) -> Result<CallToolResult, McpError> {
    let url = gateway.resolve(&params.url)?;
    let mut request = GatewayRequest::parse(&params.method, url, params.mode)?;
    if let Some(body) = params.body {
        request = request.with_body(body, params.content_type.as_deref())?;
    }

    let output = match gateway.handle_fetch(request.clone()).await? {
        Interception::Handled(outcome) => {
            GatewayFetchOutput::new(&outcome.response, true, Some(outcome.source), outcome.revalidation.is_some())
        }
        Interception::Passthrough => {
            let response = gateway.network().fetch(&request).await?;
            GatewayFetchOutput::new(&response, false, None, false)
        }
    };

    tracing::debug!(url = %output.url, intercepted = output.intercepted, status = output.status, "gateway_fetch");
    json_result(&output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::{gateway, output};

    fn params(url: &str, mode: RequestMode) -> GatewayFetchParams {
        GatewayFetchParams { url: url.into(), method: default_method(), mode, body: None, content_type: None }
    }

    #[tokio::test]
    async fn test_navigation_is_cached_then_served_offline() {
        let mut server = mockito::Server::new_async().await;
        let page = server
            .mock("GET", "/about")
            .with_header("content-type", "text/html")
            .with_body("<h1>about</h1>")
            .expect(1)
            .create_async()
            .await;
        let gw = gateway(&server.url()).await;

        let result = fetch_impl(&gw, params("/about", RequestMode::Navigate)).await.unwrap();
        let first = output(&result);
        assert_eq!(first["source"], "network");
        assert_eq!(first["content_type"], "text/html");
        page.assert_async().await;

        // unmatched requests get a 501 from the mock server
        page.remove_async().await;
        let result = fetch_impl(&gw, params("/about", RequestMode::Navigate)).await.unwrap();
        let second = output(&result);
        assert_eq!(second["source"], "cache");
        assert_eq!(second["body"], "<h1>about</h1>");
    }

    #[tokio::test]
    async fn test_cross_origin_is_passed_through() {
        let mut server = mockito::Server::new_async().await;
        server.mock("GET", "/lib.js").with_body("x").create_async().await;

        let gw = gateway("https://studio.example").await;
        let url = format!("{}/lib.js", server.url());
        let result = fetch_impl(&gw, params(&url, RequestMode::Cors)).await.unwrap();
        let out = output(&result);
        assert_eq!(out["intercepted"], false);
        assert!(out["source"].is_null());
        assert_eq!(gw.db().count_entries(gw.version()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_invalid_method_rejected() {
        let gw = gateway("https://studio.example").await;
        let mut p = params("/", RequestMode::SameOrigin);
        p.method = "NOT A METHOD".into();
        assert!(fetch_impl(&gw, p).await.is_err());
    }
}
