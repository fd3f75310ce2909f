//! Request and response model shared by the network layer and the gateway.

use bytes::Bytes;
use offgrid_core::{CachedResponse, Error};
use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use url::Url;

/// How the page issued the request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum RequestMode {
    /// Full-page load.
    Navigate,
    #[default]
    SameOrigin,
    Cors,
    NoCors,
}

/// An intercepted request.
#[derive(Debug, Clone)]
pub struct GatewayRequest {
    pub url: Url,
    pub method: Method,
    pub mode: RequestMode,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

impl GatewayRequest {
    pub fn new(method: Method, url: Url, mode: RequestMode) -> Self {
        Self { url, method, mode, headers: HeaderMap::new(), body: None }
    }

    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url, RequestMode::SameOrigin)
    }

    pub fn navigate(url: Url) -> Self {
        Self::new(Method::GET, url, RequestMode::Navigate)
    }

    /// Build a request from a method name as received over the wire.
    pub fn parse(method: &str, url: Url, mode: RequestMode) -> Result<Self, Error> {
        let name = method.trim().to_ascii_uppercase();
        if name.is_empty() {
            return Err(Error::InvalidInput("method cannot be empty".into()));
        }
        let method = Method::from_bytes(name.as_bytes())
            .map_err(|e| Error::InvalidInput(format!("invalid method {method}: {e}")))?;
        Ok(Self::new(method, url, mode))
    }

    /// Attach a body, with an optional content type.
    pub fn with_body(mut self, body: impl Into<Bytes>, content_type: Option<&str>) -> Result<Self, Error> {
        if let Some(content_type) = content_type {
            let value = HeaderValue::from_str(content_type)
                .map_err(|e| Error::InvalidInput(format!("invalid content type {content_type}: {e}")))?;
            self.headers.insert(header::CONTENT_TYPE, value);
        }
        self.body = Some(body.into());
        Ok(self)
    }

    /// A POST carrying `payload` as a JSON body.
    pub fn post_json(url: Url, payload: &serde_json::Value) -> Result<Self, Error> {
        let body = serde_json::to_vec(payload)?;
        let mut request = Self::new(Method::POST, url, RequestMode::SameOrigin);
        request
            .headers
            .insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        request.body = Some(Bytes::from(body));
        Ok(request)
    }

    /// Read requests are the only ones the cache ever answers or stores.
    pub fn is_read(&self) -> bool {
        self.method == Method::GET
    }

    pub fn is_navigation(&self) -> bool {
        self.mode == RequestMode::Navigate
    }
}

/// A response, from the network or rebuilt from a cache store.
#[derive(Debug, Clone)]
pub struct GatewayResponse {
    pub url: Url,
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl GatewayResponse {
    /// 2xx status.
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok())
    }

    /// Snapshot for storage under `method`.
    ///
    /// Headers that are not valid UTF-8 are dropped.
    pub fn to_cached(&self, method: &Method) -> CachedResponse {
        let headers = self
            .headers
            .iter()
            .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str().to_string(), v.to_string())))
            .collect();

        CachedResponse {
            url: self.url.to_string(),
            method: method.as_str().to_string(),
            status: self.status.as_u16(),
            headers,
            body: self.body.to_vec(),
            stored_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Rebuild a response from a stored entry.
    pub fn from_cached(cached: CachedResponse) -> Result<Self, Error> {
        let url = Url::parse(&cached.url).map_err(|e| Error::InvalidUrl(format!("{}: {e}", cached.url)))?;
        let status = StatusCode::from_u16(cached.status)
            .map_err(|e| Error::Store(format!("invalid stored status {}: {e}", cached.status)))?;

        let mut headers = HeaderMap::with_capacity(cached.headers.len());
        for (name, value) in &cached.headers {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| Error::Store(e.to_string()))?;
            let value = HeaderValue::from_str(value).map_err(|e| Error::Store(e.to_string()))?;
            headers.append(name, value);
        }

        Ok(Self { url, status, headers, body: Bytes::from(cached.body) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn url(path: &str) -> Url {
        Url::parse("https://studio.example").unwrap().join(path).unwrap()
    }

    #[test]
    fn test_post_json_sets_body_and_content_type() {
        let request = GatewayRequest::post_json(url("/api/contact"), &json!({"name": "Ada"})).unwrap();
        assert_eq!(request.method, Method::POST);
        assert!(!request.is_read());
        assert_eq!(request.headers.get(header::CONTENT_TYPE).unwrap(), "application/json");
        assert_eq!(request.body.as_deref(), Some(br#"{"name":"Ada"}"#.as_slice()));
    }

    #[test]
    fn test_parse_method_is_case_insensitive() {
        let request = GatewayRequest::parse(" delete ", url("/api/x"), RequestMode::Cors).unwrap();
        assert_eq!(request.method, Method::DELETE);
        assert_eq!(request.mode, RequestMode::Cors);

        assert!(GatewayRequest::parse("", url("/"), RequestMode::SameOrigin).is_err());
        assert!(GatewayRequest::parse("GE T", url("/"), RequestMode::SameOrigin).is_err());
    }

    #[test]
    fn test_with_body_sets_content_type() {
        let request = GatewayRequest::parse("PUT", url("/api/x"), RequestMode::SameOrigin)
            .unwrap()
            .with_body("a=1", Some("application/x-www-form-urlencoded"))
            .unwrap();
        assert_eq!(request.headers.get(header::CONTENT_TYPE).unwrap(), "application/x-www-form-urlencoded");
        assert_eq!(request.body.as_deref(), Some(b"a=1".as_slice()));
    }

    #[test]
    fn test_navigate_is_read() {
        let request = GatewayRequest::navigate(url("/"));
        assert!(request.is_navigation());
        assert!(request.is_read());
    }

    #[test]
    fn test_cached_conversion_keeps_status_headers_body() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/css"));
        let response = GatewayResponse {
            url: url("/app.css"),
            status: StatusCode::OK,
            headers,
            body: Bytes::from_static(b"body{}"),
        };

        let cached = response.to_cached(&Method::GET);
        assert_eq!(cached.method, "GET");
        assert_eq!(cached.status, 200);

        let rebuilt = GatewayResponse::from_cached(cached).unwrap();
        assert_eq!(rebuilt.url, response.url);
        assert_eq!(rebuilt.content_type(), Some("text/css"));
        assert_eq!(rebuilt.body, response.body);
    }

    #[test]
    fn test_request_mode_wire_names() {
        let mode: RequestMode = serde_json::from_str(r#""no-cors""#).unwrap();
        assert_eq!(mode, RequestMode::NoCors);
        assert_eq!(serde_json::to_string(&RequestMode::Navigate).unwrap(), r#""navigate""#);
    }
}
