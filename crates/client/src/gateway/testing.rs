//! Scripted network and gateway harness shared by the gateway tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use offgrid_core::{AppConfig, CacheDb, CachedResponse, Error};
use reqwest::header::HeaderMap;
use reqwest::{Method, StatusCode};
use url::Url;

use super::strategy::{FetchOutcome, Interception};
use super::{Gateway, GatewayOptions, TracingNotifier, WindowRegistry};
use crate::fetch::{GatewayRequest, GatewayResponse, Network, RequestMode, resolve};

pub(crate) const ORIGIN: &str = "https://studio.example";

/// Scripted answer for one URL.
#[derive(Debug, Clone)]
pub(crate) enum Reply {
    Ok(String),
    Status(u16),
    /// Transport failure.
    Fail,
    /// 200 with the body, after the delay.
    Delayed(Duration, String),
}

impl Reply {
    pub(crate) fn ok(body: &str) -> Self {
        Reply::Ok(body.to_string())
    }
}

/// Network that answers from a script. Unscripted URLs fail like a refused connection.
pub(crate) struct ScriptedNetwork {
    origin: Url,
    replies: Mutex<HashMap<String, Reply>>,
    requests: Mutex<Vec<GatewayRequest>>,
    offline: AtomicBool,
}

impl ScriptedNetwork {
    fn new(origin: Url) -> Self {
        Self { origin, replies: Mutex::default(), requests: Mutex::default(), offline: AtomicBool::new(false) }
    }

    pub(crate) fn reply(&self, path: &str, reply: Reply) {
        let url = resolve(&self.origin, path).unwrap();
        self.replies.lock().unwrap().insert(url.to_string(), reply);
    }

    /// Fail every request from now on.
    pub(crate) fn go_offline(&self) {
        self.offline.store(true, Ordering::SeqCst);
    }

    pub(crate) fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub(crate) fn requests(&self) -> Vec<GatewayRequest> {
        self.requests.lock().unwrap().clone()
    }
}

fn response(url: &Url, status: u16, body: String) -> GatewayResponse {
    GatewayResponse {
        url: url.clone(),
        status: StatusCode::from_u16(status).unwrap(),
        headers: HeaderMap::new(),
        body: Bytes::from(body),
    }
}

#[async_trait::async_trait]
impl Network for ScriptedNetwork {
    async fn fetch(&self, request: &GatewayRequest) -> Result<GatewayResponse, Error> {
        self.requests.lock().unwrap().push(request.clone());
        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::Network(format!("{}: offline", request.url)));
        }

        let reply = self.replies.lock().unwrap().get(request.url.as_str()).cloned();
        match reply {
            Some(Reply::Ok(body)) => Ok(response(&request.url, 200, body)),
            Some(Reply::Status(status)) => Ok(response(&request.url, status, String::new())),
            Some(Reply::Delayed(delay, body)) => {
                tokio::time::sleep(delay).await;
                Ok(response(&request.url, 200, body))
            }
            Some(Reply::Fail) | None => Err(Error::Network(format!("{}: connection refused", request.url))),
        }
    }
}

pub(crate) struct Harness {
    pub gateway: Gateway,
    pub network: Arc<ScriptedNetwork>,
    pub notifier: Arc<TracingNotifier>,
    pub windows: WindowRegistry,
}

impl Harness {
    pub(crate) async fn new() -> Self {
        Self::with_config(AppConfig { origin: ORIGIN.into(), ..Default::default() }).await
    }

    pub(crate) async fn with_navigation_timeout(timeout: Duration) -> Self {
        let config =
            AppConfig { origin: ORIGIN.into(), navigation_timeout_ms: timeout.as_millis() as u64, ..Default::default() };
        Self::with_config(config).await
    }

    async fn with_config(config: AppConfig) -> Self {
        let options = GatewayOptions::from_config(&config).unwrap();
        let db = CacheDb::open_in_memory().await.unwrap();
        let network = Arc::new(ScriptedNetwork::new(options.origin.clone()));
        let notifier = Arc::new(TracingNotifier::new());
        let windows = WindowRegistry::new();

        let gateway = Gateway::new(db, network.clone(), notifier.clone(), Arc::new(windows.clone()), options);
        Self { gateway, network, notifier, windows }
    }

    pub(crate) fn url(&self, path: &str) -> Url {
        self.gateway.resolve(path).unwrap()
    }

    pub(crate) fn get(&self, path: &str) -> GatewayRequest {
        GatewayRequest::get(self.url(path))
    }

    pub(crate) fn navigate(&self, path: &str) -> GatewayRequest {
        GatewayRequest::navigate(self.url(path))
    }

    pub(crate) fn request(&self, method: Method, path: &str) -> GatewayRequest {
        GatewayRequest::new(method, self.url(path), RequestMode::SameOrigin)
    }

    /// Run a request that is expected to be intercepted and succeed.
    pub(crate) async fn fetch(&self, request: GatewayRequest) -> FetchOutcome {
        match self.gateway.handle_fetch(request).await.unwrap() {
            Interception::Handled(outcome) => outcome,
            Interception::Passthrough => panic!("request was not intercepted"),
        }
    }

    /// Store a 200 GET response in the live store.
    pub(crate) async fn seed(&self, path: &str, body: &str) {
        let store = self.gateway.version().to_string();
        self.seed_store(&store, path, body).await;
    }

    pub(crate) async fn seed_store(&self, store: &str, path: &str, body: &str) {
        let cached = CachedResponse {
            url: self.url(path).to_string(),
            method: "GET".into(),
            status: 200,
            headers: Vec::new(),
            body: body.as_bytes().to_vec(),
            stored_at: chrono::Utc::now().to_rfc3339(),
        };
        self.gateway.db().put_response(store, &cached).await.unwrap();
    }

    /// Body of the live store's GET entry for `path`.
    pub(crate) async fn cached_body(&self, path: &str) -> Option<Vec<u8>> {
        let url = self.url(path);
        self.gateway
            .db()
            .match_response(self.gateway.version(), "GET", url.as_str())
            .await
            .unwrap()
            .map(|cached| cached.body)
    }
}
