//! The offline cache gateway.
//!
//! Intercepts the requests a page makes and answers them from a versioned
//! cache store, the network, or an offline fallback page:
//!
//! | Request class | Strategy |
//! |---|---|
//! | Navigation | network-first with a bounded wait, then cached copy, then offline page |
//! | API (path matches a pattern) | cache-first + background refresh for GET; network-only otherwise |
//! | Static asset | cache-first + background revalidation; network on miss |
//!
//! Besides fetch interception the gateway owns the install/activate
//! lifecycle, background sync of queued submissions, push notifications and
//! the command surface used by the controlled page. All of these are reached
//! through [`Gateway::dispatch`] or the individual methods.

pub mod commands;
pub mod events;
pub mod lifecycle;
pub mod platform;
pub mod push;
pub mod strategy;
pub mod sync;

#[cfg(test)]
mod testing;

use std::sync::Arc;
use std::time::Duration;

use offgrid_core::{AppConfig, CacheDb, Error};
use regex::Regex;
use tokio::sync::{RwLock, mpsc};
use url::Url;

use crate::fetch::{GatewayRequest, GatewayResponse, Network, Scope, resolve};

pub use commands::{Command, CommandReply};
pub use events::{EventOutcome, GatewayEvent};
pub use lifecycle::{ActivateReport, InstallReport, WorkerState};
pub use platform::{Clients, Notifier, TracingNotifier, WindowClient, WindowRegistry};
pub use push::{ClickOutcome, Notification, NotificationAction, NotificationDefaults};
pub use strategy::{FetchOutcome, Interception, RequestClass, ResponseSource};
pub use sync::{LAST_REFRESH_KEY, RefreshReport, SyncOutcome, SyncReport, SyncTag, UPDATE_CONTENT_TAG, run_sync_worker};

/// Resolved gateway settings.
#[derive(Debug, Clone)]
pub struct GatewayOptions {
    pub origin: Url,
    /// Name of the live cache store; doubles as the version identifier.
    pub cache_name: String,
    pub offline_url: String,
    pub navigation_timeout: Duration,
    pub critical_resources: Vec<String>,
    pub precache_assets: Vec<String>,
    pub api_patterns: Vec<Regex>,
    pub allowed_hosts: Vec<String>,
    pub contact_endpoint: String,
    pub booking_endpoint: String,
    pub notifications: NotificationDefaults,
}

impl GatewayOptions {
    /// Build options from validated configuration.
    pub fn from_config(config: &AppConfig) -> Result<Self, Error> {
        let origin = config.origin_url().map_err(|e| Error::InvalidUrl(e.to_string()))?;
        let api_patterns = config
            .api_patterns
            .iter()
            .map(|p| Regex::new(p).map_err(|e| Error::InvalidInput(format!("api pattern {p}: {e}"))))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            origin,
            cache_name: config.cache_version.clone(),
            offline_url: config.offline_url.clone(),
            navigation_timeout: config.navigation_timeout(),
            critical_resources: config.critical_resources.clone(),
            precache_assets: config.precache_assets.clone(),
            api_patterns,
            allowed_hosts: config.allowed_hosts.clone(),
            contact_endpoint: config.contact_endpoint.clone(),
            booking_endpoint: config.booking_endpoint.clone(),
            notifications: NotificationDefaults::from(config),
        })
    }
}

/// Handle to the gateway. Cheap to clone; clones share all state.
#[derive(Clone)]
pub struct Gateway {
    db: CacheDb,
    network: Arc<dyn Network>,
    notifier: Arc<dyn Notifier>,
    clients: Arc<dyn Clients>,
    options: Arc<GatewayOptions>,
    scope: Arc<Scope>,
    state: Arc<RwLock<WorkerState>>,
    sync_tx: Option<mpsc::UnboundedSender<SyncTag>>,
}

impl Gateway {
    pub fn new(
        db: CacheDb, network: Arc<dyn Network>, notifier: Arc<dyn Notifier>, clients: Arc<dyn Clients>,
        options: GatewayOptions,
    ) -> Self {
        let scope = Scope::new(options.origin.clone(), options.allowed_hosts.clone());
        Self {
            db,
            network,
            notifier,
            clients,
            options: Arc::new(options),
            scope: Arc::new(scope),
            state: Arc::new(RwLock::new(WorkerState::Parsed)),
            sync_tx: None,
        }
    }

    /// Attach the queue that sync registrations are delivered to.
    ///
    /// Without one, sync requests from the page are acknowledged but dropped.
    pub fn with_sync_queue(mut self, tx: mpsc::UnboundedSender<SyncTag>) -> Self {
        self.sync_tx = Some(tx);
        self
    }

    /// Version identifier of this gateway.
    pub fn version(&self) -> &str {
        &self.options.cache_name
    }

    pub fn options(&self) -> &GatewayOptions {
        &self.options
    }

    pub fn db(&self) -> &CacheDb {
        &self.db
    }

    pub fn network(&self) -> &Arc<dyn Network> {
        &self.network
    }

    pub async fn state(&self) -> WorkerState {
        *self.state.read().await
    }

    async fn set_state(&self, state: WorkerState) {
        let mut current = self.state.write().await;
        tracing::debug!(from = ?*current, to = ?state, "worker state change");
        *current = state;
    }

    /// Resolve a resource reference against the origin.
    pub fn resolve(&self, input: &str) -> Result<Url, Error> {
        resolve(&self.options.origin, input).map_err(|e| Error::InvalidUrl(format!("{input}: {e}")))
    }

    /// Cached response for a request in the live store, if any.
    ///
    /// Store failures are logged and treated as a miss so the strategy can
    /// fall through to its next option.
    async fn lookup(&self, request: &GatewayRequest) -> Option<GatewayResponse> {
        let cached = match self
            .db
            .match_response(&self.options.cache_name, request.method.as_str(), request.url.as_str())
            .await
        {
            Ok(cached) => cached?,
            Err(e) => {
                tracing::warn!(url = %request.url, error = %e, "cache lookup failed");
                return None;
            }
        };

        match GatewayResponse::from_cached(cached) {
            Ok(response) => Some(response),
            Err(e) => {
                tracing::warn!(url = %request.url, error = %e, "discarding unreadable cache entry");
                None
            }
        }
    }

    /// Store a response for a request in the live store.
    async fn store(&self, request: &GatewayRequest, response: &GatewayResponse) -> Result<(), Error> {
        let mut cached = response.to_cached(&request.method);
        cached.url = request.url.to_string();
        self.db.put_response(&self.options.cache_name, &cached).await
    }

    /// Store a response, logging instead of failing.
    async fn store_quietly(&self, request: &GatewayRequest, response: &GatewayResponse) {
        if let Err(e) = self.store(request, response).await {
            tracing::warn!(url = %request.url, error = %e, "failed to cache response");
        }
    }

    /// Fetch every URL and store all responses, or none of them.
    ///
    /// Fails on the first transport error or non-2xx status.
    pub async fn add_all(&self, urls: &[String]) -> Result<usize, Error> {
        let mut fetched = Vec::with_capacity(urls.len());
        for raw in urls {
            let request = GatewayRequest::get(self.resolve(raw)?);
            let response = self.network.fetch(&request).await?;
            if !response.is_success() {
                return Err(Error::HttpError(format!("{} returned status {}", request.url, response.status.as_u16())));
            }
            let mut cached = response.to_cached(&request.method);
            cached.url = request.url.to_string();
            fetched.push(cached);
        }

        self.db.put_responses(&self.options.cache_name, &fetched).await?;
        Ok(fetched.len())
    }

    /// Fetch a single URL and store it on success.
    pub async fn add(&self, raw: &str) -> Result<(), Error> {
        self.add_all(std::slice::from_ref(&raw.to_string())).await.map(|_| ())
    }
}
