//! Per-request caching strategies.

use offgrid_core::Error;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use super::{Gateway, WorkerState};
use crate::fetch::{GatewayRequest, GatewayResponse};

/// How a request is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestClass {
    /// Outside the interception scope; default network handling applies.
    Passthrough,
    Navigation,
    Api,
    Static,
}

/// Where a served response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ResponseSource {
    Network,
    Cache,
    OfflineFallback,
}

/// A response served by the gateway.
#[derive(Debug)]
pub struct FetchOutcome {
    pub response: GatewayResponse,
    pub source: ResponseSource,
    /// Background refresh spawned after serving from cache.
    pub revalidation: Option<JoinHandle<()>>,
}

impl FetchOutcome {
    fn network(response: GatewayResponse) -> Self {
        Self { response, source: ResponseSource::Network, revalidation: None }
    }

    fn cache(response: GatewayResponse, revalidation: Option<JoinHandle<()>>) -> Self {
        Self { response, source: ResponseSource::Cache, revalidation }
    }
}

/// Result of offering a request to the gateway.
#[derive(Debug)]
pub enum Interception {
    /// The gateway declined; the caller performs the default fetch.
    Passthrough,
    Handled(FetchOutcome),
}

impl Gateway {
    /// Classify a request.
    pub fn classify(&self, request: &GatewayRequest) -> RequestClass {
        if !self.scope.intercepts(&request.url) {
            return RequestClass::Passthrough;
        }
        if request.is_navigation() {
            return RequestClass::Navigation;
        }
        let path = request.url.path();
        if self.options.api_patterns.iter().any(|p| p.is_match(path)) {
            return RequestClass::Api;
        }
        RequestClass::Static
    }

    /// Intercept a request.
    ///
    /// A gateway whose install failed never takes control, so it passes every
    /// request through.
    pub async fn handle_fetch(&self, request: GatewayRequest) -> Result<Interception, Error> {
        if self.state().await == WorkerState::Redundant {
            return Ok(Interception::Passthrough);
        }

        let outcome = match self.classify(&request) {
            RequestClass::Passthrough => return Ok(Interception::Passthrough),
            RequestClass::Navigation => self.handle_navigation(request).await?,
            RequestClass::Api => self.handle_api(request).await?,
            RequestClass::Static => self.handle_static(request).await?,
        };

        Ok(Interception::Handled(outcome))
    }

    /// Network-first with a bounded wait, then the cached copy, then the offline page.
    async fn handle_navigation(&self, request: GatewayRequest) -> Result<FetchOutcome, Error> {
        let wait = self.options.navigation_timeout;
        match tokio::time::timeout(wait, self.network.fetch(&request)).await {
            Ok(Ok(response)) if response.is_success() => {
                if request.is_read() {
                    self.store_quietly(&request, &response).await;
                }
                return Ok(FetchOutcome::network(response));
            }
            Ok(Ok(response)) => {
                tracing::debug!(url = %request.url, status = response.status.as_u16(), "navigation not ok, trying cache");
            }
            Ok(Err(e)) => {
                tracing::debug!(url = %request.url, error = %e, "navigation network failed, trying cache");
            }
            Err(_) => {
                tracing::debug!(url = %request.url, timeout_ms = wait.as_millis() as u64, "navigation timed out, trying cache");
            }
        }

        if request.is_read()
            && let Some(cached) = self.lookup(&request).await
        {
            return Ok(FetchOutcome::cache(cached, None));
        }

        let offline = GatewayRequest::get(self.resolve(&self.options.offline_url)?);
        match self.lookup(&offline).await {
            Some(page) => Ok(FetchOutcome { response: page, source: ResponseSource::OfflineFallback, revalidation: None }),
            None => Err(Error::CacheMiss(format!("no cached copy of {} and no offline page", request.url))),
        }
    }

    /// Cache-first with background refresh for reads; network-only for writes.
    async fn handle_api(&self, request: GatewayRequest) -> Result<FetchOutcome, Error> {
        if !request.is_read() {
            let response = self.network.fetch(&request).await?;
            return Ok(FetchOutcome::network(response));
        }

        if let Some(cached) = self.lookup(&request).await {
            let revalidation = self.revalidate_in_background(request);
            return Ok(FetchOutcome::cache(cached, Some(revalidation)));
        }

        match self.network.fetch(&request).await {
            Ok(response) => {
                if response.is_success() {
                    self.store_quietly(&request, &response).await;
                }
                Ok(FetchOutcome::network(response))
            }
            Err(e) => match self.lookup(&request).await {
                // another task may have filled the entry meanwhile
                Some(cached) => Ok(FetchOutcome::cache(cached, None)),
                None => Err(e),
            },
        }
    }

    /// Stale-while-revalidate; network on miss.
    async fn handle_static(&self, request: GatewayRequest) -> Result<FetchOutcome, Error> {
        if request.is_read()
            && let Some(cached) = self.lookup(&request).await
        {
            let revalidation = self.revalidate_in_background(request);
            return Ok(FetchOutcome::cache(cached, Some(revalidation)));
        }

        let response = self.network.fetch(&request).await.inspect_err(|e| {
            tracing::error!(url = %request.url, error = %e, "failed to fetch asset");
        })?;
        if response.is_success() && request.is_read() {
            self.store_quietly(&request, &response).await;
        }
        Ok(FetchOutcome::network(response))
    }

    /// Refresh the cached copy of `request` without blocking the caller.
    ///
    /// The entry is overwritten on a 2xx response and left alone otherwise.
    pub fn revalidate_in_background(&self, request: GatewayRequest) -> JoinHandle<()> {
        let gateway = self.clone();
        tokio::spawn(async move {
            match gateway.network.fetch(&request).await {
                Ok(response) if response.is_success() => gateway.store_quietly(&request, &response).await,
                Ok(response) => {
                    tracing::debug!(url = %request.url, status = response.status.as_u16(), "background update skipped");
                }
                Err(e) => tracing::debug!(url = %request.url, error = %e, "background update failed"),
            }
        })
    }
}
