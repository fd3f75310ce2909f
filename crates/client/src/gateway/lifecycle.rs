//! Install and activation.
//!
//! ```text
//! Parsed -> Installing -> Installed -> Activating -> Activated
//!               |
//!               +-> Redundant   (a critical resource could not be cached)
//! ```

use offgrid_core::Error;
use serde::Serialize;
use tokio::task::JoinSet;

use super::Gateway;

/// Lifecycle position of the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    Parsed,
    Installing,
    Installed,
    Activating,
    Activated,
    /// Install failed; this version never takes control.
    Redundant,
}

/// Summary of a completed install.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, schemars::JsonSchema)]
pub struct InstallReport {
    /// Critical resources stored.
    pub critical: usize,
    /// Additional assets stored.
    pub cached: usize,
    /// Additional assets that could not be stored.
    pub failed: Vec<String>,
    /// Whether the install went straight on to activation.
    pub activated: bool,
}

/// Summary of an activation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, schemars::JsonSchema)]
pub struct ActivateReport {
    /// Stores deleted because they belong to other versions.
    pub deleted: Vec<String>,
    /// Open windows taken under control.
    pub claimed: usize,
}

impl Gateway {
    /// Populate the cache for this version.
    ///
    /// Critical resources are stored all-or-nothing and any failure leaves the
    /// gateway redundant. The remaining assets are cached best-effort and
    /// concurrently. A successful install asks to skip waiting.
    pub async fn install(&self) -> Result<InstallReport, Error> {
        self.set_state(WorkerState::Installing).await;
        tracing::info!(version = %self.version(), "installing");

        let critical = match self.install_critical().await {
            Ok(n) => n,
            Err(e) => {
                self.set_state(WorkerState::Redundant).await;
                tracing::error!(version = %self.version(), error = %e, "install failed");
                return Err(Error::InstallFailed(e.to_string()));
            }
        };

        let mut tasks = JoinSet::new();
        for asset in self.options.precache_assets.iter().cloned() {
            let gateway = self.clone();
            tasks.spawn(async move {
                let result = gateway.add(&asset).await;
                (asset, result)
            });
        }

        let mut report = InstallReport { critical, ..Default::default() };
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(()))) => report.cached += 1,
                Ok((asset, Err(e))) => {
                    tracing::warn!(url = %asset, error = %e, "failed to cache asset");
                    report.failed.push(asset);
                }
                Err(e) => tracing::warn!(error = %e, "asset task failed"),
            }
        }
        report.failed.sort();

        self.set_state(WorkerState::Installed).await;
        tracing::info!(critical = report.critical, cached = report.cached, failed = report.failed.len(), "install completed");

        report.activated = self.skip_waiting().await?;
        Ok(report)
    }

    async fn install_critical(&self) -> Result<usize, Error> {
        self.db.open_store(&self.options.cache_name).await?;
        self.add_all(&self.options.critical_resources).await
    }

    /// Activate now if installed and waiting.
    ///
    /// Returns whether an activation ran.
    pub async fn skip_waiting(&self) -> Result<bool, Error> {
        if self.state().await != WorkerState::Installed {
            return Ok(false);
        }
        self.activate().await?;
        Ok(true)
    }

    /// Delete every store that is not the current version and claim open windows.
    pub async fn activate(&self) -> Result<ActivateReport, Error> {
        if self.state().await == WorkerState::Redundant {
            return Err(Error::InvalidInput("a redundant gateway cannot activate".into()));
        }

        self.set_state(WorkerState::Activating).await;
        tracing::info!(version = %self.version(), "activating");

        let mut report = ActivateReport::default();
        for name in self.db.store_names().await? {
            if name == self.options.cache_name {
                continue;
            }
            tracing::info!(store = %name, "clearing old cache");
            if self.db.delete_store(&name).await? {
                report.deleted.push(name);
            }
        }

        report.claimed = self.clients.claim().await;
        self.set_state(WorkerState::Activated).await;
        tracing::info!(deleted = report.deleted.len(), claimed = report.claimed, "activate completed");
        Ok(report)
    }
}
