//! Background sync: queued submission delivery and cache refresh.

use std::fmt;
use std::str::FromStr;

use offgrid_core::{Error, SubmissionKind};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use super::Gateway;
use super::push::Notification;
use crate::fetch::GatewayRequest;

/// Periodic sync tag that refreshes cached content.
pub const UPDATE_CONTENT_TAG: &str = "update-content";

/// Preference holding the time of the last completed content refresh.
pub const LAST_REFRESH_KEY: &str = "last-content-refresh";

/// One-off sync registrations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, schemars::JsonSchema)]
pub enum SyncTag {
    #[serde(rename = "contact-form-sync")]
    ContactForm,
    #[serde(rename = "booking-sync")]
    Booking,
    #[serde(rename = "background-sync")]
    Background,
}

impl SyncTag {
    pub const ALL: [SyncTag; 3] = [SyncTag::ContactForm, SyncTag::Booking, SyncTag::Background];

    pub fn as_str(self) -> &'static str {
        match self {
            SyncTag::ContactForm => "contact-form-sync",
            SyncTag::Booking => "booking-sync",
            SyncTag::Background => "background-sync",
        }
    }
}

impl fmt::Display for SyncTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncTag {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SyncTag::ALL
            .into_iter()
            .find(|tag| tag.as_str() == s)
            .ok_or_else(|| Error::InvalidInput(format!("unknown sync tag: {s}")))
    }
}

/// Result of draining a submission queue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, schemars::JsonSchema)]
pub struct SyncReport {
    pub attempted: usize,
    pub delivered: usize,
    pub failed: usize,
}

/// Result of refreshing the cached entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, schemars::JsonSchema)]
pub struct RefreshReport {
    pub checked: usize,
    pub refreshed: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, schemars::JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SyncOutcome {
    Submissions(SyncReport),
    Refresh(RefreshReport),
}

struct Confirmation {
    title: &'static str,
    body: &'static str,
    tag: &'static str,
}

fn confirmation(kind: SubmissionKind) -> Confirmation {
    match kind {
        SubmissionKind::ContactForm => Confirmation {
            title: "Form Submitted",
            body: "Your contact form has been submitted successfully.",
            tag: "form-success",
        },
        SubmissionKind::Booking => Confirmation {
            title: "Booking Confirmed",
            body: "Your booking has been confirmed successfully.",
            tag: "booking-success",
        },
    }
}

impl Gateway {
    /// Run the work registered under `tag`.
    pub async fn sync(&self, tag: SyncTag) -> Result<SyncOutcome, Error> {
        tracing::info!(%tag, "background sync");
        match tag {
            SyncTag::ContactForm => self.sync_submissions(SubmissionKind::ContactForm).await.map(SyncOutcome::Submissions),
            SyncTag::Booking => self.sync_submissions(SubmissionKind::Booking).await.map(SyncOutcome::Submissions),
            SyncTag::Background => self.refresh_cached().await.map(SyncOutcome::Refresh),
        }
    }

    /// Retry every queued submission of `kind`, oldest first.
    ///
    /// A record is deleted only when its POST returns 2xx; anything else
    /// leaves it queued for the next sync.
    pub async fn sync_submissions(&self, kind: SubmissionKind) -> Result<SyncReport, Error> {
        let endpoint = match kind {
            SubmissionKind::ContactForm => &self.options.contact_endpoint,
            SubmissionKind::Booking => &self.options.booking_endpoint,
        };
        let endpoint = self.resolve(endpoint)?;
        let pending = self.db.list_submissions(kind).await?;

        let mut report = SyncReport { attempted: pending.len(), ..Default::default() };
        for submission in pending {
            let request = GatewayRequest::post_json(endpoint.clone(), &submission.data)?;
            match self.network.fetch(&request).await {
                Ok(response) if response.is_success() => {
                    self.db.delete_submission(kind, &submission.id).await?;
                    report.delivered += 1;
                    self.confirm(kind).await;
                }
                Ok(response) => {
                    tracing::warn!(id = %submission.id, status = response.status.as_u16(), "submission rejected, keeping it queued");
                    report.failed += 1;
                }
                Err(e) => {
                    tracing::warn!(id = %submission.id, error = %e, "failed to sync submission");
                    report.failed += 1;
                }
            }
        }

        tracing::info!(
            collection = kind.collection(),
            attempted = report.attempted,
            delivered = report.delivered,
            failed = report.failed,
            "submission sync completed"
        );
        Ok(report)
    }

    async fn confirm(&self, kind: SubmissionKind) {
        let text = confirmation(kind);
        let notification = Notification {
            tag: Some(text.tag.to_string()),
            ..Notification::branded(&self.options.notifications, text.title, text.body)
        };
        if let Err(e) = self.notifier.show(notification).await {
            tracing::warn!(error = %e, "failed to show confirmation");
        }
    }

    /// Re-fetch every entry in the live store and overwrite it on 2xx.
    ///
    /// Failures and non-2xx responses leave the entry untouched.
    pub async fn refresh_cached(&self) -> Result<RefreshReport, Error> {
        let keys = self.db.store_keys(&self.options.cache_name).await?;
        let mut report = RefreshReport { checked: keys.len(), ..Default::default() };

        for key in keys {
            let url = match url::Url::parse(&key.url) {
                Ok(url) => url,
                Err(e) => {
                    tracing::warn!(url = %key.url, error = %e, "skipping unparseable cache key");
                    report.skipped += 1;
                    continue;
                }
            };
            let request = GatewayRequest::get(url);
            match self.network.fetch(&request).await {
                Ok(response) if response.is_success() => match self.store(&request, &response).await {
                    Ok(()) => report.refreshed += 1,
                    Err(e) => {
                        tracing::warn!(url = %request.url, error = %e, "failed to update cached resource");
                        report.skipped += 1;
                    }
                },
                _ => {
                    tracing::debug!(url = %request.url, "failed to update cached resource");
                    report.skipped += 1;
                }
            }
        }

        let finished = serde_json::Value::from(chrono::Utc::now().to_rfc3339());
        if let Err(e) = self.db.set_preference(LAST_REFRESH_KEY, &finished).await {
            tracing::warn!(error = %e, "failed to record refresh time");
        }

        tracing::info!(checked = report.checked, refreshed = report.refreshed, skipped = report.skipped, "content refresh completed");
        Ok(report)
    }

    /// Handle a periodic sync event. Unknown tags are ignored.
    pub async fn periodic_sync(&self, tag: &str) -> Result<Option<RefreshReport>, Error> {
        if tag != UPDATE_CONTENT_TAG {
            tracing::debug!(tag, "ignoring periodic sync tag");
            return Ok(None);
        }
        self.refresh_cached().await.map(Some)
    }

    /// Queue `tag` for the sync worker.
    ///
    /// Returns false when no worker is attached or it has shut down.
    pub fn register_sync(&self, tag: SyncTag) -> bool {
        let Some(tx) = &self.sync_tx else {
            tracing::debug!(%tag, "no sync queue attached");
            return false;
        };
        match tx.send(tag) {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(%tag, error = %e, "failed to register background sync");
                false
            }
        }
    }
}

/// Run registered syncs until every sender is dropped.
pub async fn run_sync_worker(gateway: Gateway, mut rx: mpsc::UnboundedReceiver<SyncTag>) {
    while let Some(tag) = rx.recv().await {
        match gateway.sync(tag).await {
            Ok(outcome) => tracing::debug!(%tag, ?outcome, "sync finished"),
            Err(e) => tracing::error!(%tag, error = %e, "background sync failed"),
        }
    }
    tracing::debug!("sync worker stopped");
}
