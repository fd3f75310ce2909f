//! Messages from the controlled page.

use offgrid_core::{Error, PendingSubmission, SubmissionKind};
use serde::{Deserialize, Serialize};

use super::Gateway;
use super::sync::SyncTag;

/// A command posted by the page, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Command {
    /// Activate a waiting version now.
    SkipWaiting,
    /// Report the cache version name.
    GetVersion,
    /// Fetch and store the listed URLs, all or nothing.
    CacheUrls { urls: Vec<String> },
    /// Register every sync tag.
    TriggerSync,
    /// Delete the current cache store.
    ClearCache,
    /// Queue a submission made while offline.
    QueueSubmission { kind: SubmissionKind, data: serde_json::Value },
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::SkipWaiting => "SKIP_WAITING",
            Command::GetVersion => "GET_VERSION",
            Command::CacheUrls { .. } => "CACHE_URLS",
            Command::TriggerSync => "TRIGGER_SYNC",
            Command::ClearCache => "CLEAR_CACHE",
            Command::QueueSubmission { .. } => "QUEUE_SUBMISSION",
        }
    }
}

/// Reply posted back to the page.
#[derive(Debug, Clone, PartialEq, Serialize, schemars::JsonSchema)]
#[serde(untagged)]
pub enum CommandReply {
    Ack {
        #[serde(rename = "type")]
        kind: String,
        activated: bool,
    },
    Version {
        version: String,
    },
    Cached {
        cached: usize,
    },
    Registered {
        registered: Vec<SyncTag>,
    },
    Cleared {
        cleared: bool,
    },
    Queued {
        queued: PendingSubmission,
        sync_registered: bool,
    },
}

impl Gateway {
    /// Execute a page command.
    pub async fn handle_message(&self, command: Command) -> Result<CommandReply, Error> {
        tracing::debug!(command = command.name(), "message received");

        match command {
            Command::SkipWaiting => {
                let activated = self.skip_waiting().await?;
                Ok(CommandReply::Ack { kind: "ACK".into(), activated })
            }
            Command::GetVersion => Ok(CommandReply::Version { version: self.version().to_string() }),
            Command::CacheUrls { urls } => {
                let cached = self.add_all(&urls).await?;
                Ok(CommandReply::Cached { cached })
            }
            Command::TriggerSync => {
                let registered: Vec<SyncTag> = SyncTag::ALL.into_iter().filter(|tag| self.register_sync(*tag)).collect();
                tracing::info!(count = registered.len(), "sync triggered from page");
                Ok(CommandReply::Registered { registered })
            }
            Command::ClearCache => {
                let cleared = self.db.delete_store(&self.options.cache_name).await?;
                tracing::info!(version = %self.version(), cleared, "cache cleared");
                Ok(CommandReply::Cleared { cleared })
            }
            Command::QueueSubmission { kind, data } => {
                let queued = self.db.queue_submission(kind, data).await?;
                let tag = match kind {
                    SubmissionKind::ContactForm => SyncTag::ContactForm,
                    SubmissionKind::Booking => SyncTag::Booking,
                };
                let sync_registered = self.register_sync(tag);
                Ok(CommandReply::Queued { queued, sync_registered })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::WorkerState;
    use crate::gateway::testing::{Harness, Reply};
    use serde_json::json;
    use tokio::sync::mpsc;

    #[test]
    fn test_command_wire_format() {
        let command: Command = serde_json::from_value(json!({"type": "CACHE_URLS", "urls": ["/a"]})).unwrap();
        assert_eq!(command, Command::CacheUrls { urls: vec!["/a".into()] });

        let command: Command = serde_json::from_value(json!({"type": "SKIP_WAITING"})).unwrap();
        assert_eq!(command.name(), "SKIP_WAITING");

        let command: Command =
            serde_json::from_value(json!({"type": "QUEUE_SUBMISSION", "kind": "booking", "data": {"slot": 1}})).unwrap();
        assert!(matches!(command, Command::QueueSubmission { kind: SubmissionKind::Booking, .. }));

        assert!(serde_json::from_value::<Command>(json!({"type": "REBOOT"})).is_err());
    }

    #[test]
    fn test_reply_wire_format() {
        let reply = CommandReply::Ack { kind: "ACK".into(), activated: false };
        assert_eq!(serde_json::to_value(reply).unwrap(), json!({"type": "ACK", "activated": false}));

        let reply = CommandReply::Version { version: "offgrid-v3.0".into() };
        assert_eq!(serde_json::to_value(reply).unwrap(), json!({"version": "offgrid-v3.0"}));
    }

    #[tokio::test]
    async fn test_get_version() {
        let h = Harness::new().await;
        let reply = h.gateway.handle_message(Command::GetVersion).await.unwrap();
        assert_eq!(reply, CommandReply::Version { version: h.gateway.version().to_string() });
    }

    #[tokio::test]
    async fn test_skip_waiting_activates_installed_gateway() {
        let h = Harness::new().await;
        h.gateway.set_state(WorkerState::Installed).await;
        let reply = h.gateway.handle_message(Command::SkipWaiting).await.unwrap();
        assert_eq!(reply, CommandReply::Ack { kind: "ACK".into(), activated: true });
        assert_eq!(h.gateway.state().await, WorkerState::Activated);
    }

    #[tokio::test]
    async fn test_cache_urls_is_all_or_nothing() {
        let h = Harness::new().await;
        h.network.reply("/a", Reply::ok("a"));
        h.network.reply("/b", Reply::Fail);

        let command = Command::CacheUrls { urls: vec!["/a".into(), "/b".into()] };
        assert!(h.gateway.handle_message(command).await.is_err());
        assert!(h.cached_body("/a").await.is_none());

        h.network.reply("/b", Reply::ok("b"));
        let command = Command::CacheUrls { urls: vec!["/a".into(), "/b".into()] };
        let reply = h.gateway.handle_message(command).await.unwrap();
        assert_eq!(reply, CommandReply::Cached { cached: 2 });
    }

    #[tokio::test]
    async fn test_clear_cache_empties_current_store() {
        let h = Harness::new().await;
        h.seed("/", "home").await;
        h.seed("/about", "about").await;

        let reply = h.gateway.handle_message(Command::ClearCache).await.unwrap();
        assert_eq!(reply, CommandReply::Cleared { cleared: true });
        assert_eq!(h.gateway.db().count_entries(h.gateway.version()).await.unwrap(), 0);

        let reply = h.gateway.handle_message(Command::ClearCache).await.unwrap();
        assert_eq!(reply, CommandReply::Cleared { cleared: false });
    }

    #[tokio::test]
    async fn test_trigger_sync_registers_all_tags() {
        let h = Harness::new().await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        let gateway = h.gateway.clone().with_sync_queue(tx);

        let reply = gateway.handle_message(Command::TriggerSync).await.unwrap();
        assert_eq!(reply, CommandReply::Registered { registered: SyncTag::ALL.to_vec() });
        for expected in SyncTag::ALL {
            assert_eq!(rx.recv().await, Some(expected));
        }
    }

    #[tokio::test]
    async fn test_queue_submission_stores_and_registers() {
        let h = Harness::new().await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        let gateway = h.gateway.clone().with_sync_queue(tx);

        let command = Command::QueueSubmission { kind: SubmissionKind::ContactForm, data: json!({"name": "Ada"}) };
        let reply = gateway.handle_message(command).await.unwrap();
        match reply {
            CommandReply::Queued { queued, sync_registered } => {
                assert!(sync_registered);
                assert_eq!(queued.data, json!({"name": "Ada"}));
            }
            other => panic!("unexpected reply {other:?}"),
        }
        assert_eq!(rx.recv().await, Some(SyncTag::ContactForm));
        assert_eq!(h.gateway.db().list_submissions(SubmissionKind::ContactForm).await.unwrap().len(), 1);
    }
}
