//! Single entry point for lifecycle and platform events.

use offgrid_core::Error;

use super::Gateway;
use super::commands::{Command, CommandReply};
use super::lifecycle::{ActivateReport, InstallReport};
use super::push::{ClickOutcome, Notification};
use super::strategy::Interception;
use super::sync::{RefreshReport, SyncOutcome, SyncTag};
use crate::fetch::GatewayRequest;

/// An event delivered to the gateway.
#[derive(Debug, Clone)]
pub enum GatewayEvent {
    Install,
    Activate,
    Fetch(GatewayRequest),
    /// Push received, with the raw payload if any.
    Push(Option<Vec<u8>>),
    NotificationClick { action: Option<String>, url: Option<String> },
    Sync(SyncTag),
    PeriodicSync(String),
    Message(Command),
    /// An uncaught failure elsewhere in the host.
    Error { message: String },
    /// The app was installed to the home screen.
    AppInstalled,
}

impl GatewayEvent {
    pub fn name(&self) -> &'static str {
        match self {
            GatewayEvent::Install => "install",
            GatewayEvent::Activate => "activate",
            GatewayEvent::Fetch(_) => "fetch",
            GatewayEvent::Push(_) => "push",
            GatewayEvent::NotificationClick { .. } => "notificationclick",
            GatewayEvent::Sync(_) => "sync",
            GatewayEvent::PeriodicSync(_) => "periodicsync",
            GatewayEvent::Message(_) => "message",
            GatewayEvent::Error { .. } => "error",
            GatewayEvent::AppInstalled => "appinstalled",
        }
    }
}

#[derive(Debug)]
pub enum EventOutcome {
    Installed(InstallReport),
    Activated(ActivateReport),
    Fetched(Interception),
    Notified(Notification),
    Clicked(ClickOutcome),
    Synced(SyncOutcome),
    Refreshed(Option<RefreshReport>),
    Replied(CommandReply),
    Logged,
}

impl Gateway {
    /// Route an event to its handler.
    pub async fn dispatch(&self, event: GatewayEvent) -> Result<EventOutcome, Error> {
        tracing::trace!(event = event.name(), "dispatch");

        match event {
            GatewayEvent::Install => self.install().await.map(EventOutcome::Installed),
            GatewayEvent::Activate => self.activate().await.map(EventOutcome::Activated),
            GatewayEvent::Fetch(request) => self.handle_fetch(request).await.map(EventOutcome::Fetched),
            GatewayEvent::Push(payload) => self.handle_push(payload.as_deref()).await.map(EventOutcome::Notified),
            GatewayEvent::NotificationClick { action, url } => self
                .handle_notification_click(action.as_deref(), url.as_deref())
                .await
                .map(EventOutcome::Clicked),
            GatewayEvent::Sync(tag) => self.sync(tag).await.map(EventOutcome::Synced),
            GatewayEvent::PeriodicSync(tag) => self.periodic_sync(&tag).await.map(EventOutcome::Refreshed),
            GatewayEvent::Message(command) => self.handle_message(command).await.map(EventOutcome::Replied),
            GatewayEvent::Error { message } => {
                tracing::error!(%message, "uncaught error");
                Ok(EventOutcome::Logged)
            }
            GatewayEvent::AppInstalled => self.app_installed().await.map(EventOutcome::Notified),
        }
    }
}
