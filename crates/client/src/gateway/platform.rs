//! Host surfaces the gateway drives: notification display and window clients.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use offgrid_core::Error;
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use url::Url;

use super::push::Notification;

/// Displays notifications to the user.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn show(&self, notification: Notification) -> Result<(), Error>;
}

/// The windows controlled by the gateway.
#[async_trait::async_trait]
pub trait Clients: Send + Sync {
    /// All open windows, including uncontrolled ones.
    async fn match_all(&self) -> Vec<WindowClient>;

    /// Bring a window to the foreground.
    async fn focus(&self, id: u64) -> Result<WindowClient, Error>;

    /// Open a new window at `url`.
    async fn open_window(&self, url: &Url) -> Result<WindowClient, Error>;

    /// Take control of every open window. Returns how many were claimed.
    async fn claim(&self) -> usize;
}

/// An open window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, schemars::JsonSchema)]
pub struct WindowClient {
    pub id: u64,
    pub url: String,
    pub focused: bool,
}

/// Notifier that writes every notification to the log.
///
/// Shown notifications are kept so callers can list them.
#[derive(Debug, Default)]
pub struct TracingNotifier {
    shown: Mutex<Vec<Notification>>,
}

impl TracingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Notifications shown so far, oldest first.
    pub async fn shown(&self) -> Vec<Notification> {
        self.shown.lock().await.clone()
    }
}

#[async_trait::async_trait]
impl Notifier for TracingNotifier {
    async fn show(&self, notification: Notification) -> Result<(), Error> {
        tracing::info!(
            title = %notification.title,
            body = %notification.body,
            tag = notification.tag.as_deref().unwrap_or(""),
            "notification"
        );
        self.shown.lock().await.push(notification);
        Ok(())
    }
}

#[derive(Debug, Default)]
struct Windows {
    open: Vec<WindowClient>,
    controlled: usize,
}

/// In-process window registry.
#[derive(Debug, Clone, Default)]
pub struct WindowRegistry {
    windows: Arc<RwLock<Windows>>,
    next_id: Arc<AtomicU64>,
}

impl WindowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of windows under gateway control.
    pub async fn controlled(&self) -> usize {
        self.windows.read().await.controlled
    }

    /// Record a window opened by the user.
    pub async fn register(&self, url: &Url) -> WindowClient {
        let client = WindowClient { id: self.next_id.fetch_add(1, Ordering::Relaxed) + 1, url: url.to_string(), focused: false };
        self.windows.write().await.open.push(client.clone());
        client
    }
}

#[async_trait::async_trait]
impl Clients for WindowRegistry {
    async fn match_all(&self) -> Vec<WindowClient> {
        self.windows.read().await.open.clone()
    }

    async fn focus(&self, id: u64) -> Result<WindowClient, Error> {
        let mut windows = self.windows.write().await;
        let index = windows
            .open
            .iter()
            .position(|w| w.id == id)
            .ok_or_else(|| Error::InvalidInput(format!("no window with id {id}")))?;

        for (i, window) in windows.open.iter_mut().enumerate() {
            window.focused = i == index;
        }
        Ok(windows.open[index].clone())
    }

    async fn open_window(&self, url: &Url) -> Result<WindowClient, Error> {
        let client = WindowClient { id: self.next_id.fetch_add(1, Ordering::Relaxed) + 1, url: url.to_string(), focused: true };

        let mut windows = self.windows.write().await;
        for window in windows.open.iter_mut() {
            window.focused = false;
        }
        windows.open.push(client.clone());
        Ok(client)
    }

    async fn claim(&self) -> usize {
        let mut windows = self.windows.write().await;
        windows.controlled = windows.open.len();
        windows.controlled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(path: &str) -> Url {
        Url::parse("https://studio.example").unwrap().join(path).unwrap()
    }

    #[tokio::test]
    async fn test_open_window_focuses_only_the_new_one() {
        let registry = WindowRegistry::new();
        registry.register(&url("/")).await;
        let opened = registry.open_window(&url("/bookings")).await.unwrap();

        let all = registry.match_all().await;
        assert_eq!(all.len(), 2);
        assert!(all.iter().all(|w| w.focused == (w.id == opened.id)));
    }

    #[tokio::test]
    async fn test_focus_unknown_window_fails() {
        let registry = WindowRegistry::new();
        assert!(registry.focus(42).await.is_err());
    }

    #[tokio::test]
    async fn test_claim_counts_open_windows() {
        let registry = WindowRegistry::new();
        registry.register(&url("/")).await;
        registry.register(&url("/about")).await;
        assert_eq!(registry.controlled().await, 0);
        assert_eq!(registry.claim().await, 2);
        assert_eq!(registry.controlled().await, 2);
    }

    #[tokio::test]
    async fn test_tracing_notifier_keeps_history() {
        let notifier = TracingNotifier::new();
        let mut notification = Notification::new("Offgrid", "hello");
        notification.tag = Some("t".into());
        notifier.show(notification).await.unwrap();

        let shown = notifier.shown().await;
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].body, "hello");
    }
}
