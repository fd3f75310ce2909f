//! Push payloads, notification display and click handling.

use offgrid_core::{AppConfig, Error};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::Gateway;
use super::platform::WindowClient;

const DEFAULT_TAG: &str = "offgrid-notification";
const INSTALLED_TAG: &str = "app-installed";
const VIBRATE_PATTERN: [u32; 3] = [100, 50, 100];

/// Template values a push payload is merged over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationDefaults {
    pub title: String,
    pub body: String,
    pub icon: String,
    pub badge: String,
    pub tag: String,
}

impl From<&AppConfig> for NotificationDefaults {
    fn from(config: &AppConfig) -> Self {
        Self {
            title: config.notification_title.clone(),
            body: config.notification_body.clone(),
            icon: config.notification_icon.clone(),
            badge: config.notification_badge.clone(),
            tag: DEFAULT_TAG.to_string(),
        }
    }
}

/// A button on a notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct NotificationAction {
    pub action: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

/// Data attached to a notification for the click handler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct NotificationData {
    pub url: String,
    pub timestamp: i64,
}

/// A notification as handed to the [`Notifier`](super::Notifier).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub icon: Option<String>,
    pub badge: Option<String>,
    pub tag: Option<String>,
    pub require_interaction: bool,
    pub silent: bool,
    pub renotify: bool,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub vibrate: Vec<u32>,
    pub data: Option<NotificationData>,
    pub actions: Vec<NotificationAction>,
}

impl Notification {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            icon: None,
            badge: None,
            tag: None,
            require_interaction: false,
            silent: false,
            renotify: false,
            timestamp: chrono::Utc::now().timestamp_millis(),
            vibrate: Vec::new(),
            data: None,
            actions: Vec::new(),
        }
    }

    /// A plain notification carrying the configured icon and badge.
    pub(crate) fn branded(defaults: &NotificationDefaults, title: &str, body: &str) -> Self {
        Self { icon: Some(defaults.icon.clone()), badge: Some(defaults.badge.clone()), ..Self::new(title, body) }
    }
}

/// The merged push template.
#[derive(Debug)]
struct PushTemplate {
    title: String,
    body: String,
    icon: Option<String>,
    badge: Option<String>,
    tag: Option<String>,
    require_interaction: bool,
    silent: bool,
    renotify: bool,
    timestamp: i64,
    url: Option<String>,
}

impl PushTemplate {
    /// Merge `payload` over the defaults, key by key.
    ///
    /// Null values and values of the wrong type keep the default for that key
    /// only. A payload that is not a JSON object is ignored entirely.
    fn merge(defaults: &NotificationDefaults, payload: Option<&[u8]>, now: i64) -> Self {
        let mut template = Self::plain(defaults, now);
        let Some(bytes) = payload.filter(|b| !b.is_empty()) else {
            return template;
        };

        let overrides = match serde_json::from_slice::<Value>(bytes) {
            Ok(Value::Object(map)) => map,
            Ok(other) => {
                tracing::warn!(kind = json_kind(&other), "push payload is not an object, using default notification");
                return template;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to parse push payload, using default notification");
                return template;
            }
        };

        for (key, value) in &overrides {
            if value.is_null() {
                continue;
            }
            if template.apply(key, value).is_none() {
                tracing::warn!(key = %key, kind = json_kind(value), "ignoring push field with unexpected type");
            }
        }
        template
    }

    /// Set one wire-format (camelCase) field. `None` means the value had the wrong type.
    fn apply(&mut self, key: &str, value: &Value) -> Option<()> {
        let text = |v: &Value| v.as_str().map(str::to_owned);
        match key {
            "title" => self.title = text(value)?,
            "body" => self.body = text(value)?,
            "icon" => self.icon = Some(text(value)?),
            "badge" => self.badge = Some(text(value)?),
            "tag" => self.tag = Some(text(value)?),
            "url" => self.url = Some(text(value)?),
            "requireInteraction" => self.require_interaction = value.as_bool()?,
            "silent" => self.silent = value.as_bool()?,
            "renotify" => self.renotify = value.as_bool()?,
            "timestamp" => self.timestamp = value.as_i64().or_else(|| value.as_f64().map(|t| t as i64))?,
            _ => {}
        }
        Some(())
    }

    fn plain(defaults: &NotificationDefaults, now: i64) -> Self {
        Self {
            title: defaults.title.clone(),
            body: defaults.body.clone(),
            icon: Some(defaults.icon.clone()),
            badge: Some(defaults.badge.clone()),
            tag: Some(defaults.tag.clone()),
            require_interaction: false,
            silent: false,
            renotify: true,
            timestamp: now,
            url: None,
        }
    }

    fn into_notification(self, now: i64) -> Notification {
        let actions = vec![
            NotificationAction { action: "open".into(), title: "Open".into(), icon: self.icon.clone() },
            NotificationAction { action: "close".into(), title: "Close".into(), icon: None },
        ];

        Notification {
            title: self.title,
            body: self.body,
            icon: self.icon,
            badge: self.badge,
            tag: self.tag,
            require_interaction: self.require_interaction,
            silent: self.silent,
            renotify: self.renotify,
            timestamp: self.timestamp,
            vibrate: VIBRATE_PATTERN.to_vec(),
            data: Some(NotificationData { url: self.url.unwrap_or_else(|| "/".to_string()), timestamp: now }),
            actions,
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// What a notification click did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, schemars::JsonSchema)]
#[serde(tag = "outcome", content = "window", rename_all = "snake_case")]
pub enum ClickOutcome {
    Dismissed,
    Focused(WindowClient),
    Opened(WindowClient),
}

impl Gateway {
    /// Build the notification for a push payload and show it.
    pub async fn handle_push(&self, payload: Option<&[u8]>) -> Result<Notification, Error> {
        let now = chrono::Utc::now().timestamp_millis();
        let notification = PushTemplate::merge(&self.options.notifications, payload, now).into_notification(now);

        tracing::info!(title = %notification.title, "push received");
        self.notifier.show(notification.clone()).await?;
        Ok(notification)
    }

    /// React to a click on a shown notification.
    ///
    /// `target` is the notification's `data.url`; it is resolved against the
    /// origin and compared with open window URLs as an absolute URL.
    pub async fn handle_notification_click(
        &self, action: Option<&str>, target: Option<&str>,
    ) -> Result<ClickOutcome, Error> {
        if action == Some("close") {
            return Ok(ClickOutcome::Dismissed);
        }

        let url = self.resolve(target.unwrap_or("/"))?;
        let windows = self.clients.match_all().await;
        if let Some(window) = windows.iter().find(|w| w.url == url.as_str()) {
            let focused = self.clients.focus(window.id).await?;
            return Ok(ClickOutcome::Focused(focused));
        }

        let opened = self.clients.open_window(&url).await?;
        Ok(ClickOutcome::Opened(opened))
    }

    /// Welcome notification shown once the app is installed to the home screen.
    pub async fn app_installed(&self) -> Result<Notification, Error> {
        let defaults = &self.options.notifications;
        let notification = Notification {
            tag: Some(INSTALLED_TAG.to_string()),
            require_interaction: true,
            actions: vec![NotificationAction { action: "open".into(), title: "Open App".into(), icon: None }],
            ..Notification::branded(
                defaults,
                &format!("Welcome to {}!", defaults.title),
                "The app has been installed successfully. You can now access it from your home screen.",
            )
        };

        self.notifier.show(notification.clone()).await?;
        Ok(notification)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::Clients;
    use crate::gateway::testing::Harness;

    fn defaults() -> NotificationDefaults {
        NotificationDefaults::from(&AppConfig::default())
    }

    #[test]
    fn test_merge_title_only_keeps_default_body() {
        let template = PushTemplate::merge(&defaults(), Some(br#"{"title":"X"}"#), 1);
        assert_eq!(template.title, "X");
        assert_eq!(template.body, "You have a new notification");
        assert!(template.renotify);
    }

    #[test]
    fn test_merge_null_values_keep_defaults() {
        let template = PushTemplate::merge(&defaults(), Some(br#"{"body":null,"url":"/bookings"}"#), 1);
        assert_eq!(template.body, "You have a new notification");
        assert_eq!(template.url.as_deref(), Some("/bookings"));
    }

    #[test]
    fn test_merge_camel_case_fields() {
        let template = PushTemplate::merge(&defaults(), Some(br#"{"requireInteraction":true,"silent":true}"#), 1);
        assert!(template.require_interaction);
        assert!(template.silent);
    }

    #[test]
    fn test_merge_unusable_payload_uses_default() {
        for payload in [b"not json".as_slice(), br#"["a"]"#, br#"{"title":5}"#] {
            let template = PushTemplate::merge(&defaults(), Some(payload), 7);
            assert_eq!(template.title, "Offgrid");
            assert_eq!(template.body, "You have a new notification");
            assert_eq!(template.timestamp, 7);
        }
    }

    #[test]
    fn test_merge_drops_only_mistyped_fields() {
        let payload = br#"{"title":"Sale","timestamp":1.5,"silent":"yes","icon":7,"url":"/offers"}"#;
        let template = PushTemplate::merge(&defaults(), Some(payload), 7);
        assert_eq!(template.title, "Sale");
        assert_eq!(template.timestamp, 1);
        assert!(!template.silent);
        assert_eq!(template.icon, Some(defaults().icon));
        assert_eq!(template.url.as_deref(), Some("/offers"));
    }

    #[test]
    fn test_notification_shape() {
        let notification = PushTemplate::merge(&defaults(), None, 3).into_notification(9);
        assert_eq!(notification.vibrate, vec![100, 50, 100]);
        assert_eq!(notification.data, Some(NotificationData { url: "/".into(), timestamp: 9 }));
        let actions: Vec<_> = notification.actions.iter().map(|a| a.action.as_str()).collect();
        assert_eq!(actions, ["open", "close"]);
        assert_eq!(notification.tag.as_deref(), Some(DEFAULT_TAG));
    }

    #[tokio::test]
    async fn test_handle_push_shows_notification() {
        let h = Harness::new().await;
        let shown = h.gateway.handle_push(Some(br#"{"title":"X"}"#)).await.unwrap();
        assert_eq!(shown.body, "You have a new notification");

        let history = h.notifier.shown().await;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].title, "X");
    }

    #[tokio::test]
    async fn test_click_close_dismisses() {
        let h = Harness::new().await;
        let outcome = h.gateway.handle_notification_click(Some("close"), Some("/")).await.unwrap();
        assert_eq!(outcome, ClickOutcome::Dismissed);
        assert!(h.windows.match_all().await.is_empty());
    }

    #[tokio::test]
    async fn test_click_focuses_matching_window() {
        let h = Harness::new().await;
        let existing = h.windows.register(&h.url("/bookings")).await;

        let outcome = h.gateway.handle_notification_click(None, Some("/bookings")).await.unwrap();
        match outcome {
            ClickOutcome::Focused(window) => assert_eq!(window.id, existing.id),
            other => panic!("expected focus, got {other:?}"),
        }
        assert_eq!(h.windows.match_all().await.len(), 1);
    }

    #[tokio::test]
    async fn test_click_opens_window_when_none_matches() {
        let h = Harness::new().await;
        h.windows.register(&h.url("/")).await;

        let outcome = h.gateway.handle_notification_click(Some("open"), Some("/bookings")).await.unwrap();
        match outcome {
            ClickOutcome::Opened(window) => assert_eq!(window.url, h.url("/bookings").as_str()),
            other => panic!("expected open, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_app_installed_requires_interaction() {
        let h = Harness::new().await;
        let notification = h.gateway.app_installed().await.unwrap();
        assert!(notification.require_interaction);
        assert_eq!(notification.title, "Welcome to Offgrid!");
        assert_eq!(notification.tag.as_deref(), Some(INSTALLED_TAG));
    }
}
