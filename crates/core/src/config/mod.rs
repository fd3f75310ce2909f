//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (OFFGRID_*)
//! 2. TOML config file (if OFFGRID_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (OFFGRID_*)
/// 2. TOML config file (if OFFGRID_CONFIG_FILE set)
/// 3. Built-in defaults
///
/// List-valued fields accept TOML array syntax in environment variables,
/// e.g. `OFFGRID_ALLOWED_HOSTS='["fonts.gstatic.com"]'`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to SQLite database holding cache stores and queued submissions.
    ///
    /// Set via OFFGRID_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Origin of the site the gateway serves (scheme, host, port).
    ///
    /// Relative resource paths are resolved against it.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Version identifier, used as the name of the live cache store.
    #[serde(default = "default_cache_version")]
    pub cache_version: String,

    /// Path of the static offline page served when navigation fails.
    #[serde(default = "default_offline_url")]
    pub offline_url: String,

    /// Bounded wait for navigation requests before falling back to cache.
    #[serde(default = "default_navigation_timeout_ms")]
    pub navigation_timeout_ms: u64,

    /// HTTP request timeout in milliseconds for every other request.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// User-Agent string for HTTP requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Resources that must all be cached for install to succeed.
    #[serde(default = "default_critical_resources")]
    pub critical_resources: Vec<String>,

    /// Resources cached on a best-effort basis during install.
    #[serde(default = "default_precache_assets")]
    pub precache_assets: Vec<String>,

    /// Regex patterns matched against the request path to detect API calls.
    #[serde(default = "default_api_patterns")]
    pub api_patterns: Vec<String>,

    /// Cross-origin hosts the gateway still intercepts.
    #[serde(default = "default_allowed_hosts")]
    pub allowed_hosts: Vec<String>,

    /// Endpoint queued contact forms are posted to.
    #[serde(default = "default_contact_endpoint")]
    pub contact_endpoint: String,

    /// Endpoint queued bookings are posted to.
    #[serde(default = "default_booking_endpoint")]
    pub booking_endpoint: String,

    /// Interval of the periodic content refresh. 0 disables it.
    #[serde(default = "default_periodic_refresh_secs")]
    pub periodic_refresh_secs: u64,

    /// Default notification title used when a push payload omits one.
    #[serde(default = "default_notification_title")]
    pub notification_title: String,

    /// Default notification body used when a push payload omits one.
    #[serde(default = "default_notification_body")]
    pub notification_body: String,

    #[serde(default = "default_notification_icon")]
    pub notification_icon: String,

    #[serde(default = "default_notification_badge")]
    pub notification_badge: String,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./offgrid.sqlite")
}

fn default_origin() -> String {
    "http://localhost:8080".into()
}

fn default_cache_version() -> String {
    "offgrid-v3.0".into()
}

fn default_offline_url() -> String {
    "/offline.html".into()
}

fn default_navigation_timeout_ms() -> u64 {
    2_000
}

fn default_request_timeout_ms() -> u64 {
    20_000
}

fn default_user_agent() -> String {
    "offgrid/0.1".into()
}

fn default_critical_resources() -> Vec<String> {
    ["/", "/index.html", "/manifest.json", "/offline.html"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_precache_assets() -> Vec<String> {
    [
        "/",
        "/index.html",
        "/manifest.json",
        "/offline.html",
        "/favicon.ico",
        "/icons/android-icon-192x192.png",
        "/icons/android-icon-144x144.png",
        "/icons/android-icon-96x96.png",
        "/icons/android-icon-72x72.png",
        "/icons/android-icon-48x48.png",
        "https://fonts.googleapis.com/css2?family=Inter:wght@300;400;500;600;700;800;900&display=swap",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_api_patterns() -> Vec<String> {
    vec![r"/api/".into(), r"/functions/".into()]
}

fn default_allowed_hosts() -> Vec<String> {
    vec!["fonts.googleapis.com".into(), "fonts.gstatic.com".into(), "calendar.google.com".into()]
}

fn default_contact_endpoint() -> String {
    "/api/contact".into()
}

fn default_booking_endpoint() -> String {
    "/api/bookings".into()
}

fn default_periodic_refresh_secs() -> u64 {
    12 * 60 * 60
}

fn default_notification_title() -> String {
    "Offgrid".into()
}

fn default_notification_body() -> String {
    "You have a new notification".into()
}

fn default_notification_icon() -> String {
    "/icons/android-icon-192x192.png".into()
}

fn default_notification_badge() -> String {
    "/icons/android-icon-96x96.png".into()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            origin: default_origin(),
            cache_version: default_cache_version(),
            offline_url: default_offline_url(),
            navigation_timeout_ms: default_navigation_timeout_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            user_agent: default_user_agent(),
            critical_resources: default_critical_resources(),
            precache_assets: default_precache_assets(),
            api_patterns: default_api_patterns(),
            allowed_hosts: default_allowed_hosts(),
            contact_endpoint: default_contact_endpoint(),
            booking_endpoint: default_booking_endpoint(),
            periodic_refresh_secs: default_periodic_refresh_secs(),
            notification_title: default_notification_title(),
            notification_body: default_notification_body(),
            notification_icon: default_notification_icon(),
            notification_badge: default_notification_badge(),
        }
    }
}

impl AppConfig {
    /// Navigation wait as Duration for use with tokio.
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }

    /// Request timeout as Duration for use with reqwest.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Periodic refresh interval, or `None` when disabled.
    pub fn periodic_refresh_interval(&self) -> Option<Duration> {
        (self.periodic_refresh_secs > 0).then(|| Duration::from_secs(self.periodic_refresh_secs))
    }

    /// Parsed origin URL.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if the origin is not an absolute http(s) URL.
    pub fn origin_url(&self) -> Result<url::Url, ConfigError> {
        let parsed = url::Url::parse(&self.origin)
            .map_err(|e| ConfigError::Invalid { field: "origin".into(), reason: e.to_string() })?;
        match parsed.scheme() {
            "http" | "https" => Ok(parsed),
            scheme => Err(ConfigError::Invalid { field: "origin".into(), reason: format!("unsupported scheme: {scheme}") }),
        }
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `OFFGRID_`
    /// 2. TOML file from `OFFGRID_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("OFFGRID_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("OFFGRID_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
