//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `origin` is not an absolute http(s) URL
    /// - `cache_version` or `user_agent` is empty
    /// - `offline_url`, `contact_endpoint` or `booking_endpoint` is not an absolute path
    /// - `navigation_timeout_ms` is outside 100ms..=60s
    /// - `request_timeout_ms` is outside 100ms..=5min
    /// - an entry of `api_patterns` is not a valid regex
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.origin_url()?;

        if self.cache_version.trim().is_empty() {
            return Err(ConfigError::Invalid { field: "cache_version".into(), reason: "must not be empty".into() });
        }

        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid { field: "user_agent".into(), reason: "must not be empty".into() });
        }

        for (field, path) in [
            ("offline_url", &self.offline_url),
            ("contact_endpoint", &self.contact_endpoint),
            ("booking_endpoint", &self.booking_endpoint),
        ] {
            if !path.starts_with('/') {
                return Err(ConfigError::Invalid { field: field.into(), reason: "must be an absolute path".into() });
            }
        }

        if self.navigation_timeout_ms < 100 {
            return Err(ConfigError::Invalid {
                field: "navigation_timeout_ms".into(),
                reason: "must be at least 100ms".into(),
            });
        }
        if self.navigation_timeout_ms > 60_000 {
            return Err(ConfigError::Invalid {
                field: "navigation_timeout_ms".into(),
                reason: "must not exceed 60000ms".into(),
            });
        }

        if self.request_timeout_ms < 100 {
            return Err(ConfigError::Invalid {
                field: "request_timeout_ms".into(),
                reason: "must be at least 100ms".into(),
            });
        }
        if self.request_timeout_ms > 300_000 {
            return Err(ConfigError::Invalid {
                field: "request_timeout_ms".into(),
                reason: "must not exceed 5 minutes (300000ms)".into(),
            });
        }

        for pattern in &self.api_patterns {
            regex::Regex::new(pattern)
                .map_err(|e| ConfigError::Invalid { field: "api_patterns".into(), reason: e.to_string() })?;
        }

        if !self.critical_resources.contains(&self.offline_url) {
            tracing::warn!(
                offline_url = %self.offline_url,
                "offline page is not a critical resource; navigation fallback may be unavailable"
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_default_config() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_bad_origin() {
        let config = AppConfig { origin: "not a url".into(), ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "origin"));
    }

    #[test]
    fn test_validate_empty_cache_version() {
        let config = AppConfig { cache_version: "  ".into(), ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "cache_version"));
    }

    #[test]
    fn test_validate_relative_offline_url() {
        let config = AppConfig { offline_url: "offline.html".into(), ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "offline_url"));
    }

    #[test]
    fn test_validate_navigation_timeout_bounds() {
        let config = AppConfig { navigation_timeout_ms: 50, ..Default::default() };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { field, .. }) if field == "navigation_timeout_ms"));

        let config = AppConfig { navigation_timeout_ms: 60_001, ..Default::default() };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { field, .. }) if field == "navigation_timeout_ms"));
    }

    #[test]
    fn test_validate_request_timeout_exceeds_limit() {
        let config = AppConfig { request_timeout_ms: 301_000, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "request_timeout_ms"));
    }

    #[test]
    fn test_validate_bad_api_pattern() {
        let config = AppConfig { api_patterns: vec!["/api/(".into()], ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "api_patterns"));
    }

    #[test]
    fn test_validate_edge_case_values() {
        let config = AppConfig { navigation_timeout_ms: 100, request_timeout_ms: 300_000, ..Default::default() };
        assert!(config.validate().is_ok());
    }
}
