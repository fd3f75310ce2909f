//! URL resolution and interception scope.

use url::Url;

/// Error type for URL resolution failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    #[error("empty URL")]
    Empty,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// Resolve a resource reference against the site origin.
///
/// Normalization steps:
/// 1. Trim leading/trailing whitespace
/// 2. Resolve relative references (`/index.html`, `style.css`) against `base`
/// 3. Reject anything but http/https
/// 4. Lowercase the host
/// 5. Remove fragment (#...), keep the query string intact
pub fn resolve(base: &Url, input: &str) -> Result<Url, UrlError> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let mut parsed = base.join(trimmed).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlError::UnsupportedScheme(scheme.to_string())),
    }

    if let Some(host) = parsed.host_str().map(str::to_lowercase) {
        parsed
            .set_host(Some(&host))
            .map_err(|e| UrlError::InvalidUrl(e.to_string()))?;
    }

    parsed.set_fragment(None);

    Ok(parsed)
}

/// Which requests the gateway intercepts.
///
/// Same-origin requests always are; cross-origin requests only when their
/// host is on the allow-list. Everything else gets default network handling.
#[derive(Debug, Clone)]
pub struct Scope {
    origin: Url,
    allowed_hosts: Vec<String>,
}

impl Scope {
    pub fn new(origin: Url, allowed_hosts: impl IntoIterator<Item = String>) -> Self {
        let allowed_hosts = allowed_hosts.into_iter().map(|h| h.to_lowercase()).collect();
        Self { origin, allowed_hosts }
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    /// Whether a request for `url` is handled by the gateway.
    pub fn intercepts(&self, url: &Url) -> bool {
        if url.origin() == self.origin.origin() {
            return true;
        }
        url.host_str()
            .is_some_and(|host| self.allowed_hosts.iter().any(|allowed| allowed == host))
    }
}
