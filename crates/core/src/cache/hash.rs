//! Key derivation for cache entries and queued submissions.

use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Compute the request identity key for a cache entry.
///
/// Identity is the method plus the full URL; the method is upper-cased so
/// `get` and `GET` address the same entry.
pub fn compute_request_key(method: &str, url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(method.to_ascii_uppercase().as_bytes());
    hasher.update(b"\n");
    hasher.update(url.as_bytes());
    hex::encode(hasher.finalize())
}

/// Random identifier for a queued submission: 32 lowercase hex digits.
pub fn generate_submission_id() -> String {
    Uuid::new_v4().simple().to_string()
}
