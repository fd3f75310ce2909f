//! SQLite-backed storage for the offline cache gateway.
//!
//! This module provides the persistent state the gateway keeps between
//! events, using SQLite with async access via tokio-rusqlite:
//!
//! - Versioned cache stores mapping request identity to a stored response
//! - Pending contact-form and booking submissions awaiting sync
//! - Cache metadata and user preferences collections
//! - Automatic schema migrations, WAL mode for concurrent access

pub mod connection;
pub mod hash;
pub mod metadata;
pub mod migrations;
pub mod responses;
pub mod submissions;

pub use crate::Error;

pub use connection::CacheDb;
pub use metadata::CacheMetadata;
pub use responses::{CacheKey, CachedResponse};
pub use submissions::{PendingSubmission, SubmissionKind};
