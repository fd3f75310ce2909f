//! Core types and shared functionality for offgrid.
//!
//! This crate provides:
//! - Versioned response cache stores with SQLite backend
//! - Pending submission queues, cache metadata and user preferences
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;

pub use cache::{CacheDb, CacheKey, CacheMetadata, CachedResponse, PendingSubmission, SubmissionKind};
pub use config::{AppConfig, ConfigError};
pub use error::Error;
