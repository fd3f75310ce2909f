//! Cache-related MCP tools.
//!
//! This module provides tools for inspecting the versioned cache stores.

pub mod list;

pub use list::{CacheListParams, list_impl};
