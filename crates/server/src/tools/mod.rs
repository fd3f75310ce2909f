//! MCP tool implementations.
//!
//! This module contains all tools exposed by the offgrid server. Each tool
//! drives the gateway the way the controlled page or the host platform would.

pub mod cache;
pub mod fetch;
pub mod message;
pub mod push;
pub mod sync;

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use serde::Serialize;

use crate::error::ToolError;

pub use cache::{CacheListParams, list_impl};
pub use fetch::{GatewayFetchParams, fetch_impl};
pub use message::{GatewayMessageParams, message_impl};
pub use push::{NotificationClickParams, PushParams, click_impl, push_impl};
pub use sync::{GatewaySyncParams, sync_impl};

/// Encode a tool output as pretty JSON text content.
fn json_result<T: Serialize>(output: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(output).map_err(ToolError::from)?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}
