//! gateway_sync tool implementation.
//!
//! Fires a sync event directly, as the platform does when connectivity returns.

use offgrid_client::gateway::{SyncOutcome, UPDATE_CONTENT_TAG};
use offgrid_client::{Gateway, SyncTag};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::json_result;
use crate::error::ToolError;

/// Parameters for the gateway_sync tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GatewaySyncParams {
    /// "contact-form-sync", "booking-sync", "background-sync", or the periodic "update-content".
    pub tag: String,
}

/// Output from the gateway_sync tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct GatewaySyncOutput {
    pub tag: String,
    pub result: SyncOutcome,
}

/// Implementation of the gateway_sync tool.
pub async fn sync_impl(gateway: &Gateway, params: GatewaySyncParams) -> Result<CallToolResult, McpError> {
    let tag = params.tag.trim();

    let result = if tag == UPDATE_CONTENT_TAG {
        let report = gateway.periodic_sync(tag).await?.unwrap_or_default();
        SyncOutcome::Refresh(report)
    } else {
        let parsed: SyncTag = tag
            .parse()
            .map_err(|_| ToolError::InvalidInput(format!("unknown sync tag: {tag}")))?;
        gateway.sync(parsed).await?
    };

    json_result(&GatewaySyncOutput { tag: tag.to_string(), result })
}
