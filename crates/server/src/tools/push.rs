//! gateway_push and gateway_notification_click tool implementations.

use offgrid_client::Gateway;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::json_result;

/// Parameters for the gateway_push tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PushParams {
    /// Raw push payload, normally a JSON object such as `{"title": "...", "body": "...", "url": "/"}`.
    /// Omit for a push without data.
    #[serde(default)]
    pub payload: Option<String>,
}

/// Parameters for the gateway_notification_click tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct NotificationClickParams {
    /// The clicked action: "open", "close", or omitted for the notification body.
    #[serde(default)]
    pub action: Option<String>,

    /// The notification's target URL (default: "/").
    #[serde(default)]
    pub url: Option<String>,
}

/// Implementation of the gateway_push tool. Returns the displayed notification.
pub async fn push_impl(gateway: &Gateway, params: PushParams) -> Result<CallToolResult, McpError> {
    let notification = gateway.handle_push(params.payload.as_deref().map(str::as_bytes)).await?;
    json_result(&notification)
}

/// Implementation of the gateway_notification_click tool.
pub async fn click_impl(gateway: &Gateway, params: NotificationClickParams) -> Result<CallToolResult, McpError> {
    let outcome = gateway
        .handle_notification_click(params.action.as_deref(), params.url.as_deref())
        .await?;
    json_result(&outcome)
}
