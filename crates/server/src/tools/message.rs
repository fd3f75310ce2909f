//! gateway_message tool implementation.
//!
//! Delivers a page command (SKIP_WAITING, GET_VERSION, CACHE_URLS,
//! TRIGGER_SYNC, CLEAR_CACHE, QUEUE_SUBMISSION) and returns the reply.

use offgrid_client::{Command, Gateway};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::json_result;

/// Parameters for the gateway_message tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GatewayMessageParams {
    /// The command, tagged by `type`.
    pub message: Command,
}

/// Implementation of the gateway_message tool.
pub async fn message_impl(gateway: &Gateway, params: GatewayMessageParams) -> Result<CallToolResult, McpError> {
    let reply = gateway.handle_message(params.message).await?;
    json_result(&reply)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::{gateway, output};
    use serde_json::json;

    fn params(message: serde_json::Value) -> GatewayMessageParams {
        serde_json::from_value(json!({ "message": message })).unwrap()
    }

    #[tokio::test]
    async fn test_get_version() {
        let gw = gateway("https://studio.example").await;
        let result = message_impl(&gw, params(json!({"type": "GET_VERSION"}))).await.unwrap();
        assert_eq!(output(&result), json!({"version": "offgrid-v3.0"}));
    }

    #[tokio::test]
    async fn test_cache_urls_then_clear() {
        let mut server = mockito::Server::new_async().await;
        server.mock("GET", "/a.css").with_body("a").create_async().await;
        server.mock("GET", "/b.js").with_body("b").create_async().await;
        let gw = gateway(&server.url()).await;

        let result = message_impl(&gw, params(json!({"type": "CACHE_URLS", "urls": ["/a.css", "/b.js"]})))
            .await
            .unwrap();
        assert_eq!(output(&result), json!({"cached": 2}));

        let result = message_impl(&gw, params(json!({"type": "CLEAR_CACHE"}))).await.unwrap();
        assert_eq!(output(&result), json!({"cleared": true}));
        assert_eq!(gw.db().count_entries(gw.version()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_trigger_sync_without_worker_registers_nothing() {
        let gw = gateway("https://studio.example").await;
        let result = message_impl(&gw, params(json!({"type": "TRIGGER_SYNC"}))).await.unwrap();
        assert_eq!(output(&result), json!({"registered": []}));
    }
}
