//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the gateway.
use crate::tools::{
    CacheListParams, GatewayFetchParams, GatewayMessageParams, GatewaySyncParams, NotificationClickParams, PushParams,
    click_impl, fetch_impl, list_impl, message_impl, push_impl, sync_impl,
};

use offgrid_client::Gateway;
use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};

/// The main MCP server handler for offgrid.
#[derive(Clone)]
pub struct OffgridServer {
    gateway: Gateway,
    tool_router: ToolRouter<Self>,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// This macro generates the routing logic that maps tool names to handler methods.
#[tool_router]
impl OffgridServer {
    /// Create a new server handler around a running gateway.
    pub fn new(gateway: Gateway) -> Self {
        Self { gateway, tool_router: Self::tool_router() }
    }

    #[tool(
        description = "Issue a request through the offline cache gateway. Returns the response and whether it came from the network, the cache, or the offline page."
    )]
    async fn gateway_fetch(&self, params: Parameters<GatewayFetchParams>) -> Result<CallToolResult, McpError> {
        fetch_impl(&self.gateway, params.0).await
    }

    #[tool(
        description = "Send a page command to the gateway: SKIP_WAITING, GET_VERSION, CACHE_URLS, TRIGGER_SYNC, CLEAR_CACHE or QUEUE_SUBMISSION."
    )]
    async fn gateway_message(&self, params: Parameters<GatewayMessageParams>) -> Result<CallToolResult, McpError> {
        message_impl(&self.gateway, params.0).await
    }

    #[tool(description = "Deliver a push payload. Returns the notification that was shown.")]
    async fn gateway_push(&self, params: Parameters<PushParams>) -> Result<CallToolResult, McpError> {
        push_impl(&self.gateway, params.0).await
    }

    #[tool(description = "Click a shown notification. Focuses a window already at the target URL or opens a new one.")]
    async fn gateway_notification_click(
        &self, params: Parameters<NotificationClickParams>,
    ) -> Result<CallToolResult, McpError> {
        click_impl(&self.gateway, params.0).await
    }

    #[tool(description = "Run a background sync now: deliver queued submissions or refresh cached content.")]
    async fn gateway_sync(&self, params: Parameters<GatewaySyncParams>) -> Result<CallToolResult, McpError> {
        sync_impl(&self.gateway, params.0).await
    }

    #[tool(description = "List cache stores, entry counts, pending submissions and the gateway lifecycle state.")]
    async fn cache_list(&self, params: Parameters<CacheListParams>) -> Result<CallToolResult, McpError> {
        list_impl(&self.gateway, params.0).await
    }
}

impl ServerHandler for OffgridServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "offgrid".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::gateway;

    #[tokio::test]
    async fn test_all_tools_registered() {
        let server = OffgridServer::new(gateway("https://studio.example").await);
        let mut names: Vec<String> = server.tool_router.list_all().into_iter().map(|t| t.name.to_string()).collect();
        names.sort();
        assert_eq!(
            names,
            [
                "cache_list",
                "gateway_fetch",
                "gateway_message",
                "gateway_notification_click",
                "gateway_push",
                "gateway_sync"
            ]
        );
    }
}
