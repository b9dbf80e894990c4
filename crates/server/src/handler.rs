//! MCP server handler implementation.
//!
//! This module defines the main server handler that routes tool calls to
//! the worker, the store and the helpers in `tools`.
use std::sync::Arc;

use crate::tools::{
    cache,
    qibla::{QiblaParams, qibla_impl},
    reminders::{self, ReminderScheduleParams},
    settings::{self, SettingsImportParams},
    shell_fetch::{ShellFetchParams, shell_fetch_impl},
    worker::{BackgroundSyncParams, PushMessageParams, push_impl, skip_waiting_impl, sync_impl},
};

use noor_client::{Worker, WorkerHandle};
use noor_core::Store;
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
use tokio::task::JoinHandle;

/// Everything a tool call may touch.
pub struct ServerContext {
    pub worker: Worker,
    /// Page side of the worker's message channel.
    pub handle: WorkerHandle,
    pub store: Store,
    listener: JoinHandle<()>,
}

impl ServerContext {
    /// Wrap a worker and start its message loop.
    pub fn new(worker: Worker, store: Store) -> Self {
        let (handle, listener) = worker.listen();
        Self { worker, handle, store, listener }
    }
}

impl Drop for ServerContext {
    fn drop(&mut self) {
        self.listener.abort();
    }
}

/// The main MCP server handler for noor.
#[derive(Clone)]
pub struct NoorServer {
    tool_router: ToolRouter<Self>,
    ctx: Arc<ServerContext>,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// This macro generates the routing logic that maps tool names to handler methods.
#[tool_router]
impl NoorServer {
    /// Create a new server handler.
    pub fn new(ctx: ServerContext) -> Self {
        Self { tool_router: Self::tool_router(), ctx: Arc::new(ctx) }
    }

    #[tool(
        description = "Fetch a URL the way the app shell would: cache first, then network, then offline fallbacks. Relative paths resolve against the shell origin."
    )]
    async fn shell_fetch(&self, params: Parameters<ShellFetchParams>) -> Result<CallToolResult, McpError> {
        shell_fetch_impl(&self.ctx, params.0).await
    }

    #[tool(description = "List the worker's named caches with entry counts.")]
    async fn cache_list(&self) -> Result<CallToolResult, McpError> {
        cache::list_impl(&self.ctx).await
    }

    #[tool(description = "Delete every cache. Returns {success: true} once done.")]
    async fn cache_clear(&self) -> Result<CallToolResult, McpError> {
        cache::clear_impl(&self.ctx).await
    }

    #[tool(description = "Schedule the daily morning or evening azkar reminder at a local HH:MM time.")]
    async fn reminder_schedule(&self, params: Parameters<ReminderScheduleParams>) -> Result<CallToolResult, McpError> {
        reminders::schedule_impl(&self.ctx, params.0).await
    }

    #[tool(description = "List scheduled reminders ordered by next fire time.")]
    async fn reminder_list(&self) -> Result<CallToolResult, McpError> {
        reminders::list_impl(&self.ctx).await
    }

    #[tool(description = "Activate a worker that is installed and waiting.")]
    async fn skip_waiting(&self) -> Result<CallToolResult, McpError> {
        skip_waiting_impl(&self.ctx).await
    }

    #[tool(description = "Run a background sync. The prayer-times-sync tag refreshes the cached prayer table.")]
    async fn background_sync(&self, params: Parameters<BackgroundSyncParams>) -> Result<CallToolResult, McpError> {
        sync_impl(&self.ctx, params.0).await
    }

    #[tool(description = "Deliver a push message. Payload fields override the default notification.")]
    async fn push_message(&self, params: Parameters<PushMessageParams>) -> Result<CallToolResult, McpError> {
        push_impl(&self.ctx, params.0).await
    }

    #[tool(description = "Read the user settings, with defaults for anything unset.")]
    async fn settings_get(&self) -> Result<CallToolResult, McpError> {
        settings::get_impl(&self.ctx).await
    }

    #[tool(description = "Export settings and user data as a JSON backup document.")]
    async fn settings_export(&self) -> Result<CallToolResult, McpError> {
        settings::export_impl(&self.ctx).await
    }

    #[tool(description = "Import a JSON backup document produced by settings_export.")]
    async fn settings_import(&self, params: Parameters<SettingsImportParams>) -> Result<CallToolResult, McpError> {
        settings::import_impl(&self.ctx, params.0).await
    }

    #[tool(description = "Qibla bearing (degrees from true north) and distance to the Kaaba for a location.")]
    async fn qibla_direction(&self, params: Parameters<QiblaParams>) -> Result<CallToolResult, McpError> {
        qibla_impl(params.0)
    }
}

impl ServerHandler for NoorServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "noor".into(),
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
