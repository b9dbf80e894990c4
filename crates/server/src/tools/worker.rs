//! Worker lifecycle tools: skip_waiting, background_sync and push_message.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use noor_client::{CommandReply, Notification, WorkerCommand, WorkerState};
use noor_core::Error;

use super::json_result;
use crate::handler::ServerContext;

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SkipWaitingOutput {
    pub state: WorkerState,
}

/// Parameters for the background_sync tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct BackgroundSyncParams {
    /// Sync tag; only `prayer-times-sync` does anything.
    pub tag: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct BackgroundSyncOutput {
    pub tag: String,
    /// Whether fresh data was stored.
    pub synced: bool,
}

/// Parameters for the push_message tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PushMessageParams {
    /// JSON object whose fields override the default notification.
    #[serde(default)]
    pub payload: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PushMessageOutput {
    pub shown: Notification,
}

/// Implementation of the skip_waiting tool.
pub async fn skip_waiting_impl(ctx: &ServerContext) -> Result<CallToolResult, McpError> {
    match ctx.handle.request(WorkerCommand::SkipWaiting).await? {
        CommandReply::Ack { state } => json_result(&SkipWaitingOutput { state }),
        other => Err(Error::WorkerState(format!("unexpected reply: {other:?}")).into()),
    }
}

/// Implementation of the background_sync tool.
pub async fn sync_impl(ctx: &ServerContext, params: BackgroundSyncParams) -> Result<CallToolResult, McpError> {
    let synced = ctx.worker.sync(&params.tag).await?;
    json_result(&BackgroundSyncOutput { tag: params.tag, synced })
}

/// Implementation of the push_message tool.
pub async fn push_impl(ctx: &ServerContext, params: PushMessageParams) -> Result<CallToolResult, McpError> {
    let shown = ctx.worker.push(params.payload.as_deref()).await?;
    json_result(&PushMessageOutput { shown })
}
