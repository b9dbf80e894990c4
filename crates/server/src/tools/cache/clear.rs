//! cache_clear tool implementation.
//!
//! Sends `CLEAR_CACHE` over the worker's message channel and waits for the
//! acknowledgement.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use noor_client::{CommandReply, WorkerCommand};
use noor_core::Error;

use crate::handler::ServerContext;
use crate::tools::json_result;

/// Output from the cache_clear tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheClearOutput {
    pub success: bool,
}

/// Implementation of the cache_clear tool.
pub async fn clear_impl(ctx: &ServerContext) -> Result<CallToolResult, McpError> {
    match ctx.handle.request(WorkerCommand::ClearCache).await? {
        CommandReply::Cleared { success } => json_result(&CacheClearOutput { success }),
        other => Err(Error::WorkerState(format!("unexpected reply: {other:?}")).into()),
    }
}
