//! MCP tool implementations.
//!
//! Each tool lives in its own module as a params struct, an output struct
//! and an `*_impl` function the handler delegates to.

pub mod cache;
pub mod qibla;
pub mod reminders;
pub mod settings;
pub mod shell_fetch;
pub mod worker;

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use serde::Serialize;

use crate::error::ToolError;

/// Render a tool output as pretty JSON text content.
pub(crate) fn json_result<T: Serialize>(output: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(output).map_err(|e| ToolError::OutputFailed(e.to_string()))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}
