//! Errors raised by the server's own tool plumbing.
//!
//! Domain failures arrive as `noor_core::Error` and carry their own codes;
//! these cover argument checks and output encoding.

use rmcp::model::{ErrorCode, ErrorData as McpError};

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// Invalid input parameters (e.g., latitude out of range).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// Tool output could not be encoded.
    #[error("OUTPUT_FAILED: {0}")]
    OutputFailed(String),
}

impl From<ToolError> for McpError {
    fn from(err: ToolError) -> Self {
        let code = match &err {
            ToolError::InvalidInput(_) => -32602,
            ToolError::OutputFailed(_) => -32603,
        };

        McpError { code: ErrorCode(code), message: err.to_string().into(), data: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        let invalid: McpError = ToolError::InvalidInput("latitude".into()).into();
        assert_eq!(invalid.code, ErrorCode(-32602));
        assert!(invalid.message.starts_with("INVALID_INPUT:"));

        let output: McpError = ToolError::OutputFailed("nan".into()).into();
        assert_eq!(output.code, ErrorCode(-32603));
    }
}
