//! cache_list tool implementation.
//!
//! Lists every named cache with its entry count.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use noor_core::store::CacheInfo;

use crate::handler::ServerContext;
use crate::tools::json_result;

/// Output from the cache_list tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheListOutput {
    /// Caches in creation order.
    pub caches: Vec<CacheInfo>,
    /// Name of the install-time cache.
    pub static_cache: String,
    /// Name of the runtime cache.
    pub dynamic_cache: String,
}

/// Implementation of the cache_list tool.
pub async fn list_impl(ctx: &ServerContext) -> Result<CallToolResult, McpError> {
    let cache = ctx.worker.cache();
    let output = CacheListOutput {
        caches: ctx.store.list_caches().await?,
        static_cache: cache.static_cache().to_string(),
        dynamic_cache: cache.dynamic_cache().to_string(),
    };
    json_result(&output)
}
