//! Cache-related MCP tools.

pub mod clear;
pub mod list;

pub use clear::{CacheClearOutput, clear_impl};
pub use list::{CacheListOutput, list_impl};
