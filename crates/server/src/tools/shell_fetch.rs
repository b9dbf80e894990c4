//! shell_fetch tool implementation.
//!
//! Answers a page request through the worker: cache first, then network,
//! then the offline fallbacks.

use rmcp::ErrorData as McpError;
use rmcp::model::CallToolResult;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use noor_client::fetch::Method;
use noor_client::{Destination, Request, ResponseType, Source};
use noor_core::Error;

use super::json_result;
use crate::handler::ServerContext;

/// Input parameters for the shell_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ShellFetchParams {
    /// URL to fetch. Paths such as `/index.html` resolve against the shell origin.
    pub url: String,

    /// Request destination: document, image, script, style, font or empty (default).
    #[serde(default)]
    pub destination: Option<String>,

    /// HTTP method (default GET). Anything but GET bypasses the caches.
    #[serde(default)]
    pub method: Option<String>,
}

/// Output structure for the shell_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ShellFetchOutput {
    pub url: String,
    pub status: u16,
    /// cache, network, fallback or bypass.
    pub source: String,
    /// basic, cors or default.
    pub response_type: String,
    /// Cache that answered, if any.
    pub cache: Option<String>,
    pub content_type: Option<String>,
    pub bytes: usize,
    /// Body as UTF-8 text, lossily decoded.
    pub body: String,
}

fn label<T: Serialize>(value: &T) -> String {
    serde_json::to_value(value)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default()
}

/// Implementation of the shell_fetch tool.
pub async fn shell_fetch_impl(ctx: &ServerContext, params: ShellFetchParams) -> Result<CallToolResult, McpError> {
    if params.url.trim().is_empty() {
        return Err(Error::InvalidInput("url cannot be empty".into()).into());
    }

    let url = ctx.worker.cache().resolve(&params.url)?;
    let destination: Destination = params.destination.as_deref().unwrap_or("").parse()?;
    let method = parse_method(params.method.as_deref().unwrap_or("GET"))?;

    let served = ctx.worker.handle_fetch(&Request { method, url, destination }).await?;

    let response = served.response;
    let output = ShellFetchOutput {
        url: response.url.to_string(),
        status: response.status,
        source: label::<Source>(&served.source),
        response_type: label::<ResponseType>(&response.response_type),
        cache: served.cache,
        content_type: response.content_type,
        bytes: response.body.len(),
        body: String::from_utf8_lossy(&response.body).into_owned(),
    };

    json_result(&output)
}

fn parse_method(raw: &str) -> Result<Method, Error> {
    Method::from_bytes(raw.trim().to_ascii_uppercase().as_bytes())
        .map_err(|_| Error::InvalidInput(format!("invalid method: {raw}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::{active_context, context, json};

    fn params(url: &str, destination: Option<&str>) -> ShellFetchParams {
        ShellFetchParams { url: url.into(), destination: destination.map(str::to_string), method: None }
    }

    #[tokio::test]
    async fn test_empty_url() {
        let ctx = context().await;
        assert!(shell_fetch_impl(&ctx, params("  ", None)).await.is_err());
    }

    #[tokio::test]
    async fn test_unknown_destination() {
        let ctx = context().await;
        let result = shell_fetch_impl(&ctx, params("/", Some("video"))).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_offline_script_is_network_error() {
        let ctx = context().await;
        let err = shell_fetch_impl(&ctx, params("/assets/js/app.js", Some("script")))
            .await
            .unwrap_err();
        assert_eq!(err.code.0, -32004);
    }

    #[tokio::test]
    async fn test_served_from_cache_once_active() {
        let ctx = active_context().await;
        let store = ctx.worker.cache().store();
        store
            .put_all_responses(
                "static-v1",
                vec![noor_core::CachedResponse::new(
                    "http://localhost:8080/index.html",
                    200,
                    Some("text/html".into()),
                    b"<html>offline</html>".to_vec(),
                )],
            )
            .await
            .unwrap();

        let result = shell_fetch_impl(&ctx, params("/quran", Some("document"))).await.unwrap();
        let output = json(&result);

        assert_eq!(output["source"], "fallback");
        assert_eq!(output["cache"], "static-v1");
        assert_eq!(output["body"], "<html>offline</html>");
    }

    #[test]
    fn test_parse_method() {
        assert_eq!(parse_method("post").unwrap(), Method::POST);
        assert!(parse_method("NOT A METHOD").is_err());
    }
}
