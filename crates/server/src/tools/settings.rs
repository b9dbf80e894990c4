//! settings_get, settings_export and settings_import tool implementations.

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use noor_core::Settings;

use super::json_result;
use crate::handler::ServerContext;

/// Parameters for the settings_import tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SettingsImportParams {
    /// Backup document as produced by settings_export.
    pub backup: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SettingsImportOutput {
    /// False when the backup carried no settings; stored settings are unchanged.
    pub imported: bool,
    pub settings: Settings,
}

/// Implementation of the settings_get tool.
pub async fn get_impl(ctx: &ServerContext) -> Result<CallToolResult, McpError> {
    let settings = ctx.store.load_settings().await?;
    json_result(&settings)
}

/// Implementation of the settings_export tool.
pub async fn export_impl(ctx: &ServerContext) -> Result<CallToolResult, McpError> {
    let backup = ctx.store.export_backup().await?;
    Ok(CallToolResult::success(vec![Content::text(backup)]))
}

/// Implementation of the settings_import tool.
pub async fn import_impl(ctx: &ServerContext, params: SettingsImportParams) -> Result<CallToolResult, McpError> {
    let imported = ctx.store.import_backup(&params.backup).await?;
    let output = match imported {
        Some(settings) => SettingsImportOutput { imported: true, settings },
        None => SettingsImportOutput { imported: false, settings: ctx.store.load_settings().await? },
    };
    json_result(&output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::{context, json};

    #[tokio::test]
    async fn test_get_defaults() {
        let ctx = context().await;
        let output = json(&get_impl(&ctx).await.unwrap());
        assert_eq!(output["language"], "ar");
        assert_eq!(output["fontSize"], 16);
    }

    #[tokio::test]
    async fn test_export_then_import() {
        let ctx = context().await;
        ctx.store
            .save_settings(&Settings { theme: "dark".into(), ..Settings::default() })
            .await
            .unwrap();

        let exported = json(&export_impl(&ctx).await.unwrap());
        assert_eq!(exported["settings"]["theme"], "dark");
        assert!(exported["exportDate"].is_string());

        ctx.store.reset_settings().await.unwrap();
        let output = json(&import_impl(&ctx, SettingsImportParams { backup: exported.to_string() }).await.unwrap());
        assert_eq!(output["imported"], true);
        assert_eq!(output["settings"]["theme"], "dark");
    }

    #[tokio::test]
    async fn test_import_without_settings_keeps_current() {
        let ctx = context().await;
        let output = json(&import_impl(&ctx, SettingsImportParams { backup: r#"{"userData":{}}"#.into() }).await.unwrap());
        assert_eq!(output["imported"], false);
        assert_eq!(output["settings"]["theme"], "light");
    }

    #[tokio::test]
    async fn test_import_malformed() {
        let ctx = context().await;
        let err = import_impl(&ctx, SettingsImportParams { backup: "{oops".into() }).await.unwrap_err();
        assert_eq!(err.code.0, -32009);
    }
}
