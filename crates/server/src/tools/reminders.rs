//! reminder_schedule and reminder_list tool implementations.

use chrono::SecondsFormat;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use noor_client::{AzkarKind, CommandReply, WorkerCommand};
use noor_core::{Error, Reminder, ReminderKind};

use super::json_result;
use crate::handler::ServerContext;

/// Parameters for the reminder_schedule tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ReminderScheduleParams {
    /// Local clock time, `HH:MM`.
    pub time: String,
    /// morning or evening.
    pub kind: AzkarKind,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ReminderScheduleOutput {
    pub tag: String,
    /// RFC 3339 timestamp of the next fire.
    pub next_fire_at: String,
}

/// A reminder as shown to tool callers.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ReminderView {
    pub tag: String,
    pub kind: ReminderKind,
    pub clock_time: String,
    pub title: String,
    pub body: String,
    pub next_fire_at: String,
    pub last_fired_at: Option<String>,
}

impl From<Reminder> for ReminderView {
    fn from(r: Reminder) -> Self {
        Self {
            tag: r.tag,
            kind: r.kind,
            clock_time: r.clock_time,
            title: r.title,
            body: r.body,
            next_fire_at: r.next_fire_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            last_fired_at: r.last_fired_at.map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ReminderListOutput {
    /// Ordered by next fire time.
    pub reminders: Vec<ReminderView>,
}

/// Implementation of the reminder_schedule tool.
pub async fn schedule_impl(ctx: &ServerContext, params: ReminderScheduleParams) -> Result<CallToolResult, McpError> {
    let command = WorkerCommand::ScheduleAzkarReminder { time: params.time, kind: params.kind };
    match ctx.handle.request(command).await? {
        CommandReply::Scheduled { tag, next_fire_at } => json_result(&ReminderScheduleOutput { tag, next_fire_at }),
        other => Err(Error::WorkerState(format!("unexpected reply: {other:?}")).into()),
    }
}

/// Implementation of the reminder_list tool.
pub async fn list_impl(ctx: &ServerContext) -> Result<CallToolResult, McpError> {
    let reminders = ctx.worker.scheduler().reminders().await?;
    json_result(&ReminderListOutput { reminders: reminders.into_iter().map(ReminderView::from).collect() })
}
