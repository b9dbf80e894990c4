//! Page to worker message channel.
//!
//! Commands travel over an mpsc queue and are handled one at a time in
//! arrival order. A sender that wants an answer attaches a oneshot reply
//! port; fire-and-forget posts only log failures.

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use noor_core::Error;

use super::{Worker, WorkerState};
use crate::notify::AzkarKind;

const QUEUE_DEPTH: usize = 32;

/// A message from a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerCommand {
    SkipWaiting,
    ScheduleAzkarReminder { time: String, kind: AzkarKind },
    ClearCache,
}

impl WorkerCommand {
    /// Decode a JSON message.
    pub fn parse(json: &str) -> Result<Self, Error> {
        serde_json::from_str(json).map_err(|e| Error::InvalidInput(format!("bad worker message: {e}")))
    }
}

/// Answer sent back on a reply port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum CommandReply {
    Ack { state: WorkerState },
    Scheduled { tag: String, next_fire_at: String },
    Cleared { success: bool },
}

type ReplyPort = oneshot::Sender<Result<CommandReply, Error>>;

struct Envelope {
    command: WorkerCommand,
    reply: Option<ReplyPort>,
}

/// Sending side of a worker's message channel.
#[derive(Clone)]
pub struct WorkerHandle {
    tx: mpsc::Sender<Envelope>,
}

impl WorkerHandle {
    /// Post without waiting for the outcome.
    pub async fn post(&self, command: WorkerCommand) -> Result<(), Error> {
        self.tx
            .send(Envelope { command, reply: None })
            .await
            .map_err(|_| Error::WorkerState("worker stopped".into()))
    }

    /// Post and wait for the reply.
    pub async fn request(&self, command: WorkerCommand) -> Result<CommandReply, Error> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Envelope { command, reply: Some(reply) })
            .await
            .map_err(|_| Error::WorkerState("worker stopped".into()))?;
        rx.await
            .map_err(|_| Error::WorkerState("worker dropped the reply port".into()))?
    }
}

impl Worker {
    /// Start handling messages. The loop ends when every handle is dropped.
    pub fn listen(&self) -> (WorkerHandle, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<Envelope>(QUEUE_DEPTH);
        let worker = self.clone();

        let task = tokio::spawn(async move {
            while let Some(Envelope { command, reply }) = rx.recv().await {
                tracing::debug!(?command, "worker message");
                let result = worker.handle_command(command).await;
                match reply {
                    Some(port) => {
                        let _ = port.send(result);
                    }
                    None => {
                        if let Err(e) = result {
                            tracing::warn!(error = %e, "worker message failed");
                        }
                    }
                }
            }
            tracing::debug!("worker message channel closed");
        });

        (WorkerHandle { tx }, task)
    }

    pub async fn handle_command(&self, command: WorkerCommand) -> Result<CommandReply, Error> {
        match command {
            WorkerCommand::SkipWaiting => {
                let state = self.skip_waiting().await?;
                Ok(CommandReply::Ack { state })
            }
            WorkerCommand::ScheduleAzkarReminder { time, kind } => {
                let reminder = self.scheduler().schedule_azkar_reminder(&time, kind).await?;
                Ok(CommandReply::Scheduled { tag: reminder.tag, next_fire_at: reminder.next_fire_at.to_rfc3339() })
            }
            WorkerCommand::ClearCache => {
                self.cache().clear().await?;
                Ok(CommandReply::Cleared { success: true })
            }
        }
    }
}
