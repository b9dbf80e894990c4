//! The offline worker: lifecycle, cache manager, reminders and messages.
//!
//! ### Lifecycle
//! `Parsed -> Installing -> Installed -> Activating -> Activated`. A failed
//! install ends in `Redundant`. An installed worker waits until it is
//! activated directly or through `SKIP_WAITING`.
//!
//! Only an activated worker intercepts fetches; before that every request
//! goes straight to the network.

pub mod cache;
pub mod command;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{broadcast, watch};

use noor_core::{AppConfig, Error, Store};

use crate::fetch::{Network, Request};
use crate::notify::{ClientMessage, Notification, Notifier, Scheduler};

pub use cache::{CacheManager, PRAYER_TIMES_SYNC, Served, Source};
pub use command::{CommandReply, WorkerCommand, WorkerHandle};

const CLIENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    Parsed,
    Installing,
    Installed,
    Activating,
    Activated,
    Redundant,
}

/// A page the worker controls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientInfo {
    pub id: String,
    pub url: String,
}

/// What a notification click leads to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum ClickOutcome {
    Focus { client_id: String },
    Open { url: String },
    Closed,
}

/// One worker instance.
#[derive(Clone)]
pub struct Worker {
    cache: CacheManager,
    scheduler: Scheduler,
    notifier: Arc<dyn Notifier>,
    state: Arc<watch::Sender<WorkerState>>,
    clients: broadcast::Sender<ClientMessage>,
    app_title: String,
}

impl Worker {
    pub fn new(
        store: Store, network: Arc<dyn Network>, notifier: Arc<dyn Notifier>, config: &AppConfig,
    ) -> Result<Self, Error> {
        let (clients, _) = broadcast::channel(CLIENT_CAPACITY);
        let cache = CacheManager::new(store.clone(), network, config)?;
        let scheduler = Scheduler::new(store, Arc::clone(&notifier), clients.clone());
        let (state, _) = watch::channel(WorkerState::Parsed);

        Ok(Self { cache, scheduler, notifier, state: Arc::new(state), clients, app_title: config.app_title.clone() })
    }

    pub fn state(&self) -> WorkerState {
        *self.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<WorkerState> {
        self.state.subscribe()
    }

    pub fn cache(&self) -> &CacheManager {
        &self.cache
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Messages posted to pages, such as prayer-time notices.
    pub fn subscribe_clients(&self) -> broadcast::Receiver<ClientMessage> {
        self.clients.subscribe()
    }

    fn transition(&self, from: WorkerState, to: WorkerState) -> Result<(), Error> {
        let mut current = from;
        let moved = self.state.send_if_modified(|state| {
            current = *state;
            if *state == from {
                *state = to;
                true
            } else {
                false
            }
        });
        if moved {
            tracing::info!(from = ?from, to = ?to, "worker state changed");
            Ok(())
        } else {
            Err(Error::WorkerState(format!("cannot move to {to:?} from {current:?}")))
        }
    }

    fn force(&self, to: WorkerState) {
        self.state.send_replace(to);
        tracing::info!(to = ?to, "worker state changed");
    }

    /// Precache the manifest. Returns the number of entries stored.
    pub async fn install(&self) -> Result<usize, Error> {
        self.transition(WorkerState::Parsed, WorkerState::Installing)?;
        match self.cache.install().await {
            Ok(count) => {
                self.force(WorkerState::Installed);
                Ok(count)
            }
            Err(e) => {
                tracing::error!(error = %e, "install failed");
                self.force(WorkerState::Redundant);
                Err(e)
            }
        }
    }

    /// Drop stale caches and start intercepting fetches.
    pub async fn activate(&self) -> Result<Vec<String>, Error> {
        self.transition(WorkerState::Installed, WorkerState::Activating)?;
        match self.cache.activate().await {
            Ok(deleted) => {
                self.force(WorkerState::Activated);
                Ok(deleted)
            }
            Err(e) => {
                tracing::error!(error = %e, "activation failed");
                self.force(WorkerState::Installed);
                Err(e)
            }
        }
    }

    /// Activate a waiting worker. Already active is not an error.
    pub async fn skip_waiting(&self) -> Result<WorkerState, Error> {
        match self.state() {
            WorkerState::Installed => {
                self.activate().await?;
            }
            WorkerState::Activated => {}
            other => return Err(Error::WorkerState(format!("nothing waiting to activate ({other:?})"))),
        }
        Ok(self.state())
    }

    /// Answer a page request.
    pub async fn handle_fetch(&self, request: &Request) -> Result<Served, Error> {
        if self.state() == WorkerState::Activated {
            self.cache.handle_fetch(request).await
        } else {
            self.cache.bypass(request).await
        }
    }

    pub async fn sync(&self, tag: &str) -> Result<bool, Error> {
        self.cache.sync(tag).await
    }

    /// Show a push message. The JSON payload's fields override the default
    /// notification; an unreadable payload shows the defaults.
    pub async fn push(&self, payload: Option<&str>) -> Result<Notification, Error> {
        let defaults = Notification::push_default(&self.app_title);
        let notification = match payload {
            Some(raw) => merge_push_payload(&defaults, raw).unwrap_or_else(|e| {
                tracing::warn!(error = %e, "ignoring unreadable push payload");
                defaults
            }),
            None => defaults,
        };

        self.notifier.show(&notification).await?;
        Ok(notification)
    }

    /// Decide what clicking a notification does.
    ///
    /// `open` or no action focuses the first page on this origin, or opens
    /// the root when none is open. Any other action just closes it.
    pub fn notification_click(&self, action: Option<&str>, clients: &[ClientInfo]) -> ClickOutcome {
        if !matches!(action, None | Some("") | Some("open")) {
            return ClickOutcome::Closed;
        }

        let origin = self.cache.origin().origin().ascii_serialization();
        match clients.iter().find(|c| c.url.contains(&origin)) {
            Some(client) => ClickOutcome::Focus { client_id: client.id.clone() },
            None => ClickOutcome::Open { url: "/".into() },
        }
    }
}

fn merge_push_payload(defaults: &Notification, raw: &str) -> Result<Notification, Error> {
    let patch: Value = serde_json::from_str(raw).map_err(|e| Error::InvalidInput(format!("push payload: {e}")))?;
    let Value::Object(patch) = patch else {
        return Err(Error::InvalidInput("push payload is not an object".into()));
    };

    let mut merged = serde_json::to_value(defaults).map_err(|e| Error::InvalidInput(e.to_string()))?;
    if let Value::Object(base) = &mut merged {
        base.extend(patch);
    }

    serde_json::from_value(merged).map_err(|e| Error::InvalidInput(format!("push payload: {e}")))
}
