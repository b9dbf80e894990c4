//! Worker-side code for noor.
//!
//! This crate provides the network layer, the two-tier offline cache, the
//! daily reminder scheduler and the worker that ties them together behind a
//! typed message channel.

pub mod fetch;
pub mod notify;
pub mod worker;

#[cfg(test)]
pub(crate) mod testing;

pub use fetch::{Destination, FetchConfig, HttpNetwork, Network, Request, Response, ResponseType};
pub use notify::{AzkarKind, ClientMessage, LogNotifier, Notification, Notifier, Scheduler, SchedulerHandle};
pub use worker::{CacheManager, ClickOutcome, ClientInfo, CommandReply, Served, Source, Worker, WorkerCommand, WorkerHandle, WorkerState};
