//! Background task that fires reminders from the store.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local, TimeDelta, Utc};
use tokio::sync::{Mutex, Notify, broadcast, watch};
use tokio::task::JoinHandle;

use noor_core::{Error, Reminder, ReminderKind, Store};

use super::{
    AzkarKind, ClientMessage, Notification, Notifier, azkar_reminder, next_occurrence, parse_clock_time, prayer_name,
    prayer_reminders,
};

/// Owns the reminder schedule.
///
/// Schedule changes go to the store first and then wake the running task so
/// it re-reads the earliest reminder.
#[derive(Clone)]
pub struct Scheduler {
    store: Store,
    notifier: Arc<dyn Notifier>,
    clients: broadcast::Sender<ClientMessage>,
    wake: Arc<Notify>,
    /// Fire instants already shown whose advance has not been stored yet.
    shown: Arc<Mutex<HashMap<String, DateTime<Utc>>>>,
}

/// First retry delay after a store error; doubles up to `RETRY_MAX`.
const RETRY_BASE: Duration = Duration::from_secs(1);
const RETRY_MAX: Duration = Duration::from_secs(60);

fn retry_delay(failures: u32) -> Duration {
    let exp = failures.saturating_sub(1).min(6);
    (RETRY_BASE * 2u32.pow(exp)).min(RETRY_MAX)
}

impl Scheduler {
    pub fn new(store: Store, notifier: Arc<dyn Notifier>, clients: broadcast::Sender<ClientMessage>) -> Self {
        Self {
            store,
            notifier,
            clients,
            wake: Arc::new(Notify::new()),
            shown: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Store the placeholder prayer table, replacing any earlier chain.
    pub async fn schedule_prayer_notifications(&self) -> Result<Vec<Reminder>, Error> {
        let reminders = prayer_reminders(&Local::now());
        for reminder in &reminders {
            self.store.upsert_reminder(reminder).await?;
        }
        tracing::info!(count = reminders.len(), "prayer notifications scheduled");
        self.wake.notify_one();
        Ok(reminders)
    }

    /// Schedule the daily azkar reminder for `kind` at `time` (`HH:MM`).
    pub async fn schedule_azkar_reminder(&self, time: &str, kind: AzkarKind) -> Result<Reminder, Error> {
        let clock = parse_clock_time(time)?;
        let reminder = azkar_reminder(&Local::now(), clock, kind);
        self.store.upsert_reminder(&reminder).await?;
        tracing::info!(tag = %reminder.tag, next_fire_at = %reminder.next_fire_at, "azkar reminder scheduled");
        self.wake.notify_one();
        Ok(reminder)
    }

    pub async fn reminders(&self) -> Result<Vec<Reminder>, Error> {
        self.store.list_reminders().await
    }

    /// Move every reminder already due at `now` to its next occurrence
    /// without showing it.
    pub async fn roll_forward_overdue(&self, now: DateTime<Utc>) -> Result<usize, Error> {
        let overdue = self.store.due_reminders(now).await?;
        for reminder in &overdue {
            let next = next_fire_after(reminder, now);
            tracing::info!(tag = %reminder.tag, missed = %reminder.next_fire_at, next = %next, "rolling missed reminder forward");
            self.store.advance_reminder(&reminder.tag, next, None).await?;
        }
        Ok(overdue.len())
    }

    /// Show every reminder due at `now` and advance each to the next day.
    ///
    /// A notifier failure is logged and the reminder still advances. When the
    /// advance cannot be stored the instant stays marked as shown, so the
    /// retry only repeats the write. The first store error is returned after
    /// every due reminder has been tried.
    pub async fn fire_due(&self, now: DateTime<Utc>) -> Result<usize, Error> {
        let due = self.store.due_reminders(now).await?;
        let mut first_err = None;

        for reminder in &due {
            let already_shown = self.shown.lock().await.get(&reminder.tag) == Some(&reminder.next_fire_at);
            if already_shown {
                tracing::debug!(tag = %reminder.tag, "retrying reminder advance");
            } else {
                self.show(reminder).await;
                self.shown.lock().await.insert(reminder.tag.clone(), reminder.next_fire_at);
            }

            let next = next_fire_after(reminder, now);
            match self.store.advance_reminder(&reminder.tag, next, Some(now)).await {
                Ok(()) => {
                    self.shown.lock().await.remove(&reminder.tag);
                    tracing::debug!(tag = %reminder.tag, next = %next, "reminder fired");
                }
                Err(e) => {
                    tracing::warn!(tag = %reminder.tag, error = %e, "failed to advance reminder");
                    first_err.get_or_insert(e);
                }
            }
        }

        match first_err {
            Some(e) => Err(e),
            None => Ok(due.len()),
        }
    }

    async fn show(&self, reminder: &Reminder) {
        let notification = Notification::from_reminder(reminder);
        if let Err(e) = self.notifier.show(&notification).await {
            tracing::warn!(tag = %reminder.tag, error = %e, "failed to show reminder");
        }

        if reminder.kind == ReminderKind::Prayer
            && let Some(name) = prayer_name(&reminder.tag)
        {
            // No connected pages is fine.
            let _ = self.clients.send(ClientMessage::PrayerTimeNotification { prayer: name.to_string() });
        }
    }

    /// Start the background task.
    ///
    /// Reminders missed while the process was down are rolled forward
    /// first; they do not fire late.
    pub fn spawn(self) -> SchedulerHandle {
        let (shutdown, rx) = watch::channel(false);
        let wake = Arc::clone(&self.wake);
        let task = tokio::spawn(self.run(rx));
        SchedulerHandle { wake, shutdown, task }
    }

    async fn run(self, mut shutdown: watch::Receiver<bool>) {
        match self.roll_forward_overdue(Utc::now()).await {
            Ok(0) => {}
            Ok(n) => tracing::info!(count = n, "missed reminders rolled forward"),
            Err(e) => tracing::warn!(error = %e, "failed to roll missed reminders forward"),
        }

        // Consecutive store errors; non-zero means the next wait is a retry.
        let mut failures: u32 = 0;

        loop {
            let delay = if failures > 0 {
                Some(retry_delay(failures))
            } else {
                match self.store.next_reminder().await {
                    Ok(next) => next.map(|r| (r.next_fire_at - Utc::now()).to_std().unwrap_or(Duration::ZERO)),
                    Err(e) => {
                        failures += 1;
                        let retry = retry_delay(failures);
                        tracing::error!(error = %e, retry_in = ?retry, "failed to read reminder table");
                        Some(retry)
                    }
                }
            };

            tokio::select! {
                _ = sleep_or_park(delay) => {
                    match self.fire_due(Utc::now()).await {
                        Ok(_) => failures = 0,
                        Err(e) => {
                            failures += 1;
                            tracing::error!(error = %e, retry_in = ?retry_delay(failures), "failed to fire reminders");
                        }
                    }
                }
                _ = self.wake.notified() => {
                    tracing::debug!("reminder schedule changed");
                }
                _ = shutdown.changed() => break,
            }
        }

        tracing::info!("reminder scheduler stopped");
    }
}

async fn sleep_or_park(delay: Option<Duration>) {
    match delay {
        Some(d) => tokio::time::sleep(d).await,
        None => std::future::pending().await,
    }
}

fn next_fire_after(reminder: &Reminder, now: DateTime<Utc>) -> DateTime<Utc> {
    match parse_clock_time(&reminder.clock_time) {
        Ok(time) => next_occurrence(&now.with_timezone(&Local), time),
        Err(e) => {
            tracing::warn!(tag = %reminder.tag, error = %e, "stored clock time unreadable; advancing one day");
            let mut next = reminder.next_fire_at;
            while next <= now {
                next += TimeDelta::days(1);
            }
            next
        }
    }
}

/// Control for a running scheduler task.
pub struct SchedulerHandle {
    wake: Arc<Notify>,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Make the task re-read the table.
    pub fn wake(&self) {
        self.wake.notify_one();
    }

    /// Stop the task and wait for it to exit.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "reminder scheduler task failed");
        }
    }
}
