//! Local notifications and the daily reminder schedule.
//!
//! Reminders live in the store's `reminders` table; the [`Scheduler`] task
//! sleeps until the earliest one, shows it through a [`Notifier`] and moves
//! it to the same clock time on the following day.

pub mod scheduler;
pub mod time;

use async_trait::async_trait;
use chrono::{DateTime, NaiveTime, TimeZone};
use serde::{Deserialize, Serialize};

use noor_core::{Error, Reminder, ReminderKind};

pub use scheduler::{Scheduler, SchedulerHandle};
pub use time::{format_clock_time, next_occurrence, parse_clock_time};

const ICON: &str = "/assets/images/icon-192.png";
const BADGE: &str = "/assets/images/badge-72.png";

/// Placeholder daily prayer table: key, hour, minute, display name.
pub const PRAYER_TIMES: [(&str, u32, u32, &str); 5] = [
    ("fajr", 5, 30, "الفجر"),
    ("dhuhr", 12, 30, "الظهر"),
    ("asr", 15, 45, "العصر"),
    ("maghrib", 18, 20, "المغرب"),
    ("isha", 19, 45, "العشاء"),
];

/// Display name of the prayer behind a `prayer-{key}` tag.
pub fn prayer_name(tag: &str) -> Option<&'static str> {
    let key = tag.strip_prefix("prayer-")?;
    PRAYER_TIMES.iter().find(|(k, ..)| *k == key).map(|(.., name)| *name)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct NotificationAction {
    pub action: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

/// A notification as handed to the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub icon: String,
    pub badge: String,
    pub tag: String,
    pub require_interaction: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub vibrate: Vec<u32>,
    #[serde(default)]
    pub actions: Vec<NotificationAction>,
}

impl Notification {
    /// What a push shows when its payload says nothing else.
    pub fn push_default(app_title: &str) -> Self {
        Self {
            title: app_title.to_string(),
            body: "إشعار جديد".into(),
            icon: ICON.into(),
            badge: BADGE.into(),
            tag: "muslim-app-notification".into(),
            require_interaction: true,
            vibrate: Vec::new(),
            actions: vec![
                NotificationAction {
                    action: "open".into(),
                    title: "فتح التطبيق".into(),
                    icon: Some("/assets/images/action-open.png".into()),
                },
                NotificationAction {
                    action: "dismiss".into(),
                    title: "إغلاق".into(),
                    icon: Some("/assets/images/action-dismiss.png".into()),
                },
            ],
        }
    }

    /// Shape a stored reminder for display.
    pub fn from_reminder(reminder: &Reminder) -> Self {
        let (vibrate, actions) = match reminder.kind {
            ReminderKind::Prayer => (
                vec![200, 100, 200],
                vec![NotificationAction { action: "open-prayer".into(), title: "عرض مواقيت الصلاة".into(), icon: None }],
            ),
            ReminderKind::Azkar => (Vec::new(), Vec::new()),
        };
        Self {
            title: reminder.title.clone(),
            body: reminder.body.clone(),
            icon: ICON.into(),
            badge: BADGE.into(),
            tag: reminder.tag.clone(),
            require_interaction: reminder.kind == ReminderKind::Prayer,
            vibrate,
            actions,
        }
    }
}

/// Shows notifications to the user.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn show(&self, notification: &Notification) -> Result<(), Error>;
}

/// Notifier for headless hosts: every notification becomes a log line.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn show(&self, notification: &Notification) -> Result<(), Error> {
        tracing::info!(tag = %notification.tag, title = %notification.title, body = %notification.body, "notification");
        Ok(())
    }
}

/// Messages the worker posts to every connected page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientMessage {
    PrayerTimeNotification { prayer: String },
}

/// Morning or evening remembrance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum AzkarKind {
    Morning,
    Evening,
}

impl AzkarKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AzkarKind::Morning => "morning",
            AzkarKind::Evening => "evening",
        }
    }
}

/// The five prayer reminders, each due at its next occurrence after `now`.
pub fn prayer_reminders<Tz: TimeZone>(now: &DateTime<Tz>) -> Vec<Reminder> {
    PRAYER_TIMES
        .iter()
        .filter_map(|&(key, hour, minute, name)| {
            let time = NaiveTime::from_hms_opt(hour, minute, 0)?;
            Some(Reminder {
                tag: format!("prayer-{key}"),
                kind: ReminderKind::Prayer,
                clock_time: format_clock_time(time),
                title: format!("حان وقت صلاة {name}"),
                body: "حان الآن وقت الصلاة".into(),
                next_fire_at: next_occurrence(now, time),
                last_fired_at: None,
            })
        })
        .collect()
}

/// An azkar reminder at `time`, due at its next occurrence after `now`.
pub fn azkar_reminder<Tz: TimeZone>(now: &DateTime<Tz>, time: NaiveTime, kind: AzkarKind) -> Reminder {
    let (title, body) = match kind {
        AzkarKind::Morning => ("تذكير أذكار الصباح", "حان وقت أذكار الصباح"),
        AzkarKind::Evening => ("تذكير أذكار المساء", "حان وقت أذكار المساء"),
    };
    Reminder {
        tag: format!("azkar-{}", kind.as_str()),
        kind: ReminderKind::Azkar,
        clock_time: format_clock_time(time),
        title: title.into(),
        body: body.into(),
        next_fire_at: next_occurrence(now, time),
        last_fired_at: None,
    }
}
