//! Timer expiry notifications

use async_trait::async_trait;
use notify_rust::{Notification, Urgency};
use tracing::{debug, info};

use crate::state::{duration::TimerDuration, engine::Expiry};

/// Title shown on every expiry notification
pub const NOTIFICATION_TITLE: &str = "Count Down";

/// Actions offered on the expiry notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationAction {
    Stop,
    AddOneMinute,
}

impl NotificationAction {
    pub const ALL: [NotificationAction; 2] = [Self::AddOneMinute, Self::Stop];

    /// Key reported back by the notification daemon
    pub fn key(&self) -> &'static str {
        match self {
            Self::Stop => "stop",
            Self::AddOneMinute => "add-minute",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Stop => "Stop",
            Self::AddOneMinute => "+1 min",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        match key.trim() {
            "stop" => Some(Self::Stop),
            "add-minute" => Some(Self::AddOneMinute),
            _ => None,
        }
    }
}

/// Message body for an expired run
pub fn expiry_message(expiry: &Expiry) -> String {
    format!(
        "Time is up! ({} countdown)",
        TimerDuration::from_millis_saturating(expiry.total_ms)
    )
}

/// Presents "timer expired" to the user
#[async_trait]
pub trait Notifier: Send + Sync + 'static {
    /// Show the expiry alert.
    ///
    /// Returns the action the user picked, if the notifier supports actions
    /// and one was chosen.
    async fn notify_expired(&self, expiry: &Expiry) -> Result<Option<NotificationAction>, String>;
}

/// Writes the expiry to the log only
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify_expired(&self, expiry: &Expiry) -> Result<Option<NotificationAction>, String> {
        info!("{}: {}", NOTIFICATION_TITLE, expiry_message(expiry));
        Ok(None)
    }
}

/// Shows a freedesktop notification through `notify-rust`
#[derive(Debug, Default, Clone, Copy)]
pub struct DesktopNotifier {
    with_actions: bool,
}

impl DesktopNotifier {
    pub fn new(with_actions: bool) -> Self {
        Self { with_actions }
    }

    /// Build the critical expiry notification, with buttons if enabled
    pub fn build(&self, expiry: &Expiry) -> Notification {
        let mut notification = Notification::new();
        notification
            .summary(NOTIFICATION_TITLE)
            .body(&expiry_message(expiry))
            .appname("count-down")
            .icon("alarm-clock")
            .urgency(Urgency::Critical);
        if self.with_actions {
            for action in NotificationAction::ALL {
                notification.action(action.key(), action.label());
            }
        }
        notification
    }
}

#[async_trait]
impl Notifier for DesktopNotifier {
    async fn notify_expired(&self, expiry: &Expiry) -> Result<Option<NotificationAction>, String> {
        let notification = self.build(expiry);
        let with_actions = self.with_actions;
        let run_id = expiry.run_id;

        // show() talks to the session bus synchronously and waiting for an
        // action blocks until the user answers.
        tokio::task::spawn_blocking(move || -> Result<Option<NotificationAction>, String> {
            let handle = notification
                .show()
                .map_err(|e| format!("Failed to show notification: {}", e))?;
            info!("Expiry notification shown for run {}", run_id);
            if !with_actions {
                return Ok(None);
            }

            let mut chosen = None;
            handle.wait_for_action(|key| {
                chosen = NotificationAction::from_key(key);
                if chosen.is_none() {
                    debug!("Notification for run {} closed with {}", run_id, key);
                }
            });
            Ok(chosen)
        })
        .await
        .map_err(|e| format!("Notification task failed: {}", e))?
    }
}
