//! External collaborators module
//!
//! This module contains the alarm scheduler that backs up the countdown and
//! the notifiers that tell the user a timer expired.

pub mod alarm;
pub mod notifier;

// Re-export main types
pub use alarm::{AlarmRequest, AlarmScheduler, NoAlarm, TokioAlarmScheduler};
pub use notifier::{DesktopNotifier, LogNotifier, NotificationAction, Notifier};
