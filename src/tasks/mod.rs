//! Background tasks module
//!
//! This module contains the tasks that run alongside the HTTP server.

pub mod countdown;
pub mod notifications;

// Re-export main functions
pub use countdown::{spawn_countdown, EngineError, EngineHandle, WeakEngineHandle};
pub use notifications::notification_task;
