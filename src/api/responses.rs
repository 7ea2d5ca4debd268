//! API request and response structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::state::{FieldInput, TimerSnapshot};

/// Body of `PUT /duration/:field`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetFieldRequest {
    /// A number, or raw text from an input box
    pub value: FieldInput,
}

/// Query of the notification action endpoints
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationQuery {
    /// Run whose notification the action came from; omitted means "now"
    pub run_id: Option<u64>,
}

/// API response structure for timer actions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse {
    pub status: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub timer: TimerSnapshot,
}

impl ApiResponse {
    /// Create a new API response
    pub fn new(status: String, message: String, timer: TimerSnapshot) -> Self {
        Self {
            status,
            message,
            timestamp: Utc::now(),
            timer,
        }
    }

    /// Status follows the timer: running or not
    pub fn for_timer(message: String, timer: TimerSnapshot) -> Self {
        let status = if timer.started { "running" } else { "stopped" };
        Self::new(status.to_string(), message, timer)
    }
}

/// Response for field edits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldResponse {
    pub field: String,
    pub value: u64,
    pub timer: TimerSnapshot,
}

/// Response for `POST /toggle`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToggleResponse {
    pub started: bool,
    pub timer: TimerSnapshot,
}

/// Status response with server information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub timer: TimerSnapshot,
    pub uptime: String,
    pub port: u16,
    pub host: String,
    pub last_action: Option<String>,
    pub last_action_time: Option<DateTime<Utc>>,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub version: String,
}

impl HealthResponse {
    /// Create a new health response
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
            timestamp: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
