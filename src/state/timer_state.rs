//! Timer state, observable snapshot and transition events

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::duration::TimerDuration;

/// Lifecycle state of the countdown
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerState {
    #[default]
    Idle,
    Running,
    Paused,
}

impl TimerState {
    /// Check if a countdown is in flight
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }
}

/// Everything a display needs to render the timer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerSnapshot {
    pub hours: u64,
    pub minutes: u64,
    pub seconds: u64,
    pub state: TimerState,
    pub started: bool,
    /// Last reported milliseconds left of the active run
    pub remaining_ms: Option<u64>,
    pub deadline: Option<DateTime<Utc>>,
}

impl TimerSnapshot {
    pub fn duration(&self) -> TimerDuration {
        TimerDuration::new(self.hours, self.minutes, self.seconds)
    }
}

/// Transition notifications published by the countdown task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TimerEvent {
    Started {
        run_id: u64,
        total_ms: u64,
        deadline: DateTime<Utc>,
    },
    Tick {
        run_id: u64,
        remaining_ms: u64,
    },
    Paused {
        run_id: u64,
        remaining_ms: Option<u64>,
    },
    Extended {
        run_id: u64,
        total_ms: u64,
        deadline: DateTime<Utc>,
    },
    Expired {
        run_id: u64,
        total_ms: u64,
        at: DateTime<Utc>,
    },
    Cleared,
}
