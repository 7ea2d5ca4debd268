//! Countdown engine state machine
//!
//! The engine is synchronous and owns no timers. The countdown task calls
//! [`CountdownEngine::advance`] once per second while a run is active and
//! turns the returned [`Progress`] into display updates and expiry events.
//!
//! ```text
//!            toggle                  advance() reports 0
//!  Idle ───────────────► Running ─────────────────────────► Idle (fields 0)
//!   ▲                    │    ▲
//!   │ clear()     toggle │    │ toggle
//!   │                    ▼    │
//!   └──────────────────── Paused
//! ```
//!
//! Every run gets a fresh id. An alarm that arrives for an older run, or for
//! the active run before it was extended, no longer matches and is dropped,
//! so each run expires at most once.

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use super::{
    duration::{FieldInput, RemainingTime, TimeField, TimerDuration, MILLIS_PER_SECOND},
    timer_state::{TimerSnapshot, TimerState},
};

/// Period between two ticks of a running countdown
pub const TICK_INTERVAL_MS: u64 = MILLIS_PER_SECOND;

/// Amount added by the "add one minute" action
pub const ONE_MINUTE_MS: u64 = 60 * MILLIS_PER_SECOND;

/// The in-flight countdown
#[derive(Debug, Clone)]
struct Run {
    id: u64,
    total_ms: u64,
    ticks_delivered: u64,
    started_at: DateTime<Utc>,
}

impl Run {
    fn next_remaining_ms(&self) -> u64 {
        self.total_ms
            .saturating_sub(self.ticks_delivered.saturating_mul(TICK_INTERVAL_MS))
    }

    fn deadline(&self) -> DateTime<Utc> {
        self.started_at + chrono::Duration::milliseconds(self.total_ms as i64)
    }

    fn info(&self) -> RunInfo {
        RunInfo {
            run_id: self.id,
            total_ms: self.total_ms,
            deadline: self.deadline(),
        }
    }
}

/// Public description of a run, handed to the alarm scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunInfo {
    pub run_id: u64,
    pub total_ms: u64,
    pub deadline: DateTime<Utc>,
}

/// A run that reached zero
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Expiry {
    pub run_id: u64,
    pub total_ms: u64,
    pub at: DateTime<Utc>,
}

/// Outcome of the start/pause toggle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggle {
    Started(RunInfo),
    Paused {
        run_id: u64,
        remaining_ms: Option<u64>,
    },
}

impl Toggle {
    /// The new `started` flag
    pub fn started(&self) -> bool {
        matches!(self, Self::Started(_))
    }
}

/// Outcome of one interval delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    Tick { run_id: u64, remaining_ms: u64 },
    Finished(Expiry),
}

/// Outcome of the "add one minute" action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extension {
    /// The active run now ends one minute later
    Extended(RunInfo),
    /// No run was active; one minute was added to the fields and a run started
    Started(RunInfo),
}

impl Extension {
    pub fn run(&self) -> RunInfo {
        match self {
            Self::Extended(info) | Self::Started(info) => *info,
        }
    }
}

/// Single countdown timer
#[derive(Debug, Default)]
pub struct CountdownEngine {
    fields: TimerDuration,
    state: TimerState,
    run: Option<Run>,
    last_run_id: u64,
    remaining_ms: Option<u64>,
}

impl CountdownEngine {
    /// Create an idle engine with all fields at zero
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> TimerState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state.is_running()
    }

    pub fn fields(&self) -> TimerDuration {
        self.fields
    }

    pub fn active_run(&self) -> Option<RunInfo> {
        self.run.as_ref().map(Run::info)
    }

    /// Whether `run_id` is the most recently started run, active or not
    pub fn is_latest_run(&self, run_id: u64) -> bool {
        run_id != 0 && run_id == self.last_run_id
    }

    pub fn snapshot(&self) -> TimerSnapshot {
        TimerSnapshot {
            hours: self.fields.hours,
            minutes: self.fields.minutes,
            seconds: self.fields.seconds,
            state: self.state,
            started: self.is_running(),
            remaining_ms: self.remaining_ms,
            deadline: self.run.as_ref().map(Run::deadline),
        }
    }

    /// Set a field from raw input.
    ///
    /// Returns the stored value, or `None` when the edit was rejected
    /// because a countdown is running.
    pub fn set_field(&mut self, field: TimeField, input: &FieldInput) -> Option<u64> {
        if self.is_running() {
            debug!("Ignoring {} edit while running", field);
            return None;
        }
        let value = input.resolve(field);
        self.fields.set(field, value);
        Some(value)
    }

    pub fn set_hours(&mut self, value: i64) -> Option<u64> {
        self.set_field(TimeField::Hours, &FieldInput::Number(value))
    }

    pub fn set_minutes(&mut self, value: i64) -> Option<u64> {
        self.set_field(TimeField::Minutes, &FieldInput::Number(value))
    }

    pub fn set_seconds(&mut self, value: i64) -> Option<u64> {
        self.set_field(TimeField::Seconds, &FieldInput::Number(value))
    }

    /// Move a field up or down by `delta`, stopping at the range bounds
    pub fn step_field(&mut self, field: TimeField, delta: i64) -> Option<u64> {
        let current = self.fields.get(field) as i64;
        self.set_field(field, &FieldInput::Number(current.saturating_add(delta)))
    }

    /// Start from the current fields, or pause the active run
    pub fn toggle_start_pause(&mut self, now: DateTime<Utc>) -> Toggle {
        if self.is_running() {
            self.pause()
        } else {
            Toggle::Started(self.start(now))
        }
    }

    fn start(&mut self, now: DateTime<Utc>) -> RunInfo {
        self.last_run_id += 1;
        let run = Run {
            id: self.last_run_id,
            total_ms: self.fields.total_millis(),
            ticks_delivered: 0,
            started_at: now,
        };
        let info = run.info();
        info!("Starting run {} for {} ({} ms)", run.id, self.fields, run.total_ms);
        self.remaining_ms = Some(run.total_ms);
        self.run = Some(run);
        self.state = TimerState::Running;
        info
    }

    // Display fields keep whatever the last tick wrote.
    fn pause(&mut self) -> Toggle {
        let run_id = self.run.take().map(|run| run.id).unwrap_or(self.last_run_id);
        self.state = TimerState::Paused;
        info!("Paused run {} at {}", run_id, self.fields);
        Toggle::Paused {
            run_id,
            remaining_ms: self.remaining_ms,
        }
    }

    /// Deliver the next one-second step of the active run.
    ///
    /// The k-th call of a run reports `total - k * 1000` ms. Reporting zero
    /// finishes the run instead of ticking. Returns `None` when idle or paused.
    pub fn advance(&mut self, now: DateTime<Utc>) -> Option<Progress> {
        let run = self.run.as_mut()?;
        let remaining_ms = run.next_remaining_ms();
        run.ticks_delivered += 1;
        let run_id = run.id;

        if remaining_ms == 0 {
            return self.finish(now).map(Progress::Finished);
        }
        self.tick(remaining_ms);
        Some(Progress::Tick { run_id, remaining_ms })
    }

    /// Project `remaining_ms` onto the display fields
    pub fn tick(&mut self, remaining_ms: u64) {
        let remaining = RemainingTime::from_millis(remaining_ms);
        self.fields = TimerDuration::new(remaining.hours, remaining.minutes, remaining.seconds);
        self.remaining_ms = Some(remaining_ms);
        debug!("Tick: {} left", self.fields);
    }

    /// Finish the active run: back to idle with all fields at zero.
    ///
    /// Returns `None` if no run is active, so a run can only expire once.
    pub fn finish(&mut self, now: DateTime<Utc>) -> Option<Expiry> {
        let run = self.run.take()?;
        info!("Run {} finished after {} ms", run.id, run.total_ms);
        self.clear();
        Some(Expiry {
            run_id: run.id,
            total_ms: run.total_ms,
            at: now,
        })
    }

    /// Finish `run` if it is still the active run with the same length.
    ///
    /// A run that was paused, cleared, restarted or extended since `run` was
    /// captured is left alone.
    pub fn finish_run(&mut self, run: RunInfo, now: DateTime<Utc>) -> Option<Expiry> {
        let is_active = self
            .run
            .as_ref()
            .is_some_and(|active| active.id == run.run_id && active.total_ms == run.total_ms);
        if !is_active {
            debug!("Ignoring finish for stale run {}", run.run_id);
            return None;
        }
        self.finish(now)
    }

    /// Reset to idle with zero fields, cancelling any run.
    ///
    /// Returns whether anything observable changed.
    pub fn clear(&mut self) -> bool {
        let changed = self.state != TimerState::Idle
            || self.run.is_some()
            || !self.fields.is_zero()
            || self.remaining_ms.is_some();
        self.run = None;
        self.state = TimerState::Idle;
        self.fields = TimerDuration::default();
        self.remaining_ms = None;
        changed
    }

    /// Extend the active run by one minute, or start a run one minute
    /// longer than the current fields.
    pub fn add_one_minute(&mut self, now: DateTime<Utc>) -> Extension {
        if let Some(run) = self.run.as_mut() {
            run.total_ms += ONE_MINUTE_MS;
            let info = run.info();
            info!("Extended run {} to {} ms", info.run_id, info.total_ms);
            return Extension::Extended(info);
        }
        let total_ms = self.fields.total_millis() + ONE_MINUTE_MS;
        self.fields = TimerDuration::from_millis_saturating(total_ms);
        Extension::Started(self.start(now))
    }
}
