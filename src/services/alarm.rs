//! Deadline alarm that backs up the in-process ticks
//!
//! The alarm sleeps on tokio's monotonic clock, which stands still while the
//! machine is suspended. After a resume it fires late by the suspended time,
//! so it only covers a stalled tick loop, not a sleeping machine.

use tokio::{task::JoinHandle, time::Instant};
use tracing::{debug, info, warn};

use crate::{state::engine::RunInfo, tasks::countdown::WeakEngineHandle};

/// A wake-up request for one run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlarmRequest {
    pub run: RunInfo,
    /// Monotonic instant matching `run.deadline`
    pub fire_at: Instant,
}

/// Best-effort wake-up at a run's deadline.
///
/// At most one alarm is pending; scheduling replaces the previous one.
pub trait AlarmScheduler: Send + 'static {
    fn schedule(&mut self, request: AlarmRequest);
    fn cancel(&mut self);
}

/// Alarm scheduler that does nothing, for `--no-alarm`
#[derive(Debug, Default, Clone, Copy)]
pub struct NoAlarm;

impl AlarmScheduler for NoAlarm {
    fn schedule(&mut self, request: AlarmRequest) {
        debug!("Alarm disabled, not scheduling run {}", request.run.run_id);
    }

    fn cancel(&mut self) {}
}

/// Sleeps on the tokio timer until the deadline, then reports back to the engine
#[derive(Debug)]
pub struct TokioAlarmScheduler {
    engine: WeakEngineHandle,
    pending: Option<JoinHandle<()>>,
}

impl TokioAlarmScheduler {
    pub fn new(engine: WeakEngineHandle) -> Self {
        Self {
            engine,
            pending: None,
        }
    }

    /// Check if an alarm is waiting to fire
    pub fn is_pending(&self) -> bool {
        self.pending.as_ref().is_some_and(|task| !task.is_finished())
    }
}

impl AlarmScheduler for TokioAlarmScheduler {
    fn schedule(&mut self, request: AlarmRequest) {
        self.cancel();

        let engine = self.engine.clone();
        info!(
            "Alarm set for run {} at {}",
            request.run.run_id,
            request.run.deadline.format("%H:%M:%S")
        );
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep_until(request.fire_at).await;
            debug!("Alarm for run {} reached its deadline", request.run.run_id);
            if let Err(e) = engine.alarm_fired(request.run).await {
                warn!("Failed to deliver alarm for run {}: {}", request.run.run_id, e);
            }
        }));
    }

    fn cancel(&mut self) {
        if let Some(task) = self.pending.take() {
            if !task.is_finished() {
                debug!("Cancelling pending alarm");
            }
            task.abort();
        }
    }
}

impl Drop for TokioAlarmScheduler {
    fn drop(&mut self) {
        self.cancel();
    }
}
