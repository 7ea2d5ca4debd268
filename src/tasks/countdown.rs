//! Countdown background task
//!
//! The task owns the [`CountdownEngine`] and is the only place its state
//! changes. User commands, one-second ticks and alarm firings are all
//! serialized through its command queue. [`EngineHandle`] is the client side.
//! [`WeakEngineHandle`] reaches the same queue without keeping the task
//! alive; the task stops once every strong handle is gone.

use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tokio::{
    sync::{broadcast, mpsc, oneshot, watch},
    time::{Instant, Interval, MissedTickBehavior},
};
use tracing::{debug, info};

use crate::{
    services::{
        alarm::{AlarmRequest, AlarmScheduler},
        notifier::NotificationAction,
    },
    state::{
        engine::{CountdownEngine, Expiry, Extension, Progress, RunInfo, Toggle, TICK_INTERVAL_MS},
        FieldInput, TimeField, TimerEvent, TimerSnapshot,
    },
};

/// Depth of the command queue between handles and the task
const COMMAND_QUEUE_DEPTH: usize = 64;

/// Capacity of the transition event channel
const EVENT_CHANNEL_CAPACITY: usize = 100;

/// Errors surfaced by [`EngineHandle`]
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum EngineError {
    #[error("countdown task is not running")]
    Closed,
    #[error("duration cannot be edited while the countdown is running")]
    Running,
    #[error("run {run_id} was superseded by a newer run")]
    Superseded { run_id: u64 },
}

/// Requests processed by the countdown task
#[derive(Debug)]
pub(crate) enum Command {
    SetField {
        field: TimeField,
        input: FieldInput,
        reply: oneshot::Sender<Option<u64>>,
    },
    StepField {
        field: TimeField,
        delta: i64,
        reply: oneshot::Sender<Option<u64>>,
    },
    Toggle {
        reply: oneshot::Sender<bool>,
    },
    Clear {
        reply: oneshot::Sender<()>,
    },
    AddOneMinute {
        reply: oneshot::Sender<RunInfo>,
    },
    AlarmFired {
        run: RunInfo,
    },
    /// An action picked on the expiry notification of `for_run`
    Notification {
        action: NotificationAction,
        for_run: u64,
        reply: oneshot::Sender<bool>,
    },
}

async fn request<T>(
    commands: &mpsc::Sender<Command>,
    build: impl FnOnce(oneshot::Sender<T>) -> Command,
) -> Result<T, EngineError> {
    let (reply, response) = oneshot::channel();
    commands
        .send(build(reply))
        .await
        .map_err(|_| EngineError::Closed)?;
    response.await.map_err(|_| EngineError::Closed)
}

async fn answer_notification(
    commands: &mpsc::Sender<Command>,
    action: NotificationAction,
    for_run: u64,
) -> Result<(), EngineError> {
    let applied = request(commands, |reply| Command::Notification {
        action,
        for_run,
        reply,
    })
    .await?;
    if applied {
        Ok(())
    } else {
        Err(EngineError::Superseded { run_id: for_run })
    }
}

/// Cloneable client of the countdown task
#[derive(Debug, Clone)]
pub struct EngineHandle {
    commands: mpsc::Sender<Command>,
    snapshots: watch::Receiver<TimerSnapshot>,
    events: broadcast::Sender<TimerEvent>,
}

impl EngineHandle {
    /// Current display state
    pub fn snapshot(&self) -> TimerSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Receiver that observes every published snapshot
    pub fn subscribe_snapshots(&self) -> watch::Receiver<TimerSnapshot> {
        self.snapshots.clone()
    }

    /// Receiver of transition events (start, tick, pause, expiry...)
    pub fn subscribe_events(&self) -> broadcast::Receiver<TimerEvent> {
        self.events.subscribe()
    }

    /// Handle that does not keep the countdown task alive
    pub fn downgrade(&self) -> WeakEngineHandle {
        WeakEngineHandle {
            commands: self.commands.downgrade(),
        }
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, EngineError> {
        request(&self.commands, build).await
    }

    /// Set a duration field from raw input
    pub async fn set_field(&self, field: TimeField, input: FieldInput) -> Result<u64, EngineError> {
        self.request(|reply| Command::SetField { field, input, reply })
            .await?
            .ok_or(EngineError::Running)
    }

    /// Step a duration field up or down, clamped to its range
    pub async fn step_field(&self, field: TimeField, delta: i64) -> Result<u64, EngineError> {
        self.request(|reply| Command::StepField { field, delta, reply })
            .await?
            .ok_or(EngineError::Running)
    }

    /// Start or pause; returns the new `started` flag
    pub async fn toggle_start_pause(&self) -> Result<bool, EngineError> {
        self.request(|reply| Command::Toggle { reply }).await
    }

    /// Cancel any countdown and zero all fields
    pub async fn clear(&self) -> Result<(), EngineError> {
        self.request(|reply| Command::Clear { reply }).await
    }

    /// The "stop" notification action
    pub async fn stop(&self) -> Result<(), EngineError> {
        self.clear().await
    }

    /// The "add one minute" notification action
    pub async fn add_one_minute(&self) -> Result<RunInfo, EngineError> {
        self.request(|reply| Command::AddOneMinute { reply }).await
    }

    /// Apply a notification action picked for run `for_run`.
    ///
    /// Fails with [`EngineError::Superseded`] once a newer run has started.
    pub async fn answer_notification(
        &self,
        action: NotificationAction,
        for_run: u64,
    ) -> Result<(), EngineError> {
        answer_notification(&self.commands, action, for_run).await
    }

    /// Report that the alarm for `run` went off
    pub async fn alarm_fired(&self, run: RunInfo) -> Result<(), EngineError> {
        self.downgrade().alarm_fired(run).await
    }
}

/// Command-only handle held by the alarm and the notification task
#[derive(Debug, Clone)]
pub struct WeakEngineHandle {
    commands: mpsc::WeakSender<Command>,
}

impl WeakEngineHandle {
    fn commands(&self) -> Result<mpsc::Sender<Command>, EngineError> {
        self.commands.upgrade().ok_or(EngineError::Closed)
    }

    /// Report that the alarm for `run` went off
    pub async fn alarm_fired(&self, run: RunInfo) -> Result<(), EngineError> {
        self.commands()?
            .send(Command::AlarmFired { run })
            .await
            .map_err(|_| EngineError::Closed)
    }

    /// See [`EngineHandle::answer_notification`]
    pub async fn answer_notification(
        &self,
        action: NotificationAction,
        for_run: u64,
    ) -> Result<(), EngineError> {
        answer_notification(&self.commands()?, action, for_run).await
    }
}

/// Spawn the countdown task for `engine`.
///
/// `make_alarm` receives a weak handle so the alarm can report back into the
/// same command queue.
pub fn spawn_countdown<F>(engine: CountdownEngine, make_alarm: F) -> EngineHandle
where
    F: FnOnce(WeakEngineHandle) -> Box<dyn AlarmScheduler>,
{
    let (commands_tx, commands_rx) = mpsc::channel(COMMAND_QUEUE_DEPTH);
    let (snapshot_tx, snapshot_rx) = watch::channel(engine.snapshot());
    let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

    let handle = EngineHandle {
        commands: commands_tx,
        snapshots: snapshot_rx,
        events: events_tx.clone(),
    };

    let task = CountdownTask {
        engine,
        commands: commands_rx,
        snapshots: snapshot_tx,
        events: events_tx,
        alarm: make_alarm(handle.downgrade()),
        interval: None,
        run_started: None,
    };
    tokio::spawn(task.run());

    handle
}

struct CountdownTask {
    engine: CountdownEngine,
    commands: mpsc::Receiver<Command>,
    snapshots: watch::Sender<TimerSnapshot>,
    events: broadcast::Sender<TimerEvent>,
    alarm: Box<dyn AlarmScheduler>,
    interval: Option<Interval>,
    run_started: Option<Instant>,
}

impl CountdownTask {
    async fn run(mut self) {
        info!("Starting countdown task");

        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => self.handle(command),
                    None => {
                        info!("All engine handles dropped, stopping countdown task");
                        break;
                    }
                },
                _ = next_tick(&mut self.interval) => self.on_tick(),
            }
        }

        self.alarm.cancel();
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::SetField { field, input, reply } => {
                let value = self.engine.set_field(field, &input);
                if let Some(value) = value {
                    debug!("Set {} to {}", field, value);
                }
                self.publish();
                let _ = reply.send(value);
            }
            Command::StepField { field, delta, reply } => {
                let value = self.engine.step_field(field, delta);
                self.publish();
                let _ = reply.send(value);
            }
            Command::Toggle { reply } => {
                let toggle = self.engine.toggle_start_pause(Utc::now());
                match toggle {
                    Toggle::Started(run) => self.begin(run),
                    Toggle::Paused { run_id, remaining_ms } => {
                        self.halt();
                        self.emit(TimerEvent::Paused { run_id, remaining_ms });
                    }
                }
                self.publish();
                let _ = reply.send(toggle.started());
            }
            Command::Clear { reply } => {
                self.clear();
                self.publish();
                let _ = reply.send(());
            }
            Command::AddOneMinute { reply } => {
                let run = self.add_one_minute();
                self.publish();
                let _ = reply.send(run);
            }
            Command::Notification { action, for_run, reply } => {
                let applied = self.engine.is_latest_run(for_run);
                if applied {
                    match action {
                        NotificationAction::Stop => self.clear(),
                        NotificationAction::AddOneMinute => {
                            self.add_one_minute();
                        }
                    }
                    self.publish();
                } else {
                    info!("Ignoring {} from run {}, a newer run has started", action.key(), for_run);
                }
                let _ = reply.send(applied);
            }
            Command::AlarmFired { run } => {
                if let Some(expiry) = self.engine.finish_run(run, Utc::now()) {
                    info!("Alarm finished run {} ahead of the final tick", run.run_id);
                    self.expire(expiry);
                    self.publish();
                }
            }
        }
    }

    fn clear(&mut self) {
        self.halt();
        if self.engine.clear() {
            info!("Timer cleared");
            self.emit(TimerEvent::Cleared);
        }
    }

    fn add_one_minute(&mut self) -> RunInfo {
        let extension = self.engine.add_one_minute(Utc::now());
        match extension {
            Extension::Started(run) => self.begin(run),
            Extension::Extended(run) => {
                self.schedule_alarm(run);
                self.emit(TimerEvent::Extended {
                    run_id: run.run_id,
                    total_ms: run.total_ms,
                    deadline: run.deadline,
                });
            }
        }
        extension.run()
    }

    fn on_tick(&mut self) {
        match self.engine.advance(Utc::now()) {
            Some(Progress::Tick { run_id, remaining_ms }) => {
                self.emit(TimerEvent::Tick { run_id, remaining_ms });
            }
            Some(Progress::Finished(expiry)) => self.expire(expiry),
            None => {
                debug!("Tick without an active run, dropping interval");
                self.halt();
            }
        }
        self.publish();
    }

    fn begin(&mut self, run: RunInfo) {
        // A fresh interval completes its first tick immediately.
        let interval_start = Instant::now();
        let mut interval = tokio::time::interval_at(
            interval_start,
            Duration::from_millis(TICK_INTERVAL_MS),
        );
        interval.set_missed_tick_behavior(MissedTickBehavior::Burst);
        self.interval = Some(interval);
        self.run_started = Some(interval_start);

        self.schedule_alarm(run);
        self.emit(TimerEvent::Started {
            run_id: run.run_id,
            total_ms: run.total_ms,
            deadline: run.deadline,
        });
    }

    fn schedule_alarm(&mut self, run: RunInfo) {
        if let Some(started) = self.run_started {
            self.alarm.schedule(AlarmRequest {
                run,
                fire_at: started + Duration::from_millis(run.total_ms),
            });
        }
    }

    /// Stop tick delivery and cancel the alarm
    fn halt(&mut self) {
        self.interval = None;
        self.run_started = None;
        self.alarm.cancel();
    }

    fn expire(&mut self, expiry: Expiry) {
        self.halt();
        info!("Countdown run {} expired", expiry.run_id);
        self.emit(TimerEvent::Expired {
            run_id: expiry.run_id,
            total_ms: expiry.total_ms,
            at: expiry.at,
        });
    }

    fn emit(&self, event: TimerEvent) {
        if let Err(e) = self.events.send(event) {
            debug!("No event subscribers: {}", e);
        }
    }

    fn publish(&self) {
        let next = self.engine.snapshot();
        self.snapshots.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }
}

async fn next_tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}
