//! Expiry notification background task

use std::sync::Arc;

use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{error, info, warn};

use crate::{
    services::notifier::Notifier,
    state::{engine::Expiry, TimerEvent},
    tasks::countdown::{EngineError, WeakEngineHandle},
};

/// Background task that notifies the user once per expired run and routes
/// the chosen notification action back to the engine for that run
pub async fn notification_task(
    mut events: broadcast::Receiver<TimerEvent>,
    notifier: Arc<dyn Notifier>,
    engine: WeakEngineHandle,
) {
    info!("Starting notification task");

    loop {
        match events.recv().await {
            Ok(TimerEvent::Expired { run_id, total_ms, at }) => {
                let expiry = Expiry { run_id, total_ms, at };
                let notifier = Arc::clone(&notifier);
                let engine = engine.clone();
                // Actionable notifications block until dismissed.
                tokio::spawn(async move {
                    let action = match notifier.notify_expired(&expiry).await {
                        Ok(Some(action)) => action,
                        Ok(None) => return,
                        Err(e) => {
                            error!("Failed to notify expiry of run {}: {}", run_id, e);
                            return;
                        }
                    };
                    info!("Notification action {} for run {}", action.key(), run_id);
                    match engine.answer_notification(action, run_id).await {
                        Ok(()) => {}
                        Err(e @ EngineError::Superseded { .. }) => info!("Dropped {}: {}", action.key(), e),
                        Err(e) => error!("Failed to apply notification action {}: {}", action.key(), e),
                    }
                });
            }
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => {
                warn!("Notification task lagged, skipped {} events", skipped);
            }
            Err(RecvError::Closed) => {
                info!("Event channel closed, stopping notification task");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Mutex, time::Duration};

    use async_trait::async_trait;

    use super::*;
    use crate::{
        services::{alarm::NoAlarm, notifier::NotificationAction},
        state::{engine::CountdownEngine, FieldInput, TimeField, TimerDuration},
        tasks::countdown::{spawn_countdown, EngineHandle},
    };

    /// Records expiries and answers with a fixed action after `delay`
    struct FakeNotifier {
        calls: Mutex<Vec<u64>>,
        action: Option<NotificationAction>,
        delay: Duration,
    }

    impl FakeNotifier {
        fn new(action: Option<NotificationAction>) -> Arc<Self> {
            Self::answering_after(action, Duration::ZERO)
        }

        fn answering_after(action: Option<NotificationAction>, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
                action,
                delay,
            })
        }

        fn calls(&self) -> Vec<u64> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Notifier for FakeNotifier {
        async fn notify_expired(&self, expiry: &Expiry) -> Result<Option<NotificationAction>, String> {
            self.calls.lock().unwrap().push(expiry.run_id);
            tokio::time::sleep(self.delay).await;
            Ok(self.action)
        }
    }

    fn spawn_with(notifier: Arc<FakeNotifier>) -> EngineHandle {
        let engine = spawn_countdown(CountdownEngine::new(), |_| Box::new(NoAlarm));
        tokio::spawn(notification_task(
            engine.subscribe_events(),
            notifier,
            engine.downgrade(),
        ));
        engine
    }

    async fn start_seconds(engine: &EngineHandle, seconds: i64) {
        engine.set_field(TimeField::Seconds, FieldInput::Number(seconds)).await.unwrap();
        assert!(engine.toggle_start_pause().await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_notification_per_run() {
        let notifier = FakeNotifier::new(None);
        let engine = spawn_with(notifier.clone());

        start_seconds(&engine, 2).await;
        tokio::time::sleep(Duration::from_secs(5)).await;
        start_seconds(&engine, 1).await;
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(notifier.calls(), vec![1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_paused_run_is_not_notified() {
        let notifier = FakeNotifier::new(None);
        let engine = spawn_with(notifier.clone());

        start_seconds(&engine, 2).await;
        engine.toggle_start_pause().await.unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert!(notifier.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_add_minute_action_restarts() {
        let notifier = FakeNotifier::new(Some(NotificationAction::AddOneMinute));
        let engine = spawn_with(notifier.clone());

        start_seconds(&engine, 1).await;
        tokio::time::sleep(Duration::from_millis(1500)).await;

        let snapshot = engine.snapshot();
        assert!(snapshot.started);
        assert_eq!(notifier.calls(), vec![1]);
        assert_eq!(snapshot.duration(), TimerDuration::new(0, 1, 0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_action_for_latest_run_clears() {
        let notifier = FakeNotifier::answering_after(Some(NotificationAction::Stop), Duration::from_secs(20));
        let engine = spawn_with(notifier.clone());

        start_seconds(&engine, 1).await;
        tokio::time::sleep(Duration::from_secs(2)).await;
        // Editing after expiry does not start a new run.
        engine.set_field(TimeField::Minutes, FieldInput::Number(10)).await.unwrap();
        tokio::time::sleep(Duration::from_secs(30)).await;

        assert_eq!(notifier.calls(), vec![1]);
        assert!(engine.snapshot().duration().is_zero());
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_stop_leaves_newer_run_alone() {
        let notifier = FakeNotifier::answering_after(Some(NotificationAction::Stop), Duration::from_secs(20));
        let engine = spawn_with(notifier.clone());

        start_seconds(&engine, 1).await;
        tokio::time::sleep(Duration::from_secs(2)).await;
        engine.set_field(TimeField::Minutes, FieldInput::Number(10)).await.unwrap();
        assert!(engine.toggle_start_pause().await.unwrap());
        tokio::time::sleep(Duration::from_secs(30)).await;

        let snapshot = engine.snapshot();
        assert_eq!(notifier.calls(), vec![1]);
        assert!(snapshot.started, "stop from run 1 cleared run 2");
        assert_eq!(snapshot.minutes, 9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_add_minute_does_not_extend_newer_run() {
        let notifier =
            FakeNotifier::answering_after(Some(NotificationAction::AddOneMinute), Duration::from_secs(20));
        let engine = spawn_with(notifier.clone());
        let mut events = engine.subscribe_events();

        start_seconds(&engine, 1).await;
        tokio::time::sleep(Duration::from_secs(2)).await;
        start_seconds(&engine, 50).await;
        tokio::time::sleep(Duration::from_secs(30)).await;

        let mut extended = false;
        while let Ok(event) = events.try_recv() {
            extended |= matches!(event, TimerEvent::Extended { .. });
        }
        assert!(!extended);
        assert!(engine.snapshot().started);
    }
}
