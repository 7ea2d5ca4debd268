//! Count Down - a single countdown timer daemon
//!
//! This is the main entry point for the count-down application.

use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

use count_down::{
    api::create_router,
    config::Config,
    services::{AlarmScheduler, DesktopNotifier, LogNotifier, NoAlarm, Notifier, TokioAlarmScheduler},
    state::AppState,
    tasks::{notification_task, spawn_countdown},
    utils::shutdown_signal,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    // Initialize tracing with appropriate log level
    tracing_subscriber::fmt()
        .with_env_filter(format!("count_down={},tower_http=info", config.log_level()))
        .init();

    info!("Starting count-down server v{}", env!("CARGO_PKG_VERSION"));

    let initial = config.initial_engine();
    info!(
        "Configuration: host={}, port={}, duration={}, alarm={}",
        config.host,
        config.port,
        initial.fields(),
        !config.no_alarm
    );

    // Start the countdown task, optionally backed by the deadline alarm
    let no_alarm = config.no_alarm;
    let engine = spawn_countdown(initial, |handle| -> Box<dyn AlarmScheduler> {
        if no_alarm {
            Box::new(NoAlarm)
        } else {
            Box::new(TokioAlarmScheduler::new(handle))
        }
    });

    // Start the expiry notification task
    let notifier: Arc<dyn Notifier> = if config.log_only {
        Arc::new(LogNotifier)
    } else {
        Arc::new(DesktopNotifier::new(config.notify_actions))
    };
    tokio::spawn(notification_task(engine.subscribe_events(), notifier, engine.downgrade()));

    if config.start {
        match engine.toggle_start_pause().await {
            Ok(started) => info!("Countdown started on launch: {}", started),
            Err(e) => error!("Failed to start countdown: {}", e),
        }
    }

    // Create HTTP router with all endpoints
    let state = Arc::new(AppState::new(engine, config.port, config.host.clone()));
    let app = create_router(state);

    // Bind to the specified address
    let addr = config.address();
    let listener = TcpListener::bind(&addr).await?;

    info!("Server running on http://{}", addr);
    info!("Endpoints:");
    info!("  PUT  /duration/:field           - Set hours, minutes or seconds");
    info!("  POST /duration/:field/up|down   - Step a field by one");
    info!("  POST /toggle                    - Start or pause the countdown");
    info!("  POST /clear                     - Cancel and zero the timer");
    info!("  POST /notification/stop         - Stop action");
    info!("  POST /notification/add-minute   - Add one minute action");
    info!("  GET  /status                    - Current timer and server status");
    info!("  GET  /events                    - Server-sent timer snapshots");
    info!("  GET  /health                    - Health check");

    // Setup graceful shutdown
    let server = axum::serve(listener, app);

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                error!("Server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received");
        }
    }

    info!("Server shutdown complete");
    Ok(())
}
