//! HTTP endpoint handlers

use std::{convert::Infallible, sync::Arc};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        Json,
    },
};
use futures::stream::{self, Stream};
use tracing::{error, info, warn};

use crate::{
    services::NotificationAction,
    state::{AppState, TimeField},
    tasks::countdown::EngineError,
};
use super::responses::{
    ApiResponse, FieldResponse, HealthResponse, NotificationQuery, SetFieldRequest, StatusResponse,
    ToggleResponse,
};

/// Map an engine failure onto an HTTP status
fn engine_status(action: &str, e: EngineError) -> StatusCode {
    match e {
        EngineError::Running | EngineError::Superseded { .. } => {
            warn!("Rejected {}: {}", action, e);
            StatusCode::CONFLICT
        }
        EngineError::Closed => {
            error!("Failed to {}: {}", action, e);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn parse_field(name: &str) -> Result<TimeField, StatusCode> {
    TimeField::from_name(name).ok_or_else(|| {
        warn!("Unknown duration field: {}", name);
        StatusCode::NOT_FOUND
    })
}

/// Handle PUT /duration/:field - Set a duration field
pub async fn set_field_handler(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Json(request): Json<SetFieldRequest>,
) -> Result<Json<FieldResponse>, StatusCode> {
    let field = parse_field(&name)?;
    let value = state
        .engine
        .set_field(field, request.value)
        .await
        .map_err(|e| engine_status("set field", e))?;

    state.record_action(&format!("set-{}", field));
    Ok(Json(FieldResponse {
        field: field.to_string(),
        value,
        timer: state.engine.snapshot(),
    }))
}

async fn step_field(
    state: Arc<AppState>,
    name: &str,
    delta: i64,
) -> Result<Json<FieldResponse>, StatusCode> {
    let field = parse_field(name)?;
    let value = state
        .engine
        .step_field(field, delta)
        .await
        .map_err(|e| engine_status("step field", e))?;

    let direction = if delta > 0 { "up" } else { "down" };
    state.record_action(&format!("{}-{}", field, direction));
    Ok(Json(FieldResponse {
        field: field.to_string(),
        value,
        timer: state.engine.snapshot(),
    }))
}

/// Handle POST /duration/:field/up - Increment a field, stopping at its maximum
pub async fn field_up_handler(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<FieldResponse>, StatusCode> {
    step_field(state, &name, 1).await
}

/// Handle POST /duration/:field/down - Decrement a field, stopping at its minimum
pub async fn field_down_handler(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<FieldResponse>, StatusCode> {
    step_field(state, &name, -1).await
}

/// Handle POST /toggle - Start or pause the countdown
pub async fn toggle_handler(State(state): State<Arc<AppState>>) -> Result<Json<ToggleResponse>, StatusCode> {
    let started = state
        .engine
        .toggle_start_pause()
        .await
        .map_err(|e| engine_status("toggle timer", e))?;

    info!("Toggle endpoint called - timer {}", if started { "started" } else { "paused" });
    state.record_action(if started { "start" } else { "pause" });
    Ok(Json(ToggleResponse {
        started,
        timer: state.engine.snapshot(),
    }))
}

/// Handle POST /clear - Cancel the countdown and zero the duration
pub async fn clear_handler(State(state): State<Arc<AppState>>) -> Result<Json<ApiResponse>, StatusCode> {
    state
        .engine
        .clear()
        .await
        .map_err(|e| engine_status("clear timer", e))?;

    info!("Clear endpoint called - timer cleared");
    state.record_action("clear");
    Ok(Json(ApiResponse::for_timer(
        "Timer cleared".to_string(),
        state.engine.snapshot(),
    )))
}

async fn notification_action(
    state: Arc<AppState>,
    action: NotificationAction,
    query: NotificationQuery,
) -> Result<(), StatusCode> {
    let result = match query.run_id {
        Some(run_id) => state.engine.answer_notification(action, run_id).await,
        None => match action {
            NotificationAction::Stop => state.engine.stop().await,
            NotificationAction::AddOneMinute => state.engine.add_one_minute().await.map(|_| ()),
        },
    };
    result.map_err(|e| engine_status(action.key(), e))?;

    info!("Notification action {} applied", action.key());
    state.record_action(action.key());
    Ok(())
}

/// Handle POST /notification/stop - The notification's stop action
pub async fn notification_stop_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<NotificationQuery>,
) -> Result<Json<ApiResponse>, StatusCode> {
    notification_action(state.clone(), NotificationAction::Stop, query).await?;
    Ok(Json(ApiResponse::for_timer(
        "Timer stopped".to_string(),
        state.engine.snapshot(),
    )))
}

/// Handle POST /notification/add-minute - The notification's add one minute action
pub async fn notification_add_minute_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<NotificationQuery>,
) -> Result<Json<ApiResponse>, StatusCode> {
    notification_action(state.clone(), NotificationAction::AddOneMinute, query).await?;
    Ok(Json(ApiResponse::for_timer(
        "One minute added".to_string(),
        state.engine.snapshot(),
    )))
}

/// Handle GET /status - Return current timer status
pub async fn status_handler(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let (last_action, last_action_time) = state.get_last_action();

    Json(StatusResponse {
        timer: state.engine.snapshot(),
        uptime: state.get_uptime(),
        port: state.port,
        host: state.host.clone(),
        last_action,
        last_action_time,
    })
}

/// Handle GET /events - Stream every timer snapshot as server-sent events
pub async fn events_handler(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let snapshots = state.engine.subscribe_snapshots();

    // The current snapshot goes out first, then one event per change.
    let stream = stream::unfold((snapshots, true), |(mut snapshots, first)| async move {
        if !first && snapshots.changed().await.is_err() {
            return None;
        }
        let snapshot = snapshots.borrow_and_update().clone();
        let event = Event::default()
            .event("snapshot")
            .json_data(&snapshot)
            .unwrap_or_else(|e| {
                warn!("Failed to encode snapshot event: {}", e);
                Event::default().event("error")
            });
        Some((Ok::<_, Infallible>(event), (snapshots, false)))
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// Handle GET /health - Health check endpoint
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::ok())
}
