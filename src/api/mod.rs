//! HTTP API module
//!
//! This module contains all HTTP endpoint handlers and response structures.

pub mod handlers;
pub mod responses;

use std::sync::Arc;
use axum::{
    routing::{get, post, put},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;
use handlers::*;

/// Create the HTTP router with all endpoints
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/duration/:field", put(set_field_handler))
        .route("/duration/:field/up", post(field_up_handler))
        .route("/duration/:field/down", post(field_down_handler))
        .route("/toggle", post(toggle_handler))
        .route("/clear", post(clear_handler))
        .route("/notification/stop", post(notification_stop_handler))
        .route("/notification/add-minute", post(notification_add_minute_handler))
        .route("/status", get(status_handler))
        .route("/events", get(events_handler))
        .route("/health", get(health_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{to_bytes, Body},
        http::{Method, Request, StatusCode},
    };
    use futures::StreamExt;
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;
    use crate::{
        services::NoAlarm,
        state::{CountdownEngine, FieldInput, TimeField},
        tasks::{spawn_countdown, EngineHandle},
    };

    fn app_with_engine() -> (Router, EngineHandle) {
        let engine = spawn_countdown(CountdownEngine::new(), |_| Box::new(NoAlarm));
        let state = Arc::new(AppState::new(engine.clone(), 20554, "127.0.0.1".to_string()));
        (create_router(state), engine)
    }

    fn app() -> Router {
        app_with_engine().0
    }

    async fn call(app: &Router, method: Method, uri: &str, body: Option<&str>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = call(&app(), Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_set_field_clamps_and_parses_text() {
        let app = app();
        let (status, body) = call(&app, Method::PUT, "/duration/hours", Some(r#"{"value": 99}"#)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["value"], 23);

        let (_, body) = call(&app, Method::PUT, "/duration/seconds", Some(r#"{"value": "1x"}"#)).await;
        assert_eq!(body["value"], 0);

        let (_, body) = call(&app, Method::PUT, "/duration/minutes", Some(r#"{"value": "45"}"#)).await;
        assert_eq!(body["timer"]["hours"], 23);
        assert_eq!(body["timer"]["minutes"], 45);
    }

    #[tokio::test]
    async fn test_unknown_field_is_not_found() {
        let (status, _) = call(&app(), Method::POST, "/duration/days/up", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_step_stops_at_bounds() {
        let app = app();
        let (_, body) = call(&app, Method::POST, "/duration/minutes/down", None).await;
        assert_eq!(body["value"], 0);
        call(&app, Method::PUT, "/duration/minutes", Some(r#"{"value": 60}"#)).await;
        let (_, body) = call(&app, Method::POST, "/duration/minutes/up", None).await;
        assert_eq!(body["value"], 60);
    }

    #[tokio::test]
    async fn test_toggle_and_edit_conflict() {
        let app = app();
        call(&app, Method::PUT, "/duration/minutes", Some(r#"{"value": 1}"#)).await;

        let (status, body) = call(&app, Method::POST, "/toggle", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["started"], true);
        assert_eq!(body["timer"]["state"], "running");

        let (status, _) = call(&app, Method::PUT, "/duration/seconds", Some(r#"{"value": 5}"#)).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (_, body) = call(&app, Method::POST, "/toggle", None).await;
        assert_eq!(body["started"], false);
        assert_eq!(body["timer"]["state"], "paused");
    }

    #[tokio::test]
    async fn test_clear_and_status() {
        let app = app();
        call(&app, Method::PUT, "/duration/seconds", Some(r#"{"value": 30}"#)).await;
        call(&app, Method::POST, "/toggle", None).await;

        let (status, body) = call(&app, Method::POST, "/clear", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "stopped");
        assert_eq!(body["timer"]["seconds"], 0);

        let (_, body) = call(&app, Method::GET, "/status", None).await;
        assert_eq!(body["last_action"], "clear");
        assert_eq!(body["timer"]["started"], false);
    }

    #[tokio::test]
    async fn test_notification_actions() {
        let app = app();
        let (_, body) = call(&app, Method::POST, "/notification/add-minute", None).await;
        assert_eq!(body["status"], "running");

        let (_, body) = call(&app, Method::POST, "/notification/stop", None).await;
        assert_eq!(body["status"], "stopped");
        assert_eq!(body["timer"]["minutes"], 0);
    }

    #[tokio::test]
    async fn test_notification_action_for_older_run_conflicts() {
        let app = app();
        let (_, body) = call(&app, Method::POST, "/notification/add-minute", None).await;
        assert_eq!(body["status"], "running");

        let (status, _) = call(&app, Method::POST, "/notification/stop?run_id=0", None).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, body) = call(&app, Method::POST, "/notification/stop?run_id=1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "stopped");
    }

    #[tokio::test]
    async fn test_events_stream_starts_with_current_snapshot() {
        let (app, engine) = app_with_engine();
        engine.set_field(TimeField::Seconds, FieldInput::Number(45)).await.unwrap();

        let request = Request::builder().uri("/events").body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["content-type"], "text/event-stream");

        let mut frames = response.into_body().into_data_stream();
        let frame = frames.next().await.unwrap().unwrap();
        let frame = String::from_utf8(frame.to_vec()).unwrap();
        assert!(frame.starts_with("event: snapshot\n"), "frame: {:?}", frame);

        let data = frame
            .lines()
            .find_map(|line| line.strip_prefix("data: "))
            .unwrap();
        let snapshot: Value = serde_json::from_str(data).unwrap();
        assert_eq!(snapshot, serde_json::to_value(engine.snapshot()).unwrap());
        assert_eq!(snapshot["seconds"], 45);
    }
}
