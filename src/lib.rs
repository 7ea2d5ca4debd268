//! Count Down - a single countdown timer daemon
//!
//! The countdown state machine runs as one serialized background task. A local
//! HTTP API edits the duration, starts and pauses the countdown and streams
//! every change; a desktop notification announces expiry.

pub mod config;
pub mod state;
pub mod api;
pub mod services;
pub mod tasks;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use state::{AppState, CountdownEngine};
pub use api::create_router;
pub use tasks::{spawn_countdown, EngineHandle};
pub use utils::signals::shutdown_signal;
