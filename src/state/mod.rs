//! State management module
//!
//! This module contains the countdown state machine, its value types and the
//! shared application state.

pub mod duration;
pub mod engine;
pub mod timer_state;
pub mod app_state;

// Re-export main types
pub use duration::{FieldInput, RemainingTime, TimeField, TimerDuration};
pub use engine::CountdownEngine;
pub use timer_state::{TimerEvent, TimerSnapshot, TimerState};
pub use app_state::AppState;
