//! Configuration and CLI argument handling

use clap::Parser;

use crate::state::CountdownEngine;

/// CLI argument parsing structure
#[derive(Parser, Debug)]
#[command(name = "count-down")]
#[command(about = "A single countdown timer with a local HTTP control surface")]
#[command(version)]
pub struct Config {
    /// Port to bind the server to
    #[arg(short, long, default_value = "20554")]
    pub port: u16,

    /// Host address to bind to
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Initial hours (clamped to 0-23)
    #[arg(long, default_value = "0", allow_negative_numbers = true)]
    pub hours: i64,

    /// Initial minutes (clamped to 0-60)
    #[arg(short, long, default_value = "0", allow_negative_numbers = true)]
    pub minutes: i64,

    /// Initial seconds (clamped to 0-60)
    #[arg(short, long, default_value = "0", allow_negative_numbers = true)]
    pub seconds: i64,

    /// Start counting down as soon as the server is up
    #[arg(long)]
    pub start: bool,

    /// Do not schedule the backup deadline alarm
    #[arg(long)]
    pub no_alarm: bool,

    /// Offer "Stop" and "+1 min" buttons on the notification
    #[arg(long)]
    pub notify_actions: bool,

    /// Log expiries instead of showing desktop notifications
    #[arg(long)]
    pub log_only: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Config {
    /// Parse configuration from command line arguments
    pub fn parse() -> Self {
        Parser::parse()
    }

    /// Get the server address as a formatted string
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Get the appropriate log level based on verbose flag
    pub fn log_level(&self) -> &'static str {
        if self.verbose { "debug" } else { "info" }
    }

    /// Build an idle engine holding the preset duration
    pub fn initial_engine(&self) -> CountdownEngine {
        let mut engine = CountdownEngine::new();
        engine.set_hours(self.hours);
        engine.set_minutes(self.minutes);
        engine.set_seconds(self.seconds);
        engine
    }
}
