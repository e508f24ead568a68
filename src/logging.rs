//! Structured logging setup.
//!
//! Logs always go to stderr because stdout carries the MCP protocol.
//! `RUST_LOG` selects the filter (default `organizer_store=info`) and
//! `RUST_LOG_FORMAT=json` switches to JSON lines.

use clap::ValueEnum;
use tracing_subscriber::EnvFilter;

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    /// Format requested through `RUST_LOG_FORMAT`, text when unset.
    pub fn from_env() -> Self {
        let is_json = std::env::var("RUST_LOG_FORMAT")
            .map(|v| v.eq_ignore_ascii_case("json"))
            .unwrap_or(false);
        if is_json { Self::Json } else { Self::Text }
    }
}

/// Install the global subscriber. Later calls are no-ops.
pub fn init(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("organizer_store=info"));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_file(false)
        .with_line_number(false);

    match format {
        LogFormat::Json => {
            let _ = subscriber.json().try_init();
        }
        LogFormat::Text => {
            let _ = subscriber.try_init();
        }
    }
}
