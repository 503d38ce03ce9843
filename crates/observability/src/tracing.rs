//! Tracing/logging initialization.

use core::str::FromStr;

use serde::Deserialize;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "info,sqlx=warn";

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per event, for log shippers.
    #[default]
    Json,
    /// Human-readable, for terminals.
    Pretty,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TracingError {
    #[error("unknown log format '{0}' (expected json or pretty)")]
    UnknownFormat(String),
}

impl FromStr for LogFormat {
    type Err = TracingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "pretty" | "text" => Ok(LogFormat::Pretty),
            other => Err(TracingError::UnknownFormat(other.to_string())),
        }
    }
}

/// Filter from `RUST_LOG`, falling back to `fallback`.
pub fn env_filter(fallback: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback))
}

/// JSON logs + timestamps, configurable via RUST_LOG.
pub fn init() {
    init_with(LogFormat::Json, DEFAULT_FILTER);
}

/// Install the global subscriber, writing to stderr. Returns `false` if one
/// was already set.
pub fn init_with(format: LogFormat, fallback_filter: &str) -> bool {
    let filter = env_filter(fallback_filter);
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_timer(tracing_subscriber::fmt::time::SystemTime);

    match format {
        LogFormat::Json => builder
            .json()
            .with_current_span(true)
            .with_target(false)
            .try_init()
            .is_ok(),
        LogFormat::Pretty => builder.with_target(true).try_init().is_ok(),
    }
}
