//! Logging setup.
//!
//! Structured logging for the migration runner and the HTTP routes,
//! controlled by environment variables.
//!
//! # Environment Variables
//!
//! - `STRATA_DEBUG=true|1|yes` - Enable debug logging
//! - `STRATA_LOG_LEVEL=trace|debug|info|warn|error` - Set a specific level
//! - `STRATA_LOG_FORMAT=json|pretty|compact` - Output format (default: json)
//!
//! # Usage
//!
//! ```rust,no_run
//! // Call once at startup, before running migrations.
//! strata::logging::init();
//! ```
//!
//! Inside the workspace, use the `tracing` macros with structured fields:
//!
//! ```rust,ignore
//! info!(version = unit.version(), name = %unit.name(), "Applied migration");
//! error!(user_id = %user, request_id = %id, error = %e, "Failed to list joined rooms");
//! ```

use std::env;
use std::sync::Once;

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

static INIT: Once = Once::new();

const TARGETS: &[&str] = &["strata", "strata_migrate", "strata_postgres", "strata_axum"];

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// One JSON object per line.
    #[default]
    Json,
    /// Multi-line, human-readable.
    Pretty,
    /// Single-line, human-readable.
    Compact,
}

impl LogFormat {
    fn parse(value: &str) -> Self {
        match value.to_lowercase().as_str() {
            "pretty" => Self::Pretty,
            "compact" => Self::Compact,
            _ => Self::Json,
        }
    }

    /// Name of the format.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Pretty => "pretty",
            Self::Compact => "compact",
        }
    }
}

fn parse_debug(value: Option<&str>) -> bool {
    value.is_some_and(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
}

fn parse_level(level: Option<&str>, debug: bool) -> &'static str {
    let fallback = if debug { "debug" } else { "warn" };
    match level.map(str::to_lowercase).as_deref() {
        Some("trace") => "trace",
        Some("debug") => "debug",
        Some("info") => "info",
        Some("warn") => "warn",
        Some("error") => "error",
        _ => fallback,
    }
}

fn filter_directives(level: &str) -> String {
    TARGETS
        .iter()
        .map(|target| format!("{}={}", target, level))
        .collect::<Vec<_>>()
        .join(",")
}

/// Whether `STRATA_DEBUG` enables debug logging.
pub fn is_debug_enabled() -> bool {
    parse_debug(env::var("STRATA_DEBUG").ok().as_deref())
}

/// The level from `STRATA_LOG_LEVEL`.
///
/// Defaults to "debug" if `STRATA_DEBUG` is enabled, otherwise "warn".
pub fn get_log_level() -> &'static str {
    parse_level(env::var("STRATA_LOG_LEVEL").ok().as_deref(), is_debug_enabled())
}

/// The format from `STRATA_LOG_FORMAT`.
pub fn get_log_format() -> LogFormat {
    env::var("STRATA_LOG_FORMAT")
        .map(|f| LogFormat::parse(&f))
        .unwrap_or_default()
}

/// Initialize logging from the environment.
///
/// Does nothing unless `STRATA_DEBUG` or `STRATA_LOG_LEVEL` is set.
/// Only the first call in a process has any effect.
pub fn init() {
    if !is_debug_enabled() && env::var("STRATA_LOG_LEVEL").is_err() {
        return;
    }
    init_with(get_log_level(), get_log_format());
}

/// Initialize logging with an explicit level and format.
///
/// Only the first call in a process has any effect.
pub fn init_with(level: &str, format: LogFormat) {
    INIT.call_once(|| {
        let filter = EnvFilter::try_new(filter_directives(level))
            .unwrap_or_else(|_| EnvFilter::new("warn"));

        let registry = tracing_subscriber::registry().with(filter);
        let installed = match format {
            LogFormat::Json => registry.with(fmt::layer().json()).try_init(),
            LogFormat::Pretty => registry.with(fmt::layer().pretty()).try_init(),
            LogFormat::Compact => registry.with(fmt::layer().compact()).try_init(),
        };

        if installed.is_ok() {
            tracing::info!(level, format = format.as_str(), "Strata logging initialized");
        }
    });
}
