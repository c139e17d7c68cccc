//! Runtime configuration loaded from environment variables.

use std::str::FromStr;

use serde::Serialize;

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Plain,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "plain" | "text" | "pretty" => Ok(LogFormat::Plain),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format: {other}")),
        }
    }
}

/// Runtime configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `CQRS_ALLOW_HANDLER_OVERRIDE`: replace handlers on re-registration (default: `false`)
/// - `CQRS_LOG_DISPATCH`: install the logging middleware on both buses (default: `true`)
/// - `CQRS_METRICS_ENABLED`: install the Prometheus recorder and metrics middleware (default: `false`)
/// - `CQRS_LOG_FORMAT`: `plain` or `json` (default: `plain`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
///
/// Unparseable values fall back to the default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Config {
    pub allow_handler_override: bool,
    pub log_dispatch: bool,
    pub metrics_enabled: bool,
    pub log_format: LogFormat,
    pub log_filter: String,
}

impl Config {
    /// Loads configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through `lookup`, which maps a variable name to
    /// its value.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let flag = |key: &str, default: bool| {
            lookup(key)
                .and_then(|v| parse_bool(&v))
                .unwrap_or(default)
        };

        Self {
            allow_handler_override: flag(
                "CQRS_ALLOW_HANDLER_OVERRIDE",
                defaults.allow_handler_override,
            ),
            log_dispatch: flag("CQRS_LOG_DISPATCH", defaults.log_dispatch),
            metrics_enabled: flag("CQRS_METRICS_ENABLED", defaults.metrics_enabled),
            log_format: lookup("CQRS_LOG_FORMAT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.log_format),
            log_filter: lookup("RUST_LOG")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(defaults.log_filter),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            allow_handler_override: false,
            log_dispatch: true,
            metrics_enabled: false,
            log_format: LogFormat::Plain,
            log_filter: "info".to_string(),
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
