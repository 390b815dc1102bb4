//! Tracing subscriber setup.
//!
//! Library code only emits `tracing` events; binaries call [`init_tracing`]
//! once at startup. The filter comes from `RUST_LOG` and falls back to the
//! given default directive.

use serde::{Deserialize, Serialize};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Default filter directive when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "info";

/// Output format of log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Plain,
    /// One JSON object per line.
    Json,
}

/// Builds the filter from `RUST_LOG`, or from `default` when unset or invalid.
#[must_use]
pub fn env_filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

/// Installs the global subscriber.
///
/// Returns false if a subscriber was already installed.
pub fn init_tracing(format: LogFormat, default_filter: &str) -> bool {
    let registry = tracing_subscriber::registry().with(env_filter(default_filter));
    let installed = match format {
        LogFormat::Plain => registry.with(fmt::layer().with_target(false)).try_init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_current_span(true))
            .try_init(),
    };
    installed.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_names() {
        assert_eq!(serde_json::to_value(LogFormat::Json).unwrap(), "json");
        assert_eq!(LogFormat::default(), LogFormat::Plain);
    }

    #[test]
    fn test_second_install_is_refused() {
        init_tracing(LogFormat::Plain, DEFAULT_FILTER);
        assert!(!init_tracing(LogFormat::Json, DEFAULT_FILTER));
    }
}
