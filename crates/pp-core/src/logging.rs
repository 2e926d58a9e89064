//! Tracing subscriber setup for embedding binaries and tests.
//!
//! Library code only emits `tracing` events; installing a subscriber is left
//! to the host. This helper installs a `fmt` layer on stderr filtered by
//! `PP_LOG`, then `RUST_LOG`, then `info`.

use std::str::FromStr;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

const ENV_LOG: &str = "PP_LOG";
const DEFAULT_DIRECTIVE: &str = "info";

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid log filter '{directive}': {message}")]
    InvalidFilter { directive: String, message: String },

    #[error("a global tracing subscriber is already installed")]
    AlreadyInitialized,
}

/// Output format for log events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "pretty" | "human" => Ok(Self::Text),
            "json" | "jsonl" => Ok(Self::Json),
            other => Err(format!("unknown log format '{other}' (expected text or json)")),
        }
    }
}

/// Pick the filter directive: explicit, then `PP_LOG`, then `RUST_LOG`.
fn filter_directive(explicit: Option<&str>) -> String {
    explicit
        .map(str::to_string)
        .or_else(|| std::env::var(ENV_LOG).ok())
        .or_else(|| std::env::var("RUST_LOG").ok())
        .filter(|d| !d.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_DIRECTIVE.to_string())
}

fn build_filter(directive: &str) -> Result<EnvFilter, LoggingError> {
    EnvFilter::try_new(directive).map_err(|e| LoggingError::InvalidFilter {
        directive: directive.to_string(),
        message: e.to_string(),
    })
}

/// Install the global subscriber.
pub fn init_logging(format: LogFormat, filter: Option<&str>) -> Result<(), LoggingError> {
    let directive = filter_directive(filter);
    let env_filter = build_filter(&directive)?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(true);

    let installed = match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    installed.map_err(|_| LoggingError::AlreadyInitialized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_parse() {
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("text".parse::<LogFormat>().unwrap(), LogFormat::Text);
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_explicit_directive_wins() {
        assert_eq!(filter_directive(Some("pp_core=debug")), "pp_core=debug");
    }

    #[test]
    fn test_bad_directive_rejected() {
        assert!(matches!(
            build_filter("pp_core=notalevel"),
            Err(LoggingError::InvalidFilter { .. })
        ));
        assert!(build_filter("warn,pp_core=trace").is_ok());
    }
}
