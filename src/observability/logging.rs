//! Structured logging.
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - JSON format for production, text format for development
//! - Level from configuration, `RUST_LOG` wins when present

use thiserror::Error;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("unknown log format {0:?}")]
    UnknownFormat(String),

    #[error("invalid log level {level:?}: {source}")]
    InvalidLevel {
        level: String,
        #[source]
        source: tracing_subscriber::filter::ParseError,
    },
}

/// Install the global tracing subscriber.
///
/// A subscriber installed earlier in the same process is kept.
pub fn init_logger(format: &str, level: &str) -> Result<(), LoggingError> {
    let configured = EnvFilter::try_new(level).map_err(|source| LoggingError::InvalidLevel {
        level: level.to_string(),
        source,
    })?;
    let filter = EnvFilter::try_from_default_env().unwrap_or(configured);

    let registry = tracing_subscriber::registry().with(filter);
    let result = match format {
        "text" => registry.with(fmt::layer()).try_init(),
        "json" => registry.with(fmt::layer().json()).try_init(),
        other => return Err(LoggingError::UnknownFormat(other.to_string())),
    };

    if let Err(e) = result {
        tracing::debug!(error = %e, "Logger already initialized");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unknown_format() {
        assert!(matches!(
            init_logger("xml", "info"),
            Err(LoggingError::UnknownFormat(_))
        ));
    }

    #[test]
    fn rejects_bad_level() {
        assert!(matches!(
            init_logger("text", "gateway=loud"),
            Err(LoggingError::InvalidLevel { .. })
        ));
    }

    #[test]
    fn repeated_init_is_tolerated() {
        assert!(init_logger("text", "info").is_ok());
        assert!(init_logger("json", "debug").is_ok());
    }
}
