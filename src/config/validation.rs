//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Detect colliding ports and paths between acceptors
//! - Validate value ranges (rates > 0, pool sizes > 0)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;

use thiserror::Error;

use crate::config::schema::GatewayConfig;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} must start with '/' (got {value:?})")]
    InvalidPath { field: &'static str, value: String },

    #[error("path {0} is bound more than once on the primary server")]
    DuplicatePath(String),

    #[error("port {port} is used by both {first} and {second}")]
    PortConflict {
        port: u16,
        first: &'static str,
        second: &'static str,
    },

    #[error("{0} must be greater than zero")]
    MustBePositive(&'static str),

    #[error("{field} must be at most {max} (got {value})")]
    TooLarge {
        field: &'static str,
        value: u64,
        max: u64,
    },

    #[error("unknown log format {0:?} (expected text or json)")]
    UnknownLogFormat(String),

    #[error("netpoll cannot be combined with TLS")]
    NetpollWithTls,

    #[error("TLS {0} path is empty")]
    EmptyTlsPath(&'static str),

    #[error("jwt.param must not be empty when identification is enabled")]
    EmptyJwtParam,

    #[error("stream route #{0} has an empty channel or secret")]
    IncompleteStreamRoute(usize),

    #[error("channel {0} is routed more than once")]
    DuplicateStreamRoute(String),
}

/// One notification per nanosecond is the finest period a timer can express.
pub const MAX_DISCONNECT_RATE: u64 = 1_000_000_000;

/// Validate a configuration snapshot.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_paths(config, &mut errors);
    check_ports(config, &mut errors);

    if !matches!(config.logging.format.as_str(), "text" | "json") {
        errors.push(ValidationError::UnknownLogFormat(
            config.logging.format.clone(),
        ));
    }

    if config.app.rpc_concurrency == 0 {
        errors.push(ValidationError::MustBePositive("app.rpc_concurrency"));
    }

    if config.app.netpoll_enabled {
        if config.app.netpoll_workers == 0 {
            errors.push(ValidationError::MustBePositive("app.netpoll_workers"));
        }
        if config.server.tls.is_some() {
            errors.push(ValidationError::NetpollWithTls);
        }
    }

    if let Some(tls) = &config.server.tls {
        if tls.cert_path.is_empty() {
            errors.push(ValidationError::EmptyTlsPath("certificate"));
        }
        if tls.key_path.is_empty() {
            errors.push(ValidationError::EmptyTlsPath("key"));
        }
    }

    if !config.disconnect_queue.disabled {
        let rate = config.disconnect_queue.rate;
        if rate == 0 {
            errors.push(ValidationError::MustBePositive("disconnect_queue.rate"));
        } else if u64::from(rate) > MAX_DISCONNECT_RATE {
            errors.push(ValidationError::TooLarge {
                field: "disconnect_queue.rate",
                value: u64::from(rate),
                max: MAX_DISCONNECT_RATE,
            });
        }
    }

    if config.rpc.max_attempts == 0 {
        errors.push(ValidationError::MustBePositive("rpc.max_attempts"));
    }

    if config.jwt.enabled() && config.jwt.param.is_empty() {
        errors.push(ValidationError::EmptyJwtParam);
    }

    let mut channels = HashSet::new();
    for (i, route) in config.streams.iter().enumerate() {
        if route.channel.is_empty() || route.secret.is_empty() {
            errors.push(ValidationError::IncompleteStreamRoute(i));
        } else if !channels.insert(route.channel.as_str()) {
            errors.push(ValidationError::DuplicateStreamRoute(route.channel.clone()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_paths(config: &GatewayConfig, errors: &mut Vec<ValidationError>) {
    let mut bound: Vec<(&'static str, &str)> = vec![
        ("server.path", config.server.path.as_str()),
        ("server.health_path", config.server.health_path.as_str()),
    ];
    if config.apollo.enabled() {
        bound.push(("apollo.path", config.apollo.path.as_str()));
    }
    if let Some(path) = config.metrics.exporter_path() {
        bound.push(("metrics.http_path", path));
    }

    let mut seen = HashSet::new();
    for (field, path) in bound {
        if !path.starts_with('/') {
            errors.push(ValidationError::InvalidPath {
                field,
                value: path.to_string(),
            });
        } else if !seen.insert(path) {
            errors.push(ValidationError::DuplicatePath(path.to_string()));
        }
    }

    if config.ws_rpc.enabled() && !config.ws_rpc.path.starts_with('/') {
        errors.push(ValidationError::InvalidPath {
            field: "ws_rpc.path",
            value: config.ws_rpc.path.clone(),
        });
    }
    if !config.broadcast.path.starts_with('/') {
        errors.push(ValidationError::InvalidPath {
            field: "broadcast.path",
            value: config.broadcast.path.clone(),
        });
    }
}

fn check_ports(config: &GatewayConfig, errors: &mut Vec<ValidationError>) {
    let mut ports = vec![
        ("server.port", config.server.port),
        ("broadcast.port", config.broadcast.port),
    ];
    if config.ws_rpc.enabled() {
        ports.push(("ws_rpc.port", config.ws_rpc.port));
    }

    // Port 0 asks the OS for an ephemeral port and never collides.
    for (i, &(first, port)) in ports.iter().enumerate() {
        if port == 0 {
            continue;
        }
        if let Some(&(second, _)) = ports[i + 1..].iter().find(|(_, p)| *p == port) {
            errors.push(ValidationError::PortConflict {
                port,
                first,
                second,
            });
        }
    }
}
