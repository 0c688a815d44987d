//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (ports, addresses)
//! - Detect half-configured TLS
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: HostConfig → Result<(), Vec<ValidationError>>

use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::HostConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub(crate) fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Check `config` for semantic problems.
pub fn validate_config(config: &HostConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let server = &config.http_server;

    match server.port {
        Some(0) => errors.push(ValidationError::new(
            "http_server.port",
            "must be between 1 and 65535",
        )),
        Some(_) => {}
        None => match config.ports.port_for_service("http") {
            Some(0) => errors.push(ValidationError::new(
                "ports.base_port",
                "derived http port must not be 0",
            )),
            Some(_) => {}
            None => errors.push(ValidationError::new(
                "ports",
                "no port configured for the http service",
            )),
        },
    }

    if server.certfile.is_some() != server.keyfile.is_some() {
        errors.push(ValidationError::new(
            "http_server.certfile",
            "certfile and keyfile must be configured together",
        ));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("invalid socket address {:?}", config.observability.metrics_address),
        ));
    }

    if config.admin.enabled && !config.admin.path.starts_with('/') {
        errors.push(ValidationError::new("admin.path", "must start with '/'"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
