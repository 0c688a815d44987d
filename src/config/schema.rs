//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from TOML and every
//! field has a default, so an empty file is a valid configuration.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration supplied by the host process.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct HostConfig {
    /// HTTP server extension settings.
    pub http_server: HttpServerConfig,

    /// Service name to port mapping.
    pub ports: PortConfig,

    pub observability: ObservabilityConfig,

    /// Built-in status sub-application.
    pub admin: AdminConfig,
}

/// HTTP server extension configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpServerConfig {
    /// Host to listen on. Empty means all interfaces.
    pub host: String,

    /// Port to listen on. `None` derives it from the `http` service port.
    pub port: Option<u16>,

    /// Certificate file (PEM). TLS needs both this and `keyfile`.
    pub certfile: Option<PathBuf>,

    /// Private key file (PEM).
    pub keyfile: Option<PathBuf>,

    /// Seconds in-flight requests may drain after shutdown.
    pub shutdown_grace_secs: u64,
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: None,
            certfile: None,
            keyfile: None,
            shutdown_grace_secs: 5,
        }
    }
}

impl HttpServerConfig {
    /// Certificate and key paths, if both are configured.
    pub fn tls_files(&self) -> Option<(PathBuf, PathBuf)> {
        match (&self.certfile, &self.keyfile) {
            (Some(cert), Some(key)) => Some((cert.clone(), key.clone())),
            _ => None,
        }
    }
}

/// Port numbers of the services offered by the host.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PortConfig {
    /// Port of the service with offset 0.
    pub base_port: u16,

    /// Offset of each service from `base_port`.
    pub offsets: BTreeMap<String, u16>,
}

impl Default for PortConfig {
    fn default() -> Self {
        let offsets = [("http", 0), ("tcp", 1), ("udp", 1)]
            .into_iter()
            .map(|(name, offset)| (name.to_string(), offset))
            .collect();
        Self {
            base_port: 5000,
            offsets,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

/// Status sub-application configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Mount the status endpoints.
    pub enabled: bool,

    /// Mount path.
    pub path: String,

    /// Bearer token required by the endpoints. `None` leaves them open.
    pub api_key: Option<String>,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: "/admin".to_string(),
            api_key: None,
        }
    }
}
