//! TCP listener setup.
//!
//! # Responsibilities
//! - Resolve the configured host and port
//! - Bind the listening socket
//! - Report bind problems with the address that failed

use std::fmt;
use std::net::SocketAddr;

use tokio::net::{lookup_host, TcpListener};

/// Error type for listener operations.
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    /// The host name did not resolve to any address.
    #[error("Failed to resolve {address}: {source}")]
    Resolve {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to bind to address.
    #[error("Failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },
}

/// Host and port the server listens on.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct BindAddress {
    pub host: String,
    pub port: u16,
}

impl BindAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Host to hand to the resolver; an empty host means all interfaces.
    fn resolver_host(&self) -> &str {
        if self.host.is_empty() {
            "0.0.0.0"
        } else {
            &self.host
        }
    }

    /// Resolve to the first matching socket address.
    pub async fn resolve(&self) -> Result<SocketAddr, ListenerError> {
        let mut addrs = lookup_host((self.resolver_host(), self.port))
            .await
            .map_err(|source| ListenerError::Resolve {
                address: self.to_string(),
                source,
            })?;

        addrs.next().ok_or_else(|| ListenerError::Resolve {
            address: self.to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no addresses found"),
        })
    }
}

impl fmt::Display for BindAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.is_empty() {
            write!(f, "*:{}", self.port)
        } else if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Bind a TCP listener on `address`.
pub async fn bind(address: &BindAddress) -> Result<TcpListener, ListenerError> {
    let addr = address.resolve().await?;
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ListenerError::Bind {
            address: address.to_string(),
            source,
        })?;

    if let Ok(local_addr) = listener.local_addr() {
        tracing::debug!(address = %local_addr, "Listener bound");
    }
    Ok(listener)
}
