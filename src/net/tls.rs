//! TLS material for the HTTPS listener.
//!
//! Certificate and key are read on every serve attempt, so replaced files
//! are picked up after a restart.

use std::path::{Path, PathBuf};

use axum_server::tls_rustls::RustlsConfig;

/// Error type for TLS setup.
#[derive(Debug, thiserror::Error)]
pub enum TlsError {
    #[error("{role} file not found: {}", path.display())]
    Missing { role: &'static str, path: PathBuf },

    /// The files exist but do not hold a usable certificate chain and key.
    #[error("invalid TLS material in {} / {}: {source}", cert.display(), key.display())]
    Invalid {
        cert: PathBuf,
        key: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn require(role: &'static str, path: &Path) -> Result<(), TlsError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(TlsError::Missing {
            role,
            path: path.to_path_buf(),
        })
    }
}

/// Build the rustls server config from PEM encoded `cert` and `key` files.
pub async fn load_tls_config(cert: &Path, key: &Path) -> Result<RustlsConfig, TlsError> {
    require("certificate", cert)?;
    require("private key", key)?;

    let config = RustlsConfig::from_pem_file(cert, key)
        .await
        .map_err(|source| TlsError::Invalid {
            cert: cert.to_path_buf(),
            key: key.to_path_buf(),
            source,
        })?;
    tracing::debug!(cert = %cert.display(), "TLS material loaded");
    Ok(config)
}
