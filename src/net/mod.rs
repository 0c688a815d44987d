//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! HttpServerConfig (host, port, certfile, keyfile)
//!     → listener.rs (resolve, bind)
//!     → tls.rs (optional PEM loading for HTTPS)
//!     → Hand off to HTTP layer
//! ```
//!
//! # Design Decisions
//! - Binding happens on every serve attempt so address changes are picked up
//! - TLS is enabled only when both certificate and key are configured

pub mod listener;
pub mod tls;

pub use listener::{BindAddress, ListenerError};
