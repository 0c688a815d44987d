//! Extensible HTTP host library.
//!
//! Extensions mount sub-applications on one shared listener, propose
//! landing pages for `/`, and rely on a serve loop that restarts the
//! listener after transient failures.

pub mod admin;
pub mod config;
pub mod extension;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod registry;
pub mod resilience;
pub mod routing;

pub use config::schema::HostConfig;
pub use extension::{Extension, ExtensionError, HttpServerExtension, HttpServerHandle};
pub use lifecycle::Shutdown;
pub use routing::{Application, MountOptions, ScopeKind, ScopeSet};
