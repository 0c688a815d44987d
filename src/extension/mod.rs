//! Extension boundary.
//!
//! # Data Flow
//! ```text
//! Host:
//!     load(config) → exports handed to other extensions
//!     run(shutdown) → serve lifetime, error only when fatal
//!     unload() → exports dropped, mounts and proposals cleared
//!
//! Other extensions (through HttpServerHandle):
//!     mount / mount_scoped → routing::MountTable
//!     propose_index_page / proposed_index_page → routing::IndexProposalHeap
//!     register_route_name → routing::RouteNames
//! ```
//!
//! # Design Decisions
//! - No process-wide state: every table is owned by the loaded handle
//! - Exports are cheap to clone and safe to share across tasks

pub mod http_server;

use std::future::Future;

use crate::config::ConfigError;
use crate::lifecycle::{ServeError, ShutdownSignal};
use crate::routing::MountError;

pub use http_server::{HttpServerExtension, HttpServerHandle};

/// Error type for extension operations.
#[derive(Debug, thiserror::Error)]
pub enum ExtensionError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Mount(#[from] MountError),

    #[error(transparent)]
    Serve(#[from] ServeError),
}

/// Contract between the host process and a loadable unit.
pub trait Extension: Send + Sync {
    /// Configuration section supplied by the host.
    type Config;

    /// Handles other extensions use to reach this one.
    type Exports: Clone + Send + Sync;

    fn name(&self) -> &'static str;

    fn load(&mut self, config: Self::Config) -> Result<Self::Exports, ExtensionError>;

    fn unload(&mut self);

    /// Run for the lifetime of the service.
    fn run(
        &self,
        shutdown: ShutdownSignal,
    ) -> impl Future<Output = Result<(), ExtensionError>> + Send;
}
