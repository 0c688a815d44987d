//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Serve (serve.rs):
//!     Starting → bind → Readiness::mark_running → Running
//!     failure → retry policy → back-off → Starting again, or Failed
//!
//! Shutdown (shutdown.rs):
//!     trigger → serve attempt drains → Stopped
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//! ```
//!
//! # Design Decisions
//! - The serve loop is the only owner of the listening socket
//! - Shutdown is never mistaken for a crash
//! - Back-off sleeps are cancelled by shutdown

pub mod serve;
pub mod shutdown;
pub mod signals;

pub use serve::{Readiness, ServeError, ServeFailure, ServeLifecycle, ServeState};
pub use shutdown::{Shutdown, ShutdownSignal};
