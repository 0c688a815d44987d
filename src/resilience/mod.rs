//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Serve attempt fails:
//!     → retries.rs (reset counter if the run was long, decide retry or give up)
//!     → backoff.rs (delay before the next attempt)
//! ```
//!
//! # Design Decisions
//! - Fixed one-second back-off by default
//! - Exponential back-off is available but never chosen implicitly

pub mod backoff;
pub mod retries;

pub use backoff::Backoff;
pub use retries::{RetryDecision, RetryPolicy, RetryState};
