//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection (hyper via axum / axum-server)
//!     → server.rs (top-level Router, middleware)
//!     → request.rs (request ID)
//!     → routing::RequestRouter (choose mount or index page)
//!     → response.rs (redirect / not found)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{MakeRequestUuid, X_REQUEST_ID};
pub use server::{build_app, HttpServer};
