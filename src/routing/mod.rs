//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request (Upgrade header, path)
//!     → scope.rs (classify as http / websocket / malformed)
//!     → router.rs (route lookup)
//!     → mount.rs (longest prefix, then priority, then first registered)
//!     → Mounted application, or for "/" the index page winner:
//!     → index.rs (highest priority proposal)
//!     → names.rs (route name → URL)
//!     → 302 redirect or 404
//! ```
//!
//! # Design Decisions
//! - Mounts change at runtime; every lookup reads the latest snapshot
//! - Deterministic: same table and input always pick the same mount
//! - Handles remove exactly their own entry; guards do so on drop

pub mod application;
pub mod index;
pub mod mount;
pub mod names;
pub mod router;
pub mod scope;

pub use application::{AppId, Application};
pub use index::{IndexProposalGuard, IndexProposalHandle, IndexProposalHeap, ProposalInfo};
pub use mount::{MountEntry, MountError, MountGuard, MountHandle, MountInfo, MountOptions, MountTable};
pub use names::RouteNames;
pub use router::{MountMatch, RequestRouter, RouteOutcome};
pub use scope::{ScopeKind, ScopeSet, UnknownScope};
