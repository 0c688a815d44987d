//! Mount table of sub-applications.
//!
//! # Responsibilities
//! - Register (application, path prefix, scopes, priority) entries
//! - Reject conflicting claims on the same (path, scopes) pair
//! - Hand out revocation handles and scoped guards
//! - Serve consistent snapshots to the router
//!
//! # Design Decisions
//! - Readers load an `ArcSwap` snapshot and never block
//! - Writers are serialized by a mutex and publish a fresh snapshot
//! - Handles keep a `Weak` reference, so they never keep the table alive

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use arc_swap::ArcSwap;
use serde::Serialize;

use crate::observability::metrics;
use crate::routing::application::{AppId, Application};
use crate::routing::scope::{ScopeKind, ScopeSet};

/// Error type for mount operations.
#[derive(Debug, thiserror::Error)]
pub enum MountError {
    /// The (path, scopes) pair is owned by another live application.
    #[error("path {path:?} with scopes [{scopes}] is already mounted by {owner:?}")]
    DuplicateMount {
        path: String,
        scopes: ScopeSet,
        owner: String,
    },

    /// Mount paths must start with `/`.
    #[error("invalid mount path {0:?}: must start with '/'")]
    InvalidPath(String),
}

/// Options controlling how an application is mounted.
#[derive(Debug, Clone, Copy, Default)]
pub struct MountOptions {
    pub scopes: ScopeSet,
    pub priority: i32,
}

impl MountOptions {
    /// Restrict the mount to the given scope kinds.
    pub fn scopes(mut self, scopes: impl Into<ScopeSet>) -> Self {
        self.scopes = scopes.into();
        self
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

/// A single registered mount.
#[derive(Debug)]
pub struct MountEntry {
    seq: u64,
    application: Application,
    prefix: String,
    scopes: ScopeSet,
    priority: i32,
}

impl MountEntry {
    pub fn application(&self) -> &Application {
        &self.application
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn scopes(&self) -> ScopeSet {
        self.scopes
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    /// Registration order; lower was registered first.
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Whether this entry is eligible for a connection.
    pub fn matches(&self, scope: ScopeKind, path: &str) -> bool {
        self.scopes.contains(scope) && path.starts_with(&self.prefix)
    }

    /// Serializable summary of the entry.
    pub fn describe(&self) -> MountInfo {
        MountInfo {
            application: self.application.name().to_string(),
            app_id: self.application.id().as_u64(),
            path: self.prefix.clone(),
            scopes: self.scopes,
            priority: self.priority,
        }
    }
}

/// Listing entry exposed to status endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct MountInfo {
    pub application: String,
    pub app_id: u64,
    pub path: String,
    pub scopes: ScopeSet,
    pub priority: i32,
}

struct Inner {
    entries: ArcSwap<Vec<Arc<MountEntry>>>,
    writer: Mutex<()>,
    next_seq: AtomicU64,
}

impl Inner {
    fn remove(&self, seq: u64) -> bool {
        let _write = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let current = self.entries.load();
        if !current.iter().any(|e| e.seq == seq) {
            return false;
        }

        let next: Vec<Arc<MountEntry>> = current
            .iter()
            .filter(|e| e.seq != seq)
            .cloned()
            .collect();
        metrics::set_mount_count(next.len());
        self.entries.store(Arc::new(next));
        true
    }
}

/// Shared table of mounted sub-applications.
///
/// Cloning yields another handle to the same table.
#[derive(Clone)]
pub struct MountTable {
    inner: Arc<Inner>,
}

impl MountTable {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                entries: ArcSwap::from_pointee(Vec::new()),
                writer: Mutex::new(()),
                next_seq: AtomicU64::new(0),
            }),
        }
    }

    /// Mount `application` at `path`.
    ///
    /// Mounting the same application again with the same path and scopes
    /// returns a handle to the existing entry.
    pub fn mount(
        &self,
        application: Application,
        path: impl Into<String>,
        options: MountOptions,
    ) -> Result<MountHandle, MountError> {
        let path = path.into();
        if !path.starts_with('/') {
            return Err(MountError::InvalidPath(path));
        }

        let _write = self.inner.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let current = self.inner.entries.load();

        if let Some(existing) = current
            .iter()
            .find(|e| e.prefix == path && e.scopes == options.scopes)
        {
            if existing.application.id() == application.id() {
                tracing::debug!(
                    path = %path,
                    application = %application.name(),
                    "Application already mounted"
                );
                return Ok(self.handle_for(existing.seq));
            }
            return Err(MountError::DuplicateMount {
                path,
                scopes: options.scopes,
                owner: existing.application.name().to_string(),
            });
        }

        let seq = self.inner.next_seq.fetch_add(1, Ordering::Relaxed);
        tracing::info!(
            path = %path,
            scopes = %options.scopes,
            priority = options.priority,
            application = %application.name(),
            "Mounted application"
        );

        let mut next = Vec::with_capacity(current.len() + 1);
        next.extend(current.iter().cloned());
        next.push(Arc::new(MountEntry {
            seq,
            application,
            prefix: path,
            scopes: options.scopes,
            priority: options.priority,
        }));
        metrics::set_mount_count(next.len());
        self.inner.entries.store(Arc::new(next));

        Ok(self.handle_for(seq))
    }

    /// Mount `application` for as long as the returned guard is alive.
    pub fn mount_scoped(
        &self,
        application: Application,
        path: impl Into<String>,
        options: MountOptions,
    ) -> Result<MountGuard, MountError> {
        self.mount(application, path, options).map(MountHandle::into_guard)
    }

    /// Current snapshot of all entries, in registration order.
    pub fn snapshot(&self) -> Arc<Vec<Arc<MountEntry>>> {
        self.inner.entries.load_full()
    }

    /// Serializable listing of all entries.
    pub fn entries(&self) -> Vec<MountInfo> {
        self.inner.entries.load().iter().map(|e| e.describe()).collect()
    }

    /// Best entry for a connection: longest prefix, then priority, then
    /// earliest registration.
    pub fn lookup(&self, scope: ScopeKind, path: &str) -> Option<Arc<MountEntry>> {
        self.inner
            .entries
            .load()
            .iter()
            .filter(|e| e.matches(scope, path))
            .max_by_key(|e| (e.prefix.len(), e.priority, std::cmp::Reverse(e.seq)))
            .cloned()
    }

    /// Whether `app` currently has any live entry.
    pub fn is_mounted(&self, app: AppId) -> bool {
        self.inner
            .entries
            .load()
            .iter()
            .any(|e| e.application.id() == app)
    }

    /// Remove every entry. Outstanding handles become no-ops.
    pub fn clear(&self) {
        let _write = self.inner.writer.lock().unwrap_or_else(PoisonError::into_inner);
        metrics::set_mount_count(0);
        self.inner.entries.store(Arc::new(Vec::new()));
    }

    pub fn len(&self) -> usize {
        self.inner.entries.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn handle_for(&self, seq: u64) -> MountHandle {
        MountHandle {
            table: Arc::downgrade(&self.inner),
            seq,
            revoked: AtomicBool::new(false),
        }
    }
}

impl Default for MountTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Capability to remove one mount entry.
///
/// Dropping the handle leaves the mount in place; call [`MountHandle::revoke`]
/// or convert it into a [`MountGuard`].
#[derive(Debug)]
pub struct MountHandle {
    table: Weak<Inner>,
    seq: u64,
    revoked: AtomicBool,
}

impl MountHandle {
    /// Remove the entry. Calling this more than once is a no-op.
    pub fn revoke(&self) {
        if self.revoked.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(table) = self.table.upgrade() {
            if table.remove(self.seq) {
                tracing::info!(entry = self.seq, "Unmounted application");
            }
        }
    }

    pub fn is_revoked(&self) -> bool {
        self.revoked.load(Ordering::Acquire)
    }

    /// Tie the entry's lifetime to the returned guard.
    pub fn into_guard(self) -> MountGuard {
        MountGuard { handle: self }
    }
}

/// Keeps a mount alive until dropped.
#[derive(Debug)]
#[must_use = "the mount is removed as soon as the guard is dropped"]
pub struct MountGuard {
    handle: MountHandle,
}

impl MountGuard {
    /// Remove the mount now instead of at drop.
    pub fn revoke(self) {
        drop(self);
    }
}

impl Drop for MountGuard {
    fn drop(&mut self) {
        self.handle.revoke();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;

    fn app(name: &str) -> Application {
        Application::new(name, Router::new())
    }

    #[test]
    fn test_longest_prefix_wins() {
        let table = MountTable::new();
        let a = app("a");
        let ab = app("ab");
        table.mount(a.clone(), "/a", MountOptions::default()).unwrap();
        table.mount(ab.clone(), "/a/b", MountOptions::default()).unwrap();

        let hit = table.lookup(ScopeKind::Http, "/a/b/c").unwrap();
        assert_eq!(hit.application().id(), ab.id());

        let hit = table.lookup(ScopeKind::Http, "/a/x").unwrap();
        assert_eq!(hit.application().id(), a.id());

        assert!(table.lookup(ScopeKind::Http, "/other").is_none());
    }

    #[test]
    fn test_priority_breaks_same_prefix() {
        let table = MountTable::new();
        let low = app("low");
        let high = app("high");
        table.mount(low.clone(), "/x", MountOptions::default()).unwrap();
        table
            .mount(
                high.clone(),
                "/x",
                MountOptions::default().scopes(ScopeKind::Http).priority(5),
            )
            .unwrap();

        let http = table.lookup(ScopeKind::Http, "/x").unwrap();
        assert_eq!(http.application().id(), high.id());

        let ws = table.lookup(ScopeKind::WebSocket, "/x").unwrap();
        assert_eq!(ws.application().id(), low.id());
    }

    #[test]
    fn test_ties_go_to_first_registered() {
        let table = MountTable::new();
        let first = app("first");
        let second = app("second");
        table
            .mount(first.clone(), "/t", MountOptions::default().scopes(ScopeKind::Http))
            .unwrap();
        table
            .mount(second.clone(), "/t", MountOptions::default())
            .unwrap();

        let hit = table.lookup(ScopeKind::Http, "/t/1").unwrap();
        assert_eq!(hit.application().id(), first.id());
    }

    #[test]
    fn test_duplicate_mount_rejected() {
        let table = MountTable::new();
        let a = app("a");
        table.mount(a.clone(), "/dup", MountOptions::default()).unwrap();

        let err = table
            .mount(app("b"), "/dup", MountOptions::default())
            .unwrap_err();
        assert!(matches!(err, MountError::DuplicateMount { ref owner, .. } if owner == "a"));

        // Same application again is idempotent.
        table.mount(a, "/dup", MountOptions::default()).unwrap();
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_invalid_path() {
        let table = MountTable::new();
        let err = table.mount(app("a"), "api", MountOptions::default()).unwrap_err();
        assert!(matches!(err, MountError::InvalidPath(_)));
        assert!(table.is_empty());
    }

    #[test]
    fn test_revoke_is_idempotent() {
        let table = MountTable::new();
        let a = app("a");
        let b = app("b");
        let handle = table.mount(a.clone(), "/a", MountOptions::default()).unwrap();
        table.mount(b.clone(), "/b", MountOptions::default()).unwrap();

        handle.revoke();
        handle.revoke();
        assert!(handle.is_revoked());
        assert_eq!(table.len(), 1);
        assert!(!table.is_mounted(a.id()));
        assert!(table.is_mounted(b.id()));
        assert!(table.lookup(ScopeKind::Http, "/a").is_none());
    }

    #[test]
    fn test_guard_releases_on_early_return() {
        fn mount_then_fail(table: &MountTable, a: Application) -> Result<(), MountError> {
            let _guard = table.mount_scoped(a, "/scoped", MountOptions::default())?;
            table.mount(app("x"), "relative", MountOptions::default())?;
            Ok(())
        }

        let table = MountTable::new();
        assert!(mount_then_fail(&table, app("a")).is_err());
        assert!(table.is_empty());
    }

    #[tokio::test]
    async fn test_guard_released_when_future_cancelled() {
        let table = MountTable::new();

        let mut held = Box::pin(async {
            let _guard = table.mount_scoped(app("a"), "/a", MountOptions::default()).unwrap();
            std::future::pending::<()>().await;
        });

        tokio::select! {
            _ = &mut held => unreachable!(),
            _ = tokio::task::yield_now() => {}
        }
        assert_eq!(table.len(), 1);
        drop(held);
        assert!(table.is_empty());
        assert!(table.lookup(ScopeKind::Http, "/a").is_none());

        let timed_out = tokio::time::timeout(std::time::Duration::from_millis(20), async {
            let _guard = table.mount_scoped(app("b"), "/b", MountOptions::default()).unwrap();
            std::future::pending::<()>().await;
        })
        .await;
        assert!(timed_out.is_err());
        assert!(table.is_empty());
    }

    #[test]
    fn test_handle_outlives_table() {
        let table = MountTable::new();
        let handle = table.mount(app("a"), "/a", MountOptions::default()).unwrap();
        drop(table);
        handle.revoke();
        assert!(handle.is_revoked());
    }

    #[test]
    fn test_revoked_entries_never_routed() {
        let table = MountTable::new();
        let apps: Vec<Application> = (0..8).map(|i| app(&format!("app{i}"))).collect();
        let mut handles = Vec::new();
        for (i, a) in apps.iter().enumerate() {
            let path = if i % 2 == 0 { "/p".to_string() } else { format!("/p/{i}") };
            let scopes = if i % 3 == 0 { ScopeSet::HTTP } else { ScopeSet::ALL };
            let opts = MountOptions::default().scopes(scopes).priority(i as i32);
            match table.mount(a.clone(), path, opts) {
                Ok(h) => handles.push((a.id(), h)),
                Err(MountError::DuplicateMount { .. }) => {}
                Err(e) => panic!("unexpected error: {e}"),
            }
        }

        for (revoked_id, handle) in handles.iter().step_by(2) {
            handle.revoke();
            for path in ["/p", "/p/1", "/p/3", "/p/5/x", "/p/7"] {
                for scope in ScopeKind::ALL {
                    if let Some(hit) = table.lookup(scope, path) {
                        assert_ne!(hit.application().id(), *revoked_id);
                    }
                }
            }
        }
    }
}
