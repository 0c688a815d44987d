//! Index page proposals.
//!
//! Extensions propose one of their routes as the landing page for `/`.
//! The proposal with the highest priority wins; among equal priorities the
//! most recently proposed one wins.
//!
//! Proposals live in a binary max-heap so the winner is always at the root.
//! Revoking a proposal removes it by identity: the slot is overwritten with
//! the last element and heap order is restored from that position.

use std::cmp::Ordering as CmpOrdering;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use serde::Serialize;

#[derive(Debug, Clone)]
struct Proposal {
    id: u64,
    priority: i32,
    route: String,
}

impl Proposal {
    /// Ordering key; `id` grows with insertion so later proposals win ties.
    fn key(&self) -> (i32, u64) {
        (self.priority, self.id)
    }

    fn outranks(&self, other: &Proposal) -> bool {
        self.key().cmp(&other.key()) == CmpOrdering::Greater
    }
}

/// Serializable view of one proposal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProposalInfo {
    pub route: String,
    pub priority: i32,
}

#[derive(Debug, Default)]
struct Heap {
    items: Vec<Proposal>,
}

impl Heap {
    fn push(&mut self, proposal: Proposal) {
        self.items.push(proposal);
        let last = self.items.len() - 1;
        self.sift_up(last);
    }

    fn peek(&self) -> Option<&Proposal> {
        self.items.first()
    }

    fn remove(&mut self, id: u64) -> bool {
        let Some(pos) = self.items.iter().position(|p| p.id == id) else {
            return false;
        };

        let last = self.items.len() - 1;
        self.items.swap(pos, last);
        self.items.pop();

        if pos < self.items.len() {
            let pos = self.sift_up(pos);
            self.sift_down(pos);
        }
        true
    }

    fn sift_up(&mut self, mut pos: usize) -> usize {
        while pos > 0 {
            let parent = (pos - 1) / 2;
            if !self.items[pos].outranks(&self.items[parent]) {
                break;
            }
            self.items.swap(pos, parent);
            pos = parent;
        }
        pos
    }

    fn sift_down(&mut self, mut pos: usize) {
        let len = self.items.len();
        loop {
            let left = 2 * pos + 1;
            let right = left + 1;
            let mut best = pos;

            if left < len && self.items[left].outranks(&self.items[best]) {
                best = left;
            }
            if right < len && self.items[right].outranks(&self.items[best]) {
                best = right;
            }
            if best == pos {
                return;
            }
            self.items.swap(pos, best);
            pos = best;
        }
    }

    #[cfg(test)]
    fn is_valid(&self) -> bool {
        (1..self.items.len()).all(|i| !self.items[i].outranks(&self.items[(i - 1) / 2]))
    }
}

struct Inner {
    heap: Mutex<Heap>,
    next_id: AtomicU64,
}

impl Inner {
    fn lock(&self) -> std::sync::MutexGuard<'_, Heap> {
        self.heap.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Priority-ordered collection of proposed index pages.
///
/// Cloning yields another handle to the same collection.
#[derive(Clone)]
pub struct IndexProposalHeap {
    inner: Arc<Inner>,
}

impl IndexProposalHeap {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                heap: Mutex::new(Heap::default()),
                next_id: AtomicU64::new(0),
            }),
        }
    }

    /// Propose `route` as the index page.
    pub fn propose(&self, route: impl Into<String>, priority: i32) -> IndexProposalHandle {
        let route = route.into();
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(route = %route, priority, "Index page proposed");

        self.inner.lock().push(Proposal { id, priority, route });

        IndexProposalHandle {
            heap: Arc::downgrade(&self.inner),
            id,
            revoked: AtomicBool::new(false),
        }
    }

    /// Propose `route` for as long as the returned guard is alive.
    pub fn propose_scoped(&self, route: impl Into<String>, priority: i32) -> IndexProposalGuard {
        self.propose(route, priority).into_guard()
    }

    /// The winning route, if any proposal is live.
    pub fn current_winner(&self) -> Option<String> {
        self.inner.lock().peek().map(|p| p.route.clone())
    }

    /// All live proposals, best first.
    pub fn proposals(&self) -> Vec<ProposalInfo> {
        let mut items = self.inner.lock().items.clone();
        items.sort_by(|a, b| b.key().cmp(&a.key()));
        items
            .into_iter()
            .map(|p| ProposalInfo {
                route: p.route,
                priority: p.priority,
            })
            .collect()
    }

    /// Withdraw every proposal.
    pub fn clear(&self) {
        self.inner.lock().items.clear();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for IndexProposalHeap {
    fn default() -> Self {
        Self::new()
    }
}

/// Capability to withdraw one index page proposal.
#[derive(Debug)]
pub struct IndexProposalHandle {
    heap: Weak<Inner>,
    id: u64,
    revoked: AtomicBool,
}

impl IndexProposalHandle {
    /// Withdraw the proposal. Calling this more than once is a no-op.
    pub fn revoke(&self) {
        if self.revoked.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(inner) = self.heap.upgrade() {
            if inner.lock().remove(self.id) {
                tracing::debug!(proposal = self.id, "Index page proposal revoked");
            }
        }
    }

    pub fn is_revoked(&self) -> bool {
        self.revoked.load(Ordering::Acquire)
    }

    pub fn into_guard(self) -> IndexProposalGuard {
        IndexProposalGuard { handle: self }
    }
}

/// Keeps a proposal alive until dropped.
#[derive(Debug)]
#[must_use = "the proposal is revoked as soon as the guard is dropped"]
pub struct IndexProposalGuard {
    handle: IndexProposalHandle,
}

impl IndexProposalGuard {
    pub fn revoke(self) {
        drop(self);
    }
}

impl Drop for IndexProposalGuard {
    fn drop(&mut self) {
        self.handle.revoke();
    }
}
