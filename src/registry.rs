//! Registries that keep track of entries by string identifiers.

use dashmap::DashMap;

/// Lookup interface shared by all registries.
pub trait Registry {
    type Entry;

    /// Whether `id` is used in this registry.
    fn contains(&self, id: &str) -> bool;

    /// The entry registered under `id`.
    fn find_by_id(&self, id: &str) -> Option<Self::Entry>;

    /// All identifiers, sorted.
    fn ids(&self) -> Vec<String>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Plain concurrent map-backed registry.
#[derive(Debug)]
pub struct RegistryBase<T> {
    entries: DashMap<String, T>,
}

impl<T: Clone> RegistryBase<T> {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Register `entry` under `id`, returning the entry it replaced.
    pub fn insert(&self, id: impl Into<String>, entry: T) -> Option<T> {
        self.entries.insert(id.into(), entry)
    }

    pub fn remove(&self, id: &str) -> Option<T> {
        self.entries.remove(id).map(|(_, entry)| entry)
    }
}

impl<T: Clone> Default for RegistryBase<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> Registry for RegistryBase<T> {
    type Entry = T;

    fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    fn find_by_id(&self, id: &str) -> Option<T> {
        self.entries.get(id).map(|entry| entry.value().clone())
    }

    fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.entries.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Look up `id`, logging a debug line with `failure_reason` when it is missing.
pub fn find_in_registry<R: Registry>(
    registry: &R,
    id: &str,
    failure_reason: &str,
) -> Option<R::Entry> {
    let entry = registry.find_by_id(id);
    if entry.is_none() {
        tracing::debug!(id = %id, reason = %failure_reason, "Registry lookup failed");
    }
    entry
}
