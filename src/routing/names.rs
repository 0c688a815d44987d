//! Named routes.
//!
//! Index proposals refer to routes either by URL (`/debug/`) or by a
//! dotted name such as `debug.index`. Names are registered by the
//! extension that owns the route and resolved here when `/` is requested.

use std::sync::Arc;

use crate::registry::{find_in_registry, Registry, RegistryBase};

/// Registry mapping route names to URL paths.
#[derive(Clone, Default)]
pub struct RouteNames {
    urls: Arc<RegistryBase<String>>,
}

impl RouteNames {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `name` as an alias for `url`.
    pub fn register(&self, name: impl Into<String>, url: impl Into<String>) {
        let name = name.into();
        let url = url.into();
        tracing::debug!(name = %name, url = %url, "Route name registered");
        self.urls.insert(name, url);
    }

    pub fn unregister(&self, name: &str) -> Option<String> {
        self.urls.remove(name)
    }

    /// Resolve a route identifier to a URL.
    ///
    /// Identifiers that already look like URLs are returned unchanged.
    pub fn resolve(&self, route: &str) -> Option<String> {
        if route.starts_with('/') || route.contains("://") {
            return Some(route.to_string());
        }
        find_in_registry(self.urls.as_ref(), route, "unknown route name")
    }

    pub fn names(&self) -> Vec<String> {
        self.urls.ids()
    }
}
