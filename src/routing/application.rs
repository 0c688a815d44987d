//! Mountable sub-applications.
//!
//! A sub-application is anything that can answer a request: an
//! [`axum::Router`] or an arbitrary infallible tower service. Identity is
//! tracked by [`AppId`] so that re-mounting the same application is
//! recognised.

use std::convert::Infallible;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::extract::Request;
use axum::response::{IntoResponse, Response};
use axum::Router;
use tower::{Service, ServiceExt};

/// Uniqueness only, relaxed ordering is enough.
static APP_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier of a sub-application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AppId(u64);

impl AppId {
    fn next() -> Self {
        Self(APP_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for AppId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "app-{}", self.0)
    }
}

/// Handle to a sub-application that can be mounted on the router.
///
/// Cloning is cheap and clones share the same [`AppId`].
#[derive(Clone)]
pub struct Application {
    id: AppId,
    name: Arc<str>,
    router: Router,
}

impl Application {
    /// Wrap an axum router.
    pub fn new(name: impl Into<String>, router: Router) -> Self {
        Self {
            id: AppId::next(),
            name: Arc::from(name.into()),
            router,
        }
    }

    /// Wrap an arbitrary infallible tower service.
    pub fn from_service<S>(name: impl Into<String>, service: S) -> Self
    where
        S: Service<Request, Error = Infallible> + Clone + Send + Sync + 'static,
        S::Response: IntoResponse,
        S::Future: Send + 'static,
    {
        Self::new(name, Router::new().fallback_service(service))
    }

    pub fn id(&self) -> AppId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Hand a request to the sub-application.
    pub async fn handle(&self, request: Request) -> Response {
        match self.router.clone().oneshot(request).await {
            Ok(response) => response,
            Err(never) => match never {},
        }
    }
}

impl fmt::Debug for Application {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Application")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
