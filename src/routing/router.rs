//! Route lookup and dispatch.
//!
//! # Responsibilities
//! - Choose the mount that should receive a connection
//! - Fall back to the index page proposal for `/`
//! - Forward requests to the chosen sub-application
//!
//! # Design Decisions
//! - Holds no per-connection state; every decision reads a fresh snapshot
//! - Unknown scope kinds degrade to `NotFound`, never to an error
//! - The mount prefix is stripped before forwarding, like a nested router

use std::sync::Arc;

use axum::extract::{OriginalUri, Request};
use axum::http::{Method, Uri};
use axum::response::Response;

use crate::routing::index::IndexProposalHeap;
use crate::routing::mount::{MountEntry, MountTable};
use crate::routing::names::RouteNames;
use crate::routing::scope::ScopeKind;
use crate::http::request::request_id;
use crate::http::response;

/// A mount selected for a connection.
#[derive(Debug, Clone)]
pub struct MountMatch {
    entry: Arc<MountEntry>,
}

impl MountMatch {
    pub fn entry(&self) -> &MountEntry {
        &self.entry
    }

    /// Forward `request` to the mounted application.
    pub async fn forward(&self, mut request: Request) -> Response {
        let original = request.uri().clone();
        if let Some(uri) = strip_prefix(&original, self.entry.prefix()) {
            *request.uri_mut() = uri;
        }
        if request.extensions().get::<OriginalUri>().is_none() {
            request.extensions_mut().insert(OriginalUri(original));
        }
        self.entry.application().handle(request).await
    }
}

/// Outcome of a routing decision.
#[derive(Debug, Clone)]
pub enum RouteOutcome {
    /// Forward to a mounted application.
    Mounted(MountMatch),
    /// Redirect to the resolved URL of the current index page.
    IndexRedirect(String),
    NotFound,
}

impl RouteOutcome {
    /// Short label used in logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            RouteOutcome::Mounted(_) => "mounted",
            RouteOutcome::IndexRedirect(_) => "index_redirect",
            RouteOutcome::NotFound => "not_found",
        }
    }
}

/// Dispatches connections to mounted sub-applications.
#[derive(Clone)]
pub struct RequestRouter {
    mounts: MountTable,
    index: IndexProposalHeap,
    names: RouteNames,
}

impl RequestRouter {
    pub fn new(mounts: MountTable, index: IndexProposalHeap, names: RouteNames) -> Self {
        Self {
            mounts,
            index,
            names,
        }
    }

    pub fn mounts(&self) -> &MountTable {
        &self.mounts
    }

    pub fn index(&self) -> &IndexProposalHeap {
        &self.index
    }

    pub fn names(&self) -> &RouteNames {
        &self.names
    }

    /// Decide where a connection of `scope` for `path` goes.
    pub fn route(&self, scope: Option<ScopeKind>, path: &str) -> RouteOutcome {
        let Some(scope) = scope else {
            return RouteOutcome::NotFound;
        };

        if let Some(entry) = self.mounts.lookup(scope, path) {
            return RouteOutcome::Mounted(MountMatch { entry });
        }

        if path == "/" {
            if let Some(url) = self.index_url() {
                return RouteOutcome::IndexRedirect(url);
            }
        }

        RouteOutcome::NotFound
    }

    /// Like [`RequestRouter::route`] but with a textual scope tag.
    pub fn route_tagged(&self, tag: &str, path: &str) -> RouteOutcome {
        self.route(tag.parse().ok(), path)
    }

    /// URL of the current index page winner, if it resolves.
    pub fn index_url(&self) -> Option<String> {
        let winner = self.index.current_winner()?;
        let url = self.names.resolve(&winner);
        if url.is_none() {
            tracing::warn!(route = %winner, "Proposed index page does not resolve to a URL");
        }
        url
    }

    /// Route and answer a single request.
    pub async fn dispatch(&self, request: Request) -> Response {
        let scope = ScopeKind::classify(request.headers());
        let outcome = self.route(scope, request.uri().path());

        tracing::debug!(
            path = %request.uri().path(),
            scope = ?scope,
            outcome = outcome.label(),
            request_id = request_id(&request).unwrap_or("-"),
            "Routing decision"
        );
        crate::observability::metrics::record_route(outcome.label());

        match outcome {
            RouteOutcome::Mounted(target) => target.forward(request).await,
            RouteOutcome::IndexRedirect(url) => {
                if request.method() != Method::GET && request.method() != Method::HEAD {
                    return response::method_not_allowed("GET, HEAD");
                }
                response::redirect(&response::with_query(&url, request.uri().query()))
            }
            RouteOutcome::NotFound => response::not_found(),
        }
    }
}

/// Rewrite `uri` so that its path is relative to `prefix`.
fn strip_prefix(uri: &Uri, prefix: &str) -> Option<Uri> {
    let rest = uri.path().strip_prefix(prefix)?;
    let path = if rest.starts_with('/') {
        rest.to_string()
    } else {
        format!("/{rest}")
    };
    let path_and_query = match uri.query() {
        Some(query) => format!("{path}?{query}"),
        None => path,
    };

    let mut parts = uri.clone().into_parts();
    parts.path_and_query = Some(path_and_query.parse().ok()?);
    Uri::from_parts(parts).ok()
}
