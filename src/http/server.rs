//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the top-level Axum Router around the request router
//! - Wire up middleware (tracing, request ID)
//! - Bind and serve one attempt, plain or TLS
//! - Publish the bound socket address while serving

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Request, State};
use axum::response::Response;
use axum::Router;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;

use crate::http::request::{propagate_request_id_layer, set_request_id_layer};
use crate::lifecycle::{Readiness, ServeFailure, ShutdownSignal};
use crate::net::{listener, tls, BindAddress};
use crate::routing::RequestRouter;

/// Build the single top-level handler installed on the listener.
pub fn build_app(router: RequestRouter) -> Router {
    Router::new()
        .fallback(dispatch_handler)
        .with_state(router)
        .layer(propagate_request_id_layer())
        .layer(TraceLayer::new_for_http())
        .layer(set_request_id_layer())
}

async fn dispatch_handler(State(router): State<RequestRouter>, request: Request) -> Response {
    router.dispatch(request).await
}

/// Everything needed to run serve attempts for one configuration.
#[derive(Clone)]
pub struct HttpServer {
    app: Router,
    address: BindAddress,
    tls: Option<(PathBuf, PathBuf)>,
    shutdown_grace: Duration,
    bound: Arc<watch::Sender<Option<SocketAddr>>>,
}

impl HttpServer {
    pub fn new(app: Router, address: BindAddress) -> Self {
        let (bound, _) = watch::channel(None);
        Self {
            app,
            address,
            tls: None,
            shutdown_grace: Duration::from_secs(5),
            bound: Arc::new(bound),
        }
    }

    /// Serve HTTPS with the given certificate and key files.
    pub fn with_tls(mut self, files: Option<(PathBuf, PathBuf)>) -> Self {
        self.tls = files;
        self
    }

    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// Top-level handler served on every attempt.
    pub fn app(&self) -> &Router {
        &self.app
    }

    pub fn is_secure(&self) -> bool {
        self.tls.is_some()
    }

    pub fn address(&self) -> &BindAddress {
        &self.address
    }

    /// Receiver for the socket address while a listener is up.
    pub fn bound_address(&self) -> watch::Receiver<Option<SocketAddr>> {
        self.bound.subscribe()
    }

    /// Bind and serve until `shutdown` fires or the listener fails.
    ///
    /// `ready` is marked once the listener accepts connections.
    pub async fn serve_once(&self, shutdown: ShutdownSignal, ready: Readiness) -> Result<(), ServeFailure> {
        tracing::info!(
            address = %self.address,
            "Starting {} server on {}",
            if self.is_secure() { "HTTPS" } else { "HTTP" },
            self.address
        );

        let result = match &self.tls {
            None => self.serve_plain(shutdown, ready).await,
            Some((cert, key)) => self.serve_tls(cert, key, shutdown, ready).await,
        };
        self.bound.send_replace(None);
        result
    }

    async fn serve_plain(&self, shutdown: ShutdownSignal, ready: Readiness) -> Result<(), ServeFailure> {
        let listener = listener::bind(&self.address).await?;
        ready.mark_running();
        if let Ok(local_addr) = listener.local_addr() {
            self.bound.send_replace(Some(local_addr));
            tracing::info!(address = %local_addr, "Listening for connections");
        }

        let app = self
            .app
            .clone()
            .into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown.wait())
            .await
            .map_err(ServeFailure::Serve)
    }

    async fn serve_tls(
        &self,
        cert: &std::path::Path,
        key: &std::path::Path,
        mut shutdown: ShutdownSignal,
        ready: Readiness,
    ) -> Result<(), ServeFailure> {
        let config = tls::load_tls_config(cert, key).await?;
        let addr = self.address.resolve().await?;

        let handle = axum_server::Handle::new();
        let grace = self.shutdown_grace;
        let stopper = {
            let handle = handle.clone();
            tokio::spawn(async move {
                shutdown.recv().await;
                handle.graceful_shutdown(Some(grace));
            })
        };
        let publisher = {
            let handle = handle.clone();
            let bound = self.bound.clone();
            tokio::spawn(async move {
                if let Some(local_addr) = handle.listening().await {
                    ready.mark_running();
                    bound.send_replace(Some(local_addr));
                    tracing::info!(address = %local_addr, "Listening for TLS connections");
                }
            })
        };

        let app = self
            .app
            .clone()
            .into_make_service_with_connect_info::<SocketAddr>();
        let result = axum_server::bind_rustls(addr, config)
            .handle(handle)
            .serve(app)
            .await;

        stopper.abort();
        publisher.abort();
        result.map_err(ServeFailure::Serve)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::{Application, IndexProposalHeap, MountOptions, MountTable, RouteNames};
    use axum::body::Body;
    use axum::http::{header, StatusCode};
    use axum::routing::get;
    use tower::ServiceExt;

    fn request_router() -> RequestRouter {
        RequestRouter::new(MountTable::new(), IndexProposalHeap::new(), RouteNames::new())
    }

    #[tokio::test]
    async fn test_dispatch_forwards_with_stripped_prefix() {
        let router = request_router();
        let api = Application::new(
            "api",
            Router::new().route("/ping", get(|| async { "pong" })),
        );
        router.mounts().mount(api, "/api", MountOptions::default()).unwrap();

        let response = build_app(router)
            .oneshot(Request::builder().uri("/api/ping").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"pong");
    }

    #[tokio::test]
    async fn test_root_redirect_keeps_query() {
        let router = request_router();
        let _p = router.index().propose("/debug/", 0);

        let response = build_app(router)
            .oneshot(Request::builder().uri("/?token=a%20b&x").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()[header::LOCATION], "/debug/?token=a%20b&x");
    }

    #[tokio::test]
    async fn test_root_redirect_only_for_get_and_head() {
        let router = request_router();
        let _p = router.index().propose("/debug/", 0);
        let app = build_app(router);

        let head = Request::builder().method("HEAD").uri("/").body(Body::empty()).unwrap();
        let response = app.clone().oneshot(head).await.unwrap();
        assert_eq!(response.status(), StatusCode::FOUND);

        let post = Request::builder().method("POST").uri("/").body(Body::empty()).unwrap();
        let response = app.oneshot(post).await.unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers()[header::ALLOW], "GET, HEAD");
    }

    #[tokio::test]
    async fn test_root_without_winner_is_not_found() {
        let response = build_app(request_router())
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_malformed_upgrade_is_not_found() {
        let router = request_router();
        let any = Application::new("any", Router::new().fallback(|| async { "ok" }));
        router.mounts().mount(any, "/", MountOptions::default()).unwrap();

        let request = Request::builder()
            .uri("/page")
            .header(header::UPGRADE, axum::http::HeaderValue::from_bytes(b"\xfe").unwrap())
            .body(Body::empty())
            .unwrap();
        let response = build_app(router).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
