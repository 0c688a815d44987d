//! HTTP server extension.
//!
//! Owns the mount table, the index proposals and the listener for one
//! loaded configuration. Other extensions reach it through the
//! [`HttpServerHandle`] returned by `load`.

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tokio::sync::watch;

use crate::config::{ConfigError, HttpServerConfig, PortConfig, ValidationError};
use crate::extension::{Extension, ExtensionError};
use crate::http::{build_app, HttpServer};
use crate::lifecycle::{ServeLifecycle, ServeState, ShutdownSignal};
use crate::net::BindAddress;
use crate::resilience::RetryPolicy;
use crate::routing::{
    Application, IndexProposalGuard, IndexProposalHandle, IndexProposalHeap, MountError,
    MountGuard, MountHandle, MountOptions, MountTable, RequestRouter, RouteNames,
};

/// Exports of a loaded HTTP server.
#[derive(Clone)]
pub struct HttpServerHandle {
    router: RequestRouter,
    server: HttpServer,
    lifecycle: Arc<ServeLifecycle>,
}

impl HttpServerHandle {
    /// Mount `application` at `path`.
    pub fn mount(
        &self,
        application: Application,
        path: impl Into<String>,
        options: MountOptions,
    ) -> Result<MountHandle, MountError> {
        self.router.mounts().mount(application, path, options)
    }

    /// Mount `application` until the returned guard is dropped.
    pub fn mount_scoped(
        &self,
        application: Application,
        path: impl Into<String>,
        options: MountOptions,
    ) -> Result<MountGuard, MountError> {
        self.router.mounts().mount_scoped(application, path, options)
    }

    /// Propose `route` as the landing page for `/`.
    pub fn propose_index_page(&self, route: impl Into<String>, priority: i32) -> IndexProposalHandle {
        self.router.index().propose(route, priority)
    }

    /// Propose `route` until the returned guard is dropped.
    pub fn proposed_index_page(&self, route: impl Into<String>, priority: i32) -> IndexProposalGuard {
        self.router.index().propose_scoped(route, priority)
    }

    /// Make `name` usable as an index page route.
    pub fn register_route_name(&self, name: impl Into<String>, url: impl Into<String>) {
        self.router.names().register(name, url);
    }

    /// Configured host and port.
    pub fn address(&self) -> &BindAddress {
        self.server.address()
    }

    pub fn is_secure(&self) -> bool {
        self.server.is_secure()
    }

    /// Receiver for the actual socket address, `None` while not listening.
    pub fn bound_address(&self) -> watch::Receiver<Option<SocketAddr>> {
        self.server.bound_address()
    }

    /// Wait until a listener is up and return its address.
    ///
    /// Returns `None` once the serve loop has stopped or failed without
    /// listening.
    pub async fn listening(&self) -> Option<SocketAddr> {
        let mut bound = self.bound_address();
        let mut state = self.subscribe_state();

        loop {
            let addr = *bound.borrow_and_update();
            if addr.is_some() {
                return addr;
            }
            let current = *state.borrow_and_update();
            if matches!(current, ServeState::Stopped | ServeState::Failed) {
                return None;
            }

            tokio::select! {
                changed = bound.changed() => changed.ok()?,
                changed = state.changed() => changed.ok()?,
            }
        }
    }

    pub fn serve_state(&self) -> ServeState {
        self.lifecycle.state()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ServeState> {
        self.lifecycle.subscribe_state()
    }

    pub fn router(&self) -> &RequestRouter {
        &self.router
    }

    /// The top-level handler, for embedding or in-process requests.
    pub fn app(&self) -> Router {
        self.server.app().clone()
    }
}

impl fmt::Debug for HttpServerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpServerHandle")
            .field("address", self.address())
            .field("secure", &self.is_secure())
            .field("mounts", &self.router.mounts().len())
            .field("state", &self.serve_state())
            .finish()
    }
}

/// Extension serving every mounted sub-application on one listener.
#[derive(Debug)]
pub struct HttpServerExtension {
    ports: PortConfig,
    policy: RetryPolicy,
    exports: Option<HttpServerHandle>,
}

impl HttpServerExtension {
    /// `ports` supplies the default port when the config names none.
    pub fn new(ports: PortConfig) -> Self {
        Self {
            ports,
            policy: RetryPolicy::default(),
            exports: None,
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn exports(&self) -> Option<&HttpServerHandle> {
        self.exports.as_ref()
    }

    fn resolve_port(&self, config: &HttpServerConfig) -> Result<u16, ConfigError> {
        if let Some(port) = config.port {
            return Ok(port);
        }
        self.ports.port_for_service("http").ok_or_else(|| {
            ConfigError::Validation(vec![ValidationError::new(
                "ports",
                "no port configured for the http service",
            )])
        })
    }
}

impl Extension for HttpServerExtension {
    type Config = HttpServerConfig;
    type Exports = HttpServerHandle;

    fn name(&self) -> &'static str {
        "http_server"
    }

    fn load(&mut self, config: HttpServerConfig) -> Result<HttpServerHandle, ExtensionError> {
        if self.exports.is_some() {
            tracing::warn!("HTTP server extension loaded twice, replacing previous instance");
            self.unload();
        }

        let port = self.resolve_port(&config)?;
        let address = BindAddress::new(config.host.clone(), port);
        let grace = Duration::from_secs(config.shutdown_grace_secs);

        let router = RequestRouter::new(MountTable::new(), IndexProposalHeap::new(), RouteNames::new());
        let server = HttpServer::new(build_app(router.clone()), address)
            .with_tls(config.tls_files())
            .with_shutdown_grace(grace);
        let lifecycle = ServeLifecycle::new(self.policy).with_shutdown_grace(grace);

        tracing::info!(
            address = %server.address(),
            secure = server.is_secure(),
            "HTTP server extension loaded"
        );

        let handle = HttpServerHandle {
            router,
            server,
            lifecycle: Arc::new(lifecycle),
        };
        self.exports = Some(handle.clone());
        Ok(handle)
    }

    fn unload(&mut self) {
        if let Some(handle) = self.exports.take() {
            // Mounted apps may hold a handle themselves; clearing breaks the cycle.
            handle.router.mounts().clear();
            handle.router.index().clear();
            tracing::info!(address = %handle.address(), "HTTP server extension unloaded");
        }
    }

    async fn run(&self, shutdown: ShutdownSignal) -> Result<(), ExtensionError> {
        let Some(handle) = self.exports.clone() else {
            tracing::warn!("HTTP server address is not configured, not serving");
            return Ok(());
        };

        let server = handle.server.clone();
        handle
            .lifecycle
            .run(
                move |signal, ready| {
                    let server = server.clone();
                    async move { server.serve_once(signal, ready).await }
                },
                shutdown,
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::Shutdown;
    use axum::body::Body;
    use axum::extract::Request;
    use axum::http::StatusCode;
    use axum::routing::get;
    use tower::ServiceExt;

    fn config(port: Option<u16>) -> HttpServerConfig {
        HttpServerConfig {
            port,
            ..HttpServerConfig::default()
        }
    }

    #[test]
    fn test_port_defaults_to_http_service() {
        let mut ext = HttpServerExtension::new(PortConfig::default());
        let handle = ext.load(config(None)).unwrap();
        assert_eq!(handle.address(), &BindAddress::new("127.0.0.1", 5000));

        let handle = ext.load(config(Some(8080))).unwrap();
        assert_eq!(handle.address().port, 8080);
        assert!(!handle.is_secure());
    }

    #[test]
    fn test_missing_http_service_port() {
        let mut ports = PortConfig::default();
        ports.offsets.remove("http");
        let mut ext = HttpServerExtension::new(ports);

        let err = ext.load(config(None)).unwrap_err();
        assert!(matches!(err, ExtensionError::Config(ConfigError::Validation(_))));
        assert!(ext.exports().is_none());
    }

    #[tokio::test]
    async fn test_run_without_load_returns_ok() {
        let ext = HttpServerExtension::new(PortConfig::default());
        let shutdown = Shutdown::new();
        assert!(ext.run(shutdown.subscribe()).await.is_ok());
    }

    #[tokio::test]
    async fn test_handle_mounts_reach_app() {
        let mut ext = HttpServerExtension::new(PortConfig::default());
        let handle = ext.load(config(Some(0))).unwrap();

        let hello = Application::new("hello", Router::new().route("/", get(|| async { "hi" })));
        let _mount = handle.mount_scoped(hello, "/hello", MountOptions::default()).unwrap();

        let response = handle
            .app()
            .oneshot(Request::builder().uri("/hello").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_listening_gives_up_when_stopped_before_bind() {
        let mut ext = HttpServerExtension::new(PortConfig::default());
        let handle = ext.load(config(Some(0))).unwrap();

        let shutdown = Shutdown::new();
        shutdown.trigger();
        ext.run(shutdown.subscribe()).await.unwrap();
        assert_eq!(handle.serve_state(), ServeState::Stopped);

        let addr = tokio::time::timeout(std::time::Duration::from_secs(2), handle.listening())
            .await
            .expect("listening() must not wait after the serve loop stopped");
        assert_eq!(addr, None);
    }

    #[test]
    fn test_unload_clears_tables() {
        let mut ext = HttpServerExtension::new(PortConfig::default());
        let handle = ext.load(config(Some(0))).unwrap();

        let mount = handle
            .mount(Application::new("a", Router::new()), "/a", MountOptions::default())
            .unwrap();
        let proposal = handle.propose_index_page("/a", 0);
        ext.unload();

        assert!(handle.router().mounts().is_empty());
        assert!(handle.router().index().is_empty());
        assert!(ext.exports().is_none());

        // Late revokes after unload are harmless.
        mount.revoke();
        proposal.revoke();
    }
}
