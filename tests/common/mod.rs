//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::time::Duration;

use http_host::config::{HttpServerConfig, PortConfig};
use http_host::extension::{Extension, ExtensionError, HttpServerExtension, HttpServerHandle};
use http_host::lifecycle::Shutdown;
use http_host::resilience::RetryPolicy;
use tokio::task::JoinHandle;

/// A running HTTP server extension on an ephemeral port.
pub struct TestServer {
    pub handle: HttpServerHandle,
    pub addr: SocketAddr,
    shutdown: Shutdown,
    task: JoinHandle<Result<(), ExtensionError>>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Trigger shutdown and wait for `run` to return.
    pub async fn stop(self) -> Result<(), ExtensionError> {
        self.shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(10), self.task)
            .await
            .expect("server did not stop in time")
            .expect("server task panicked")
    }
}

pub fn local_config(port: u16) -> HttpServerConfig {
    HttpServerConfig {
        host: "127.0.0.1".into(),
        port: Some(port),
        shutdown_grace_secs: 1,
        ..HttpServerConfig::default()
    }
}

/// Load and run an extension, returning its handle and the run task.
pub fn spawn_extension(
    config: HttpServerConfig,
    policy: RetryPolicy,
) -> (HttpServerHandle, Shutdown, JoinHandle<Result<(), ExtensionError>>) {
    let mut extension = HttpServerExtension::new(PortConfig::default()).with_retry_policy(policy);
    let handle = extension.load(config).expect("load http server extension");

    let shutdown = Shutdown::new();
    let signal = shutdown.subscribe();
    let task = tokio::spawn(async move { extension.run(signal).await });
    (handle, shutdown, task)
}

/// Start a server on `127.0.0.1:0` and wait until it accepts connections.
pub async fn start_server() -> TestServer {
    let (handle, shutdown, task) = spawn_extension(local_config(0), RetryPolicy::default());
    let addr = tokio::time::timeout(Duration::from_secs(5), handle.listening())
        .await
        .expect("server did not start listening")
        .expect("server dropped before listening");

    TestServer {
        handle,
        addr,
        shutdown,
        task,
    }
}

/// HTTP client that reports redirects instead of following them.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
