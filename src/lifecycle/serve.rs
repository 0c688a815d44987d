//! Serve loop with bounded restarts.
//!
//! # States
//! ```text
//! Idle → Starting [→ Running] → (Crashed → Retrying → Starting)* → Stopped
//!                                                                 → Failed
//! ```
//!
//! # State Transitions
//! - Starting → Running: the attempt reported through [`Readiness`] that it accepts connections
//! - Starting/Running → Stopped: the attempt returned cleanly or shutdown was requested
//! - Starting/Running → Crashed: the attempt failed while no shutdown was pending
//! - Crashed → Retrying: the retry policy grants another attempt
//! - Crashed → Failed: the retry budget is exhausted, the error is returned
//! - Retrying → Stopped: shutdown arrived during the back-off sleep

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

use crate::lifecycle::shutdown::ShutdownSignal;
use crate::net::tls::TlsError;
use crate::net::ListenerError;
use crate::observability::metrics;
use crate::resilience::{RetryDecision, RetryPolicy, RetryState};

/// Why a single serve attempt ended badly.
#[derive(Debug, thiserror::Error)]
pub enum ServeFailure {
    #[error(transparent)]
    Bind(#[from] ListenerError),

    #[error("TLS setup failed: {0}")]
    Tls(#[from] TlsError),

    #[error("server stopped unexpectedly: {0}")]
    Serve(#[source] std::io::Error),
}

/// Unrecoverable serve error handed back to the host.
#[derive(Debug, thiserror::Error)]
pub enum ServeError {
    #[error("server failed after {retries} retries: {source}")]
    RetriesExhausted {
        retries: u32,
        #[source]
        source: ServeFailure,
    },
}

/// Observable state of the serve loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ServeState {
    Idle,
    Starting,
    Running,
    Crashed,
    Retrying,
    Stopped,
    Failed,
}

/// Handed to each attempt so it can report that the listener is up.
#[derive(Debug, Clone)]
pub struct Readiness {
    state: Arc<watch::Sender<ServeState>>,
}

impl Readiness {
    /// Move `Starting` to `Running`. Has no effect in any other state.
    pub fn mark_running(&self) {
        let changed = self.state.send_if_modified(|state| {
            if *state == ServeState::Starting {
                *state = ServeState::Running;
                true
            } else {
                false
            }
        });
        if changed {
            tracing::trace!(from = ?ServeState::Starting, to = ?ServeState::Running, "Serve state changed");
        }
    }
}

/// Drives repeated serve attempts under a [`RetryPolicy`].
#[derive(Debug)]
pub struct ServeLifecycle {
    policy: RetryPolicy,
    shutdown_grace: Duration,
    state: Arc<watch::Sender<ServeState>>,
}

impl ServeLifecycle {
    pub fn new(policy: RetryPolicy) -> Self {
        let (state, _) = watch::channel(ServeState::Idle);
        Self {
            policy,
            shutdown_grace: Duration::from_secs(5),
            state: Arc::new(state),
        }
    }

    /// How long in-flight connections may drain after shutdown.
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn state(&self) -> ServeState {
        *self.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ServeState> {
        self.state.subscribe()
    }

    fn transition(&self, next: ServeState) {
        let prev = self.state.send_replace(next);
        if prev != next {
            tracing::trace!(from = ?prev, to = ?next, "Serve state changed");
        }
    }

    /// Run `serve` until it stops cleanly, shutdown is requested, or the
    /// retry budget runs out.
    ///
    /// `serve` is called once per attempt with its own copy of the shutdown
    /// signal and a [`Readiness`]. It should bind, call
    /// [`Readiness::mark_running`] once it accepts connections, and return
    /// `Ok(())` after draining when the signal fires.
    pub async fn run<F, Fut>(&self, mut serve: F, mut shutdown: ShutdownSignal) -> Result<(), ServeError>
    where
        F: FnMut(ShutdownSignal, Readiness) -> Fut,
        Fut: Future<Output = Result<(), ServeFailure>>,
    {
        let mut retries = RetryState::default();

        loop {
            if shutdown.is_triggered() {
                self.transition(ServeState::Stopped);
                return Ok(());
            }

            self.transition(ServeState::Starting);
            let started_at = Instant::now();
            let ready = Readiness {
                state: self.state.clone(),
            };
            let serving = serve(shutdown.clone(), ready);
            tokio::pin!(serving);

            let finished = tokio::select! {
                result = &mut serving => Some(result),
                _ = shutdown.recv() => None,
            };
            let outcome = match finished {
                Some(result) => result,
                None => match tokio::time::timeout(self.shutdown_grace, &mut serving).await {
                    Ok(result) => result,
                    Err(_) => {
                        tracing::warn!(
                            grace_ms = self.shutdown_grace.as_millis() as u64,
                            "Server did not drain in time, closing remaining connections"
                        );
                        Ok(())
                    }
                },
            };

            if shutdown.is_triggered() {
                if let Err(failure) = &outcome {
                    tracing::debug!(error = %failure, "Serve error during shutdown ignored");
                }
                self.transition(ServeState::Stopped);
                return Ok(());
            }

            let failure = match outcome {
                Ok(()) => {
                    self.transition(ServeState::Stopped);
                    return Ok(());
                }
                Err(failure) => failure,
            };

            self.transition(ServeState::Crashed);
            let uptime = started_at.elapsed();

            match self.policy.on_failure(&mut retries, uptime) {
                RetryDecision::Retry { attempt, delay } => {
                    tracing::error!(
                        error = %failure,
                        retry = attempt,
                        max_retries = self.policy.max_retries,
                        uptime_ms = uptime.as_millis() as u64,
                        "Server stopped unexpectedly, retrying..."
                    );
                    metrics::record_serve_restart();
                    self.transition(ServeState::Retrying);

                    let interrupted = tokio::select! {
                        _ = tokio::time::sleep(delay) => false,
                        _ = shutdown.recv() => true,
                    };
                    if interrupted {
                        self.transition(ServeState::Stopped);
                        return Ok(());
                    }
                }
                RetryDecision::GiveUp => {
                    self.transition(ServeState::Failed);
                    return Err(ServeError::RetriesExhausted {
                        retries: retries.retry_count,
                        source: failure,
                    });
                }
            }
        }
    }
}

impl Default for ServeLifecycle {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::shutdown::Shutdown;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn boom() -> ServeFailure {
        ServeFailure::Serve(std::io::Error::other("listener died"))
    }

    #[tokio::test(start_paused = true)]
    async fn test_short_failures_become_fatal() {
        let lifecycle = ServeLifecycle::default();
        let shutdown = Shutdown::new();
        let calls = Arc::new(AtomicU32::new(0));

        let c = calls.clone();
        let result = lifecycle
            .run(
                move |_signal, _ready| {
                    let c = c.clone();
                    async move {
                        c.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_secs(2)).await;
                        Err::<(), _>(boom())
                    }
                },
                shutdown.subscribe(),
            )
            .await;

        assert!(matches!(result, Err(ServeError::RetriesExhausted { retries: 3, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(lifecycle.state(), ServeState::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_long_runs_never_become_fatal() {
        let lifecycle = ServeLifecycle::default();
        let shutdown = Shutdown::new();
        let calls = Arc::new(AtomicU32::new(0));

        let c = calls.clone();
        let result = lifecycle
            .run(
                move |_signal, _ready| {
                    let c = c.clone();
                    async move {
                        let n = c.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_secs(6)).await;
                        if n < 8 {
                            Err(boom())
                        } else {
                            Ok(())
                        }
                    }
                },
                shutdown.subscribe(),
            )
            .await;

        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 9);
        assert_eq!(lifecycle.state(), ServeState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_between_attempts() {
        let lifecycle = ServeLifecycle::default();
        let shutdown = Shutdown::new();
        let starts = Arc::new(std::sync::Mutex::new(Vec::new()));

        let s = starts.clone();
        let _ = lifecycle
            .run(
                move |_signal, _ready| {
                    s.lock().unwrap().push(Instant::now());
                    async { Err::<(), _>(boom()) }
                },
                shutdown.subscribe(),
            )
            .await;

        let starts = starts.lock().unwrap();
        assert_eq!(starts.len(), 4);
        for pair in starts.windows(2) {
            assert_eq!(pair[1] - pair[0], Duration::from_secs(1));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_starting_until_attempt_is_ready() {
        let lifecycle = Arc::new(ServeLifecycle::default());
        let shutdown = Shutdown::new();
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));

        let l = lifecycle.clone();
        let s = seen.clone();
        let _ = lifecycle
            .run(
                move |_signal, _ready| {
                    let l = l.clone();
                    let s = s.clone();
                    async move {
                        // Bind fails before the attempt ever reports readiness.
                        s.lock().unwrap().push(l.state());
                        Err::<(), _>(boom())
                    }
                },
                shutdown.subscribe(),
            )
            .await;

        assert_eq!(*seen.lock().unwrap(), vec![ServeState::Starting; 4]);
        assert_eq!(lifecycle.state(), ServeState::Failed);

        let lifecycle = Arc::new(ServeLifecycle::default());
        let shutdown = Shutdown::new();
        let task = {
            let lifecycle = lifecycle.clone();
            let signal = shutdown.subscribe();
            tokio::spawn(async move {
                lifecycle
                    .run(
                        |signal: ShutdownSignal, ready: Readiness| async move {
                            tokio::time::sleep(Duration::from_secs(1)).await;
                            ready.mark_running();
                            signal.wait().await;
                            Ok(())
                        },
                        signal,
                    )
                    .await
            })
        };

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(lifecycle.state(), ServeState::Starting);
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(lifecycle.state(), ServeState::Running);

        shutdown.trigger();
        assert!(task.await.unwrap().is_ok());
        assert_eq!(lifecycle.state(), ServeState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_interrupts_backoff() {
        let policy = RetryPolicy {
            backoff: crate::resilience::Backoff::Fixed(Duration::from_secs(60)),
            ..RetryPolicy::default()
        };
        let lifecycle = Arc::new(ServeLifecycle::new(policy));
        let shutdown = Shutdown::new();
        let calls = Arc::new(AtomicU32::new(0));

        let task = {
            let lifecycle = lifecycle.clone();
            let c = calls.clone();
            let signal = shutdown.subscribe();
            tokio::spawn(async move {
                lifecycle
                    .run(
                        move |_signal, _ready| {
                            c.fetch_add(1, Ordering::SeqCst);
                            async { Err::<(), _>(boom()) }
                        },
                        signal,
                    )
                    .await
            })
        };

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(lifecycle.state(), ServeState::Retrying);
        shutdown.trigger();

        let result = task.await.unwrap();
        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(lifecycle.state(), ServeState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_while_running_is_clean() {
        let lifecycle = Arc::new(ServeLifecycle::default());
        let shutdown = Shutdown::new();

        let task = {
            let lifecycle = lifecycle.clone();
            let signal = shutdown.subscribe();
            tokio::spawn(async move {
                lifecycle
                    .run(
                        |signal: ShutdownSignal, ready: Readiness| async move {
                            ready.mark_running();
                            signal.wait().await;
                            Ok(())
                        },
                        signal,
                    )
                    .await
            })
        };

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(lifecycle.state(), ServeState::Running);
        shutdown.trigger();

        assert!(task.await.unwrap().is_ok());
        assert_eq!(lifecycle.state(), ServeState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stuck_drain_is_cut_after_grace() {
        let lifecycle = ServeLifecycle::default().with_shutdown_grace(Duration::from_secs(2));
        let shutdown = Shutdown::new();
        shutdown.trigger();

        // Pending shutdown before the first attempt: nothing is started.
        let result = lifecycle
            .run(|_signal, _ready| std::future::pending::<Result<(), ServeFailure>>(), shutdown.subscribe())
            .await;
        assert!(result.is_ok());
        assert_eq!(lifecycle.state(), ServeState::Stopped);

        let lifecycle = Arc::new(ServeLifecycle::default().with_shutdown_grace(Duration::from_secs(2)));
        let shutdown = Shutdown::new();
        let task = {
            let lifecycle = lifecycle.clone();
            let signal = shutdown.subscribe();
            tokio::spawn(async move {
                lifecycle
                    .run(|_signal, _ready| std::future::pending::<Result<(), ServeFailure>>(), signal)
                    .await
            })
        };
        tokio::time::sleep(Duration::from_secs(1)).await;
        shutdown.trigger();
        let started = Instant::now();
        assert!(task.await.unwrap().is_ok());
        assert!(started.elapsed() >= Duration::from_secs(2));
        assert_eq!(lifecycle.state(), ServeState::Stopped);
    }
}
