//! Graceful shutdown coordination.
//!
//! A single [`tokio_util::sync::CancellationToken`] is cancelled when
//! SIGTERM or SIGINT arrives. The HTTP server stops accepting connections
//! and in-flight requests get `shutdown.timeout_seconds` to finish.

use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Coordinates graceful shutdown of the dashboard server.
#[derive(Clone)]
pub struct ShutdownCoordinator {
    token: CancellationToken,
    timeout_seconds: u64,
}

impl ShutdownCoordinator {
    /// Create a new coordinator with the given drain timeout.
    pub fn new(timeout_seconds: u64) -> Self {
        Self {
            token: CancellationToken::new(),
            timeout_seconds,
        }
    }

    /// Get a clone of the cancellation token.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Returns `true` if a shutdown has been requested.
    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Trigger the shutdown signal.
    pub fn trigger(&self) {
        self.token.cancel();
    }

    /// Resolves once shutdown was requested and the drain timeout expired.
    pub async fn drain_deadline(&self) {
        self.token.cancelled().await;
        tokio::time::sleep(Duration::from_secs(self.timeout_seconds)).await;
        warn!(
            timeout_seconds = self.timeout_seconds,
            "Shutdown timeout expired with requests still in flight"
        );
    }
}

/// Returns a future that resolves when a shutdown signal is received.
///
/// On Unix this listens for both SIGTERM and SIGINT.
/// On other platforms it listens for Ctrl-C only.
pub async fn shutdown_signal(coordinator: ShutdownCoordinator) {
    let token = coordinator.token();

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm =
            signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        let mut sigint = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Shutdown signal received (SIGTERM)");
            }
            _ = sigint.recv() => {
                info!("Shutdown signal received (SIGINT)");
            }
            _ = token.cancelled() => {
                info!("Shutdown signal received (token cancelled)");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received (Ctrl-C)");
            }
            _ = token.cancelled() => {
                info!("Shutdown signal received (token cancelled)");
            }
        }
    }

    coordinator.trigger();
}
