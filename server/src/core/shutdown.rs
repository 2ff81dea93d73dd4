//! Centralized shutdown management

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::constants::SHUTDOWN_TIMEOUT_SECS;
use crate::data::telemetry::TracingClient;

/// Coordinates graceful shutdown.
///
/// Request tokens are children of the shutdown token, so triggering shutdown
/// cancels every in-flight pipeline at its next chunk boundary.
#[derive(Clone)]
pub struct ShutdownService {
    token: CancellationToken,
    client: TracingClient,
}

impl ShutdownService {
    pub fn new(client: TracingClient) -> Self {
        Self {
            token: CancellationToken::new(),
            client,
        }
    }

    /// Root token that per-request tokens derive from
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Trigger shutdown
    pub fn trigger(&self) {
        self.token.cancel();
    }

    /// Check if shutdown was triggered
    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Trigger shutdown and flush the trace exporter
    ///
    /// Called after the HTTP server has drained, so every transaction is
    /// already closed and queued when the flush runs.
    pub async fn shutdown(&self) {
        tracing::debug!("Initiating graceful shutdown...");
        self.trigger();

        tracing::debug!(backend = self.client.backend_name(), "Flushing trace exporter...");
        let client = self.client.clone();
        let flush = tokio::task::spawn_blocking(move || client.shutdown());

        let timeout = Duration::from_secs(SHUTDOWN_TIMEOUT_SECS);
        match tokio::time::timeout(timeout, flush).await {
            Ok(Ok(Ok(()))) => tracing::debug!("Trace exporter flushed"),
            Ok(Ok(Err(e))) => tracing::warn!(error = %e, "Trace exporter shutdown failed"),
            Ok(Err(e)) => tracing::warn!(error = %e, "Trace exporter flush task panicked"),
            Err(_) => tracing::warn!(
                timeout_secs = timeout.as_secs(),
                "Timeout flushing trace exporter"
            ),
        }

        tracing::debug!("Shutdown complete");
    }

    /// Wait for shutdown signal (for use with axum graceful shutdown)
    /// Returns an owned future that can be passed to graceful_shutdown
    pub fn wait(&self) -> impl std::future::Future<Output = ()> + Send + 'static {
        self.token.clone().cancelled_owned()
    }

    /// Install OS signal handlers and auto-trigger on Ctrl+C/SIGTERM
    pub fn install_signal_handlers(&self) {
        let service = self.clone();
        tokio::spawn(async move {
            let ctrl_c = async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::error!(error = %e, "Failed to install Ctrl+C handler");
                    std::future::pending::<()>().await;
                }
            };

            #[cfg(unix)]
            let terminate = async {
                match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                    Ok(mut signal) => {
                        signal.recv().await;
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to install SIGTERM handler");
                        std::future::pending::<()>().await;
                    }
                }
            };

            #[cfg(not(unix))]
            let terminate = std::future::pending::<()>();

            tokio::select! {
                _ = ctrl_c => tracing::debug!("Received Ctrl+C, shutting down"),
                _ = terminate => tracing::debug!("Received SIGTERM, shutting down"),
            }

            service.trigger();
        });
    }
}
