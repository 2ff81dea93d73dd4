//! API server initialization

use std::net::SocketAddr;

use anyhow::{Context, Result};
use axum::Router;
use tokio::net::TcpListener;

use super::middleware;
use super::routes::pipeline::{self, PipelineApiState};
use crate::core::CoreApp;

pub struct ApiServer {
    app: CoreApp,
}

impl ApiServer {
    pub fn new(app: CoreApp) -> Self {
        Self { app }
    }

    /// Serve until shutdown is triggered. Returns CoreApp for graceful shutdown.
    pub async fn start(self) -> Result<CoreApp> {
        let Self { app } = self;

        let shutdown = app.shutdown.clone();

        let host = app.config.server.host.clone();
        let port = app.config.server.port;
        let addr = SocketAddr::new(
            host.parse()
                .with_context(|| format!("Invalid listen host: {}", host))?,
            port,
        );

        let router = router(PipelineApiState {
            orchestrator: app.orchestrator.clone(),
            shutdown: shutdown.token().clone(),
            request_timeout: app.config.pipeline.request_timeout,
        });

        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind {}", addr))?;
        tracing::info!(%addr, "Listening");

        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown.wait())
        .await?;

        Ok(app)
    }
}

/// Full application router: the pipeline route plus 404 fallback and request tracing
pub fn router(state: PipelineApiState) -> Router {
    pipeline::routes(state)
        .fallback(middleware::handle_404)
        .layer(middleware::trace_layer())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tokio_util::sync::CancellationToken;
    use tower::ServiceExt;

    use crate::data::telemetry::{MemoryExporter, ServiceInfo, TracingClient};
    use crate::domain::pipeline::{FixedSimulation, Orchestrator};

    fn test_router() -> (Router, Arc<MemoryExporter>) {
        let exporter = Arc::new(MemoryExporter::new());
        let client = TracingClient::with_exporter(
            ServiceInfo {
                name: "cdnn".to_string(),
                environment: "test".to_string(),
            },
            exporter.clone(),
        );
        let router = router(PipelineApiState {
            orchestrator: Orchestrator::new(client, Arc::new(FixedSimulation::new())),
            shutdown: CancellationToken::new(),
            request_timeout: None,
        });
        (router, exporter)
    }

    #[tokio::test]
    async fn test_unknown_path_is_404_without_transaction() {
        let (router, exporter) = test_router();
        let response = router
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(exporter.transactions_started(), 0);
    }

    #[tokio::test]
    async fn test_root_path_runs_pipeline() {
        let (router, exporter) = test_router();
        let response = router
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(exporter.transactions().len(), 1);
    }
}
