//! Pipeline endpoint
//!
//! One method-agnostic route. Every request opens an `http-request`
//! transaction, runs the pipeline inside it and maps the outcome to a JSON
//! envelope (200) or a plain-text error (500).

use std::time::Duration;

use axum::extract::State;
use axum::routing::any;
use axum::{Json, Router};
use tokio_util::sync::CancellationToken;

use crate::api::extractors::RequestMeta;
use crate::api::types::{ApiError, PipelineResponse};
use crate::core::constants::PIPELINE_PATH;
use crate::domain::pipeline::{Orchestrator, REQUEST_KIND};

pub const HTTP_TRANSACTION: &str = "http-request";

// ============================================================================
// State
// ============================================================================

#[derive(Clone)]
pub struct PipelineApiState {
    pub orchestrator: Orchestrator,
    /// Parent of every request token; cancelled on server shutdown
    pub shutdown: CancellationToken,
    pub request_timeout: Option<Duration>,
}

pub fn routes(state: PipelineApiState) -> Router<()> {
    Router::new()
        .route(PIPELINE_PATH, any(run_pipeline))
        .with_state(state)
}

// ============================================================================
// Handlers
// ============================================================================

async fn run_pipeline(
    State(state): State<PipelineApiState>,
    meta: RequestMeta,
) -> Result<Json<PipelineResponse>, ApiError> {
    handle_request(&state, meta).await
}

/// Run one pipeline invocation for a request.
///
/// The request token is cancelled by server shutdown, by the request deadline,
/// or when this future is dropped because the client went away.
pub async fn handle_request(
    state: &PipelineApiState,
    meta: RequestMeta,
) -> Result<Json<PipelineResponse>, ApiError> {
    tracing::info!(
        remote_addr = ?meta.remote_addr,
        method = %meta.method,
        target = %meta.target,
        "HTTP request received"
    );

    let mut tx = state
        .orchestrator
        .client()
        .start_transaction(HTTP_TRANSACTION, REQUEST_KIND);
    tx.set_label("http_method", meta.method.as_str());
    tx.set_label("http_url", meta.target.as_str());
    tx.set_label("http_user_agent", meta.user_agent.as_str());

    let cancel = state.shutdown.child_token();
    let _cancel_on_drop = cancel.clone().drop_guard();
    if let Some(timeout) = state.request_timeout {
        spawn_deadline(cancel.clone(), timeout);
    }

    let outcome = state.orchestrator.run_in(&mut tx, &cancel).await;
    tx.end();

    match outcome {
        Ok(result) => {
            tracing::info!(duration_ms = result.duration_ms, "HTTP request completed");
            Ok(Json(PipelineResponse::new(result)))
        }
        Err(e) => {
            tracing::error!(error = %e, "Pipeline request failed");
            Err(e.into())
        }
    }
}

/// Cancel `token` once `timeout` elapses, unless it is cancelled first
fn spawn_deadline(token: CancellationToken, timeout: Duration) {
    tokio::spawn(async move {
        tokio::select! {
            _ = token.cancelled() => {}
            _ = tokio::time::sleep(timeout) => {
                tracing::warn!(timeout_secs = timeout.as_secs_f64(), "Request deadline exceeded");
                token.cancel();
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode, header};
    use tower::ServiceExt;

    use crate::data::telemetry::{
        LabelValue, MemoryExporter, ServiceInfo, TracingClient, TransactionResult,
    };
    use crate::domain::pipeline::{FixedSimulation, RandomSimulation, Simulation};

    fn setup(
        sim: Arc<dyn Simulation>,
        request_timeout: Option<Duration>,
    ) -> (Router, PipelineApiState, Arc<MemoryExporter>) {
        let exporter = Arc::new(MemoryExporter::new());
        let client = TracingClient::with_exporter(
            ServiceInfo {
                name: "cdnn".to_string(),
                environment: "test".to_string(),
            },
            exporter.clone(),
        );
        let state = PipelineApiState {
            orchestrator: Orchestrator::new(client, sim),
            shutdown: CancellationToken::new(),
            request_timeout,
        };
        (routes(state.clone()), state, exporter)
    }

    fn request(method: &str, agent: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri("/")
            .header(header::USER_AGENT, agent)
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_success_returns_json_envelope() {
        let (router, _, exporter) = setup(Arc::new(FixedSimulation::new()), None);

        let response = router.oneshot(request("GET", "curl/8.0")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response.headers()[header::CONTENT_TYPE].to_str().unwrap();
        assert_eq!(content_type, "application/json");

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["message"], "CDNN processed successfully");
        assert_eq!(json["result"]["status"], "success");
        assert_eq!(json["result"]["loaded_records"], 2500);
        assert_eq!(json["result"]["batch_size"], 48);
        assert_eq!(json["result"]["accuracy"], 0.9);

        let txs = exporter.transactions();
        assert_eq!(txs.len(), 1);
        let tx = &txs[0];
        assert_eq!(tx.name, HTTP_TRANSACTION);
        assert_eq!(tx.result, Some(TransactionResult::Success));
        assert_eq!(tx.label("http_method"), Some(&LabelValue::from("GET")));
        assert_eq!(tx.label("http_url"), Some(&LabelValue::from("/")));
        assert_eq!(
            tx.label("http_user_agent"),
            Some(&LabelValue::from("curl/8.0"))
        );
        assert_eq!(exporter.open_spans(), 0);
        assert_eq!(exporter.open_transactions(), 0);
    }

    #[tokio::test]
    async fn test_route_accepts_any_method() {
        let (router, _, _) = setup(Arc::new(FixedSimulation::new()), None);
        for method in ["POST", "PUT", "DELETE"] {
            let response = router
                .clone()
                .oneshot(request(method, "test"))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }
    }

    #[tokio::test]
    async fn test_shutdown_fails_request_with_plain_text() {
        let (router, state, exporter) = setup(Arc::new(FixedSimulation::new()), None);
        state.shutdown.cancel();

        let response = router.oneshot(request("GET", "test")).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"data loading failed: operation cancelled");

        let txs = exporter.transactions();
        assert_eq!(txs[0].result, Some(TransactionResult::Failure));
        assert_eq!(exporter.open_spans(), 0);
    }

    #[tokio::test]
    async fn test_deadline_cancels_acquisition() {
        // Chunks take 20-40ms at this scale, so the 5ms deadline fires during
        // the first chunk and acquisition stops at the next boundary.
        let (router, _, exporter) = setup(
            Arc::new(RandomSimulation::new(0.01)),
            Some(Duration::from_millis(5)),
        );

        let response = router.oneshot(request("GET", "test")).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let spans = exporter.spans();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].name, "data_loading");
        assert!(spans[0].labels.get("loaded_records").is_none());
    }

    #[tokio::test]
    async fn test_client_disconnect_records_failed_transaction() {
        // Dropping the handler future mid-acquisition is what axum does when
        // the connection goes away.
        let (_, state, exporter) = setup(Arc::new(RandomSimulation::new(0.01)), None);
        let meta = RequestMeta {
            method: axum::http::Method::GET,
            target: "/".to_string(),
            user_agent: "test".to_string(),
            remote_addr: None,
        };

        let outcome =
            tokio::time::timeout(Duration::from_millis(10), handle_request(&state, meta)).await;
        assert!(outcome.is_err());

        let txs = exporter.transactions();
        assert_eq!(txs.len(), 1);
        assert_eq!(txs[0].name, HTTP_TRANSACTION);
        assert_eq!(txs[0].result, Some(TransactionResult::Failure));
        assert_eq!(exporter.spans().len(), 1);
        assert_eq!(exporter.open_spans(), 0);
        assert_eq!(exporter.open_transactions(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_requests_do_not_share_labels() {
        let (router, _, exporter) = setup(Arc::new(FixedSimulation::new()), None);

        let handles: Vec<_> = (0..50)
            .map(|i| {
                let router = router.clone();
                tokio::spawn(async move {
                    router
                        .oneshot(request("GET", &format!("agent-{i}")))
                        .await
                        .unwrap()
                        .status()
                })
            })
            .collect();
        for status in futures::future::join_all(handles).await {
            assert_eq!(status.unwrap(), StatusCode::OK);
        }

        let txs = exporter.transactions();
        assert_eq!(txs.len(), 50);
        let mut agents: Vec<_> = txs
            .iter()
            .map(|tx| {
                tx.label("http_user_agent")
                    .and_then(|v| v.as_str())
                    .unwrap()
                    .to_string()
            })
            .collect();
        agents.sort();
        agents.dedup();
        assert_eq!(agents.len(), 50);

        for tx in &txs {
            assert_eq!(tx.labels.len(), 5);
            assert_eq!(exporter.spans_of(tx.id).len(), 3);
        }
        assert_eq!(exporter.open_spans(), 0);
    }
}
