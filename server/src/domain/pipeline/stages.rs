//! Stage executors
//!
//! Each stage opens its own span on the caller's transaction and closes it on
//! every exit path. Early returns rely on the span handle's drop.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::error::StageError;
use super::simulation::Simulation;
use crate::data::telemetry::Transaction;

/// Sequential chunks the acquisition stage is split into
pub const DATA_CHUNKS: usize = 5;

pub const MODEL_NAME: &str = "cdnn-rs-v1.0";
pub const FRAMEWORK: &str = "tensorflow-rs";

const MODEL_LOAD_LATENCY: Duration = Duration::from_secs(2);
const POST_PROCESS_LATENCY: Duration = Duration::from_millis(500);
const RESPONSE_PROCESS_LATENCY: Duration = Duration::from_millis(500);
const EXTERNAL_TIMEOUT_SECS: u64 = 30;

/// The three pipeline stages, sharing one simulation source
#[derive(Clone)]
pub struct Stages {
    sim: Arc<dyn Simulation>,
}

impl Stages {
    pub fn new(sim: Arc<dyn Simulation>) -> Self {
        Self { sim }
    }

    /// Draw the batch size fed to inference
    pub fn draw_batch_size(&self) -> u32 {
        self.sim.batch_size()
    }

    /// Load records in chunks, checking for cancellation before each chunk
    pub async fn load_data(
        &self,
        tx: &Transaction,
        cancel: &CancellationToken,
    ) -> Result<u64, StageError> {
        let mut span = tx.start_span("data_loading", "app");

        let total_records = self.sim.total_records();
        span.set_label("total_records", total_records);

        for chunk in 0..DATA_CHUNKS {
            if cancel.is_cancelled() {
                tracing::debug!(chunk, "Data loading cancelled");
                return Err(StageError::Cancelled);
            }

            self.sim.wait(self.sim.chunk_latency(chunk)).await;

            let progress = (chunk + 1) as f64 / DATA_CHUNKS as f64 * 100.0;
            span.set_label("progress_percent", progress);
            tracing::debug!(progress = %format!("{progress:.1}%"), "Data loading progress");
        }

        span.set_label("loaded_records", total_records);
        span.end();
        Ok(total_records)
    }

    /// Run simulated model inference and return its accuracy
    pub async fn run_inference(
        &self,
        tx: &Transaction,
        batch_size: u32,
        cancel: &CancellationToken,
    ) -> Result<f64, StageError> {
        let mut span = tx.start_span("ml_inference", "ml");
        span.set_label("model_name", MODEL_NAME);
        span.set_label("framework", FRAMEWORK);
        span.set_label("batch_size", batch_size);
        span.set_label(
            "gpu_utilization",
            format!("{:.1}%", self.sim.gpu_utilization()),
        );

        if cancel.is_cancelled() {
            return Err(StageError::Cancelled);
        }

        self.sim.wait(MODEL_LOAD_LATENCY).await;

        let inference_time = self.sim.inference_latency();
        self.sim.wait(inference_time).await;

        self.sim.wait(POST_PROCESS_LATENCY).await;

        let accuracy = self.sim.accuracy();
        span.set_label("accuracy", accuracy);
        span.set_label("inference_time_ms", inference_time.as_millis() as u64);
        span.end();
        Ok(accuracy)
    }

    /// Simulated round trip to the external dependency
    pub async fn call_external(&self, tx: &Transaction) -> Result<(), StageError> {
        let mut span = tx.start_span("external_api_call", "http");

        self.sim.wait(self.sim.network_latency()).await;
        self.sim.wait(RESPONSE_PROCESS_LATENCY).await;

        if self.sim.external_call_fails() {
            span.set_label("error_type", "timeout");
            span.end();
            return Err(StageError::ExternalTimeout {
                after_secs: EXTERNAL_TIMEOUT_SECS,
            });
        }

        let response_time = self.sim.response_time_secs();
        span.set_label("response_time_ms", response_time * 1000.0);
        span.set_label("status", "success");
        span.end();

        tracing::debug!(
            response_time = %format!("{response_time:.2}s"),
            "API call successful"
        );
        Ok(())
    }
}
