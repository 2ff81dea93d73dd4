//! Pipeline orchestrator
//!
//! Runs acquisition, inference and the external call in order inside one
//! transaction. Acquisition and inference failures abort the run and fail the
//! transaction. An external call failure is captured and logged, then the run
//! continues as a success.

use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;

use super::error::{ExternalCallError, PipelineError};
use super::result::{PipelineResult, PipelineStatus};
use super::simulation::Simulation;
use super::stages::Stages;
use crate::data::telemetry::{EventLevel, TracingClient, Transaction, TransactionResult};

pub const PIPELINE_TRANSACTION: &str = "cdnn-pipeline";
pub const REQUEST_KIND: &str = "request";
const PIPELINE_USER: &str = "system";

// =============================================================================
// Lifecycle
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PipelineState {
    Created,
    AcquiringData,
    Inferring,
    CallingExternal,
    Succeeded,
    Failed,
}

impl PipelineState {
    fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::AcquiringData => "acquiring_data",
            Self::Inferring => "inferring",
            Self::CallingExternal => "calling_external",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }

    fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    fn can_advance_to(self, next: Self) -> bool {
        match (self, next) {
            (Self::Created, Self::AcquiringData)
            | (Self::AcquiringData, Self::Inferring)
            | (Self::Inferring, Self::CallingExternal)
            | (Self::CallingExternal, Self::Succeeded) => true,
            (from, Self::Failed) => !from.is_terminal() && from != Self::Created,
            _ => false,
        }
    }

    fn advance(&mut self, next: Self) {
        debug_assert!(
            self.can_advance_to(next),
            "invalid pipeline transition {} -> {}",
            self.as_str(),
            next.as_str()
        );
        tracing::trace!(from = self.as_str(), to = next.as_str(), "Pipeline state");
        *self = next;
    }
}

// =============================================================================
// Orchestrator
// =============================================================================

/// Runs the three-stage pipeline against an injected tracing client
#[derive(Clone)]
pub struct Orchestrator {
    client: TracingClient,
    stages: Stages,
}

impl Orchestrator {
    pub fn new(client: TracingClient, sim: Arc<dyn Simulation>) -> Self {
        Self {
            client,
            stages: Stages::new(sim),
        }
    }

    pub fn client(&self) -> &TracingClient {
        &self.client
    }

    /// Run the pipeline inside its own `cdnn-pipeline` transaction
    pub async fn run(&self, cancel: &CancellationToken) -> Result<PipelineResult, PipelineError> {
        let mut tx = self
            .client
            .start_transaction(PIPELINE_TRANSACTION, REQUEST_KIND);
        let result = self.run_in(&mut tx, cancel).await;
        tx.end();
        result
    }

    /// Run the pipeline inside a transaction owned by the caller.
    ///
    /// Sets the transaction result exactly once. The caller ends the
    /// transaction.
    pub async fn run_in(
        &self,
        tx: &mut Transaction,
        cancel: &CancellationToken,
    ) -> Result<PipelineResult, PipelineError> {
        let service = self.client.service();
        tx.set_user(PIPELINE_USER);
        tx.set_label("service", service.name.as_str());
        tx.set_label("environment", service.environment.as_str());

        let start = Instant::now();
        let mut state = PipelineState::Created;

        state.advance(PipelineState::AcquiringData);
        tracing::info!("Step 1: starting data loading");
        let loaded_records = match self.stages.load_data(tx, cancel).await {
            Ok(records) => records,
            Err(e) => return Err(fail(tx, &mut state, PipelineError::DataLoading(e))),
        };
        tracing::info!(records = loaded_records, "Data loaded");

        state.advance(PipelineState::Inferring);
        let batch_size = self.stages.draw_batch_size();
        tracing::info!(batch_size, "Step 2: starting ML inference");
        let accuracy = match self.stages.run_inference(tx, batch_size, cancel).await {
            Ok(accuracy) => accuracy,
            Err(e) => return Err(fail(tx, &mut state, PipelineError::Inference(e))),
        };
        tracing::info!(
            samples = batch_size,
            accuracy = %format!("{:.2}%", accuracy * 100.0),
            "Inference complete"
        );

        state.advance(PipelineState::CallingExternal);
        tracing::info!("Step 3: calling external API");
        if let Err(e) = self.stages.call_external(tx).await {
            let err = ExternalCallError(e);
            tracing::warn!(error = %err, "External call failed (non-critical)");
            self.client.capture_error(&err, Some(tx.context()));
        }

        let result = PipelineResult {
            status: PipelineStatus::Success,
            duration_ms: start.elapsed().as_millis() as u64,
            loaded_records,
            batch_size: Some(batch_size),
            accuracy,
        };

        state.advance(PipelineState::Succeeded);
        tx.set_result(TransactionResult::Success);
        tracing::info!(duration_ms = result.duration_ms, "Pipeline completed");

        self.client.capture_message(
            format!(
                "Pipeline completed with {} records, accuracy {:.2}%",
                loaded_records,
                accuracy * 100.0
            ),
            EventLevel::Info,
            Some(tx.context()),
        );

        Ok(result)
    }
}

/// Mark the transaction failed at the current stage
fn fail(tx: &mut Transaction, state: &mut PipelineState, err: PipelineError) -> PipelineError {
    tx.set_label("failed_stage", state.as_str());
    state.advance(PipelineState::Failed);
    tx.set_result(TransactionResult::Failure);
    tracing::error!(error = %err, "Pipeline failed");
    err
}
