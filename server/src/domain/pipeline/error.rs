//! Pipeline error types

use thiserror::Error;

/// Failure of a single stage
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StageError {
    #[error("operation cancelled")]
    Cancelled,

    #[error("external API timeout after {after_secs} seconds")]
    ExternalTimeout { after_secs: u64 },
}

/// Critical failure: aborts the pipeline and fails the transaction
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    #[error("data loading failed: {0}")]
    DataLoading(#[source] StageError),

    #[error("ML inference failed: {0}")]
    Inference(#[source] StageError),
}

/// Tolerated failure of the external call. Captured, never returned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("API call failed: {0}")]
pub struct ExternalCallError(#[source] pub StageError);
