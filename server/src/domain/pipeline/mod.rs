//! CDNN pipeline
//!
//! Three stages run in order for every request:
//! - data acquisition (chunked, observes cancellation)
//! - model inference
//! - external dependency call (failures are tolerated)

mod error;
mod orchestrator;
mod result;
mod simulation;
mod stages;

pub use error::{ExternalCallError, PipelineError, StageError};
pub use orchestrator::{Orchestrator, PIPELINE_TRANSACTION, REQUEST_KIND};
pub use result::{PipelineResult, PipelineStatus};
#[cfg(test)]
pub use simulation::FixedSimulation;
pub use simulation::{EXTERNAL_FAILURE_RATE, RandomSimulation, Simulation};
pub use stages::{DATA_CHUNKS, FRAMEWORK, MODEL_NAME, Stages};
