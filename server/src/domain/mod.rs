//! Domain logic
//!
//! - `pipeline` - the instrumented three-stage CDNN pipeline

pub mod pipeline;

pub use pipeline::{Orchestrator, PipelineError, PipelineResult};
