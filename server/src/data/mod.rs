//! Data layer
//!
//! - `telemetry` - tracing client, span handles and trace exporters

pub mod telemetry;

pub use telemetry::{TelemetryError, TracingClient};
