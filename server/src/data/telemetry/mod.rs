//! Telemetry module
//!
//! Distributed-tracing client with pluggable backends:
//! - Log (default) - finished records become structured log events
//! - OTLP (optional) - records are replayed into OpenTelemetry and exported
//! - Memory - keeps records in process for inspection

mod client;
mod error;
mod exporter;
mod log;
mod memory;
mod model;
mod otlp;

use std::sync::Arc;

pub use client::{ServiceInfo, Span, TracingClient, Transaction};
pub use error::TelemetryError;
pub use exporter::TraceExporter;
pub use memory::MemoryExporter;
pub use model::{
    CapturedEvent, EventLevel, LabelValue, Labels, SpanId, SpanRecord, TraceContext, TraceId,
    TransactionRecord, TransactionResult,
};

use crate::core::config::{ApmBackend, ApmConfig};

impl TracingClient {
    /// Create the tracing client selected by configuration
    pub fn from_config(service: ServiceInfo, config: &ApmConfig) -> Result<Self, TelemetryError> {
        let exporter: Arc<dyn TraceExporter> = match config.backend {
            ApmBackend::Log => {
                tracing::debug!("Initializing log trace exporter");
                Arc::new(log::LogExporter)
            }
            ApmBackend::Otlp => {
                let url = config.server_url.as_deref().ok_or_else(|| {
                    TelemetryError::Config("server_url required for OTLP backend".into())
                })?;
                tracing::debug!(
                    server_url = url,
                    token = config.secret_token.is_some(),
                    "Initializing OTLP trace exporter"
                );
                Arc::new(otlp::OtlpExporter::new(
                    &service,
                    url,
                    config.secret_token.as_deref(),
                )?)
            }
        };

        Ok(Self::with_exporter(service, exporter))
    }
}
