//! Log trace exporter
//!
//! Writes finished records as structured `tracing` events. Default backend
//! when no APM server is configured.

use super::exporter::TraceExporter;
use super::model::{CapturedEvent, EventLevel, Labels, SpanRecord, TransactionRecord};

pub struct LogExporter;

fn labels_json(labels: &Labels) -> String {
    serde_json::to_string(labels).unwrap_or_default()
}

impl TraceExporter for LogExporter {
    fn backend_name(&self) -> &'static str {
        "log"
    }

    fn export_span(&self, span: SpanRecord) {
        tracing::debug!(
            trace_id = %span.trace_id,
            span_id = %span.id,
            transaction_id = %span.transaction_id,
            span = %span.name,
            kind = %span.kind,
            duration_ms = span.duration.as_millis() as u64,
            labels = %labels_json(&span.labels),
            "Span finished"
        );
    }

    fn export_transaction(&self, transaction: TransactionRecord) {
        tracing::info!(
            trace_id = %transaction.trace_id,
            transaction_id = %transaction.id,
            transaction = %transaction.name,
            kind = %transaction.kind,
            result = transaction.result.map(|r| r.as_str()).unwrap_or("none"),
            spans = transaction.span_count,
            duration_ms = transaction.duration.as_millis() as u64,
            labels = %labels_json(&transaction.labels),
            "Transaction finished"
        );
    }

    fn export_event(&self, event: CapturedEvent) {
        let trace_id = event.context.map(|c| c.trace_id.to_string());
        let causes = event.causes.join(": ");
        match event.level {
            EventLevel::Error => tracing::error!(
                trace_id = trace_id.as_deref().unwrap_or("-"),
                causes = %causes,
                "Captured error: {}",
                event.message
            ),
            EventLevel::Info => tracing::info!(
                trace_id = trace_id.as_deref().unwrap_or("-"),
                "Captured event: {}",
                event.message
            ),
        }
    }
}
