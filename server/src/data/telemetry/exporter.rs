//! Trace exporter trait definition
//!
//! Defines the seam between span/transaction handles and the tracing
//! backend. Implementations receive only finished records, so a backend
//! never observes a half-built span.
//!
//! Methods are synchronous because handles export from `Drop`. Backends
//! that talk to the network must buffer and ship in the background.

use super::error::TelemetryError;
use super::model::{CapturedEvent, SpanId, SpanRecord, TransactionRecord};

/// Trace exporter trait
///
/// Shared by every in-flight request, so implementations must tolerate
/// concurrent calls without mixing records of different transactions.
pub trait TraceExporter: Send + Sync {
    /// Backend name (for logging)
    fn backend_name(&self) -> &'static str;

    /// A transaction handle was opened
    fn transaction_started(&self, _id: SpanId) {}

    /// A span handle was opened
    fn span_started(&self, _id: SpanId) {}

    /// A span closed
    fn export_span(&self, span: SpanRecord);

    /// A transaction closed. Stage spans nest inside it, so they arrive first.
    fn export_transaction(&self, transaction: TransactionRecord);

    /// An error or message was captured
    fn export_event(&self, event: CapturedEvent);

    /// Flush buffered records and release backend resources
    fn shutdown(&self) -> Result<(), TelemetryError> {
        Ok(())
    }
}
