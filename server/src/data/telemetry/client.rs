//! Tracing client and span handles
//!
//! `Transaction` and `Span` are RAII handles: `end()` consumes the handle,
//! and dropping an unended handle closes it. Either way the record reaches
//! the exporter exactly once, including when the owning future is cancelled.

use std::error::Error;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use chrono::{DateTime, Utc};

use super::error::TelemetryError;
use super::exporter::TraceExporter;
use super::model::{
    CapturedEvent, EventLevel, LabelValue, Labels, SpanId, SpanRecord, TraceContext, TraceId,
    TransactionRecord, TransactionResult,
};

/// Service identity attached to every transaction
#[derive(Debug, Clone)]
pub struct ServiceInfo {
    pub name: String,
    pub environment: String,
}

struct ClientInner {
    service: ServiceInfo,
    exporter: Arc<dyn TraceExporter>,
}

/// Entry point for creating transactions and capturing errors.
///
/// Cheap to clone; all clones share one exporter.
#[derive(Clone)]
pub struct TracingClient {
    inner: Arc<ClientInner>,
}

impl std::fmt::Debug for TracingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TracingClient")
            .field("service", &self.inner.service.name)
            .field("backend", &self.inner.exporter.backend_name())
            .finish()
    }
}

impl TracingClient {
    pub fn with_exporter(service: ServiceInfo, exporter: Arc<dyn TraceExporter>) -> Self {
        Self {
            inner: Arc::new(ClientInner { service, exporter }),
        }
    }

    pub fn service(&self) -> &ServiceInfo {
        &self.inner.service
    }

    pub fn backend_name(&self) -> &'static str {
        self.inner.exporter.backend_name()
    }

    /// Open a new root transaction
    pub fn start_transaction(&self, name: &str, kind: &str) -> Transaction {
        let ctx = TraceContext {
            trace_id: TraceId::random(),
            transaction_id: SpanId::random(),
        };
        self.inner.exporter.transaction_started(ctx.transaction_id);
        tracing::trace!(
            trace_id = %ctx.trace_id,
            transaction = name,
            "Transaction started"
        );

        Transaction {
            client: self.clone(),
            ctx,
            name: name.to_string(),
            kind: kind.to_string(),
            labels: Labels::new(),
            user: None,
            result: None,
            span_count: AtomicUsize::new(0),
            started_at: Utc::now(),
            start: Instant::now(),
            ended: false,
        }
    }

    /// Record an error, linked to a transaction when one is given
    pub fn capture_error(&self, err: &(dyn Error + 'static), context: Option<TraceContext>) {
        let mut causes = Vec::new();
        let mut source = err.source();
        while let Some(cause) = source {
            causes.push(cause.to_string());
            source = cause.source();
        }

        self.inner.exporter.export_event(CapturedEvent {
            level: EventLevel::Error,
            message: err.to_string(),
            causes,
            context,
            timestamp: Utc::now(),
        });
    }

    /// Record a custom message event
    pub fn capture_message(
        &self,
        message: impl Into<String>,
        level: EventLevel,
        context: Option<TraceContext>,
    ) {
        self.inner.exporter.export_event(CapturedEvent {
            level,
            message: message.into(),
            causes: Vec::new(),
            context,
            timestamp: Utc::now(),
        });
    }

    /// Flush the exporter. Call once at process exit.
    pub fn shutdown(&self) -> Result<(), TelemetryError> {
        self.inner.exporter.shutdown()
    }

    fn exporter(&self) -> &dyn TraceExporter {
        self.inner.exporter.as_ref()
    }
}

// =============================================================================
// Transaction
// =============================================================================

/// Root span for one request-to-response cycle
pub struct Transaction {
    client: TracingClient,
    ctx: TraceContext,
    name: String,
    kind: String,
    labels: Labels,
    user: Option<String>,
    result: Option<TransactionResult>,
    span_count: AtomicUsize,
    started_at: DateTime<Utc>,
    start: Instant,
    ended: bool,
}

impl Transaction {
    pub fn context(&self) -> TraceContext {
        self.ctx
    }

    pub fn result(&self) -> Option<TransactionResult> {
        self.result
    }

    pub fn set_label(&mut self, key: &str, value: impl Into<LabelValue>) {
        self.labels.insert(key.to_string(), value.into());
    }

    pub fn set_user(&mut self, user: &str) {
        self.user = Some(user.to_string());
    }

    /// Set the terminal result. A later call overwrites the earlier one.
    pub fn set_result(&mut self, result: TransactionResult) {
        if let Some(previous) = self.result
            && previous != result
        {
            tracing::debug!(
                transaction = %self.name,
                from = %previous,
                to = %result,
                "Transaction result changed"
            );
        }
        self.result = Some(result);
    }

    /// Open a child span of this transaction
    pub fn start_span(&self, name: &str, kind: &str) -> Span {
        let id = SpanId::random();
        self.span_count.fetch_add(1, Ordering::Relaxed);
        self.client.exporter().span_started(id);

        Span {
            client: self.client.clone(),
            ctx: self.ctx,
            id,
            name: name.to_string(),
            kind: kind.to_string(),
            labels: Labels::new(),
            started_at: Utc::now(),
            start: Instant::now(),
            ended: false,
        }
    }

    /// Close the transaction. Without a result it is recorded as a failure.
    pub fn end(mut self) {
        self.finish();
    }

    fn finish(&mut self) {
        if self.ended {
            return;
        }
        self.ended = true;

        // Reached when the owning future is dropped mid-run (client disconnect)
        let result = *self.result.get_or_insert_with(|| {
            tracing::debug!(
                transaction = %self.name,
                "Transaction closed without a result, recording failure"
            );
            TransactionResult::Failure
        });

        self.client.exporter().export_transaction(TransactionRecord {
            trace_id: self.ctx.trace_id,
            id: self.ctx.transaction_id,
            name: std::mem::take(&mut self.name),
            kind: std::mem::take(&mut self.kind),
            labels: std::mem::take(&mut self.labels),
            user: self.user.take(),
            result: Some(result),
            span_count: self.span_count.load(Ordering::Relaxed),
            started_at: self.started_at,
            duration: self.start.elapsed(),
        });
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        self.finish();
    }
}

// =============================================================================
// Span
// =============================================================================

/// Timed unit of work nested under a transaction
pub struct Span {
    client: TracingClient,
    ctx: TraceContext,
    id: SpanId,
    name: String,
    kind: String,
    labels: Labels,
    started_at: DateTime<Utc>,
    start: Instant,
    ended: bool,
}

impl Span {
    pub fn id(&self) -> SpanId {
        self.id
    }

    pub fn set_label(&mut self, key: &str, value: impl Into<LabelValue>) {
        self.labels.insert(key.to_string(), value.into());
    }

    /// Close the span
    pub fn end(mut self) {
        self.finish();
    }

    fn finish(&mut self) {
        if self.ended {
            return;
        }
        self.ended = true;

        self.client.exporter().export_span(SpanRecord {
            trace_id: self.ctx.trace_id,
            id: self.id,
            transaction_id: self.ctx.transaction_id,
            name: std::mem::take(&mut self.name),
            kind: std::mem::take(&mut self.kind),
            labels: std::mem::take(&mut self.labels),
            started_at: self.started_at,
            duration: self.start.elapsed(),
        });
    }
}

impl Drop for Span {
    fn drop(&mut self) {
        self.finish();
    }
}
