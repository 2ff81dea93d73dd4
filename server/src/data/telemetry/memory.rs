//! In-memory trace exporter
//!
//! Keeps every finished record and counts handle opens and closes, so
//! callers can assert that no span or transaction leaked.

use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

use super::exporter::TraceExporter;
use super::model::{CapturedEvent, SpanId, SpanRecord, TransactionRecord};

#[derive(Default)]
pub struct MemoryExporter {
    spans_started: AtomicUsize,
    transactions_started: AtomicUsize,
    spans: Mutex<Vec<SpanRecord>>,
    transactions: Mutex<Vec<TransactionRecord>>,
    events: Mutex<Vec<CapturedEvent>>,
}

impl MemoryExporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spans(&self) -> Vec<SpanRecord> {
        self.spans.lock().clone()
    }

    pub fn transactions(&self) -> Vec<TransactionRecord> {
        self.transactions.lock().clone()
    }

    pub fn events(&self) -> Vec<CapturedEvent> {
        self.events.lock().clone()
    }

    /// Finished spans belonging to one transaction, in close order
    pub fn spans_of(&self, transaction_id: SpanId) -> Vec<SpanRecord> {
        self.spans
            .lock()
            .iter()
            .filter(|s| s.transaction_id == transaction_id)
            .cloned()
            .collect()
    }

    pub fn spans_started(&self) -> usize {
        self.spans_started.load(Ordering::SeqCst)
    }

    pub fn transactions_started(&self) -> usize {
        self.transactions_started.load(Ordering::SeqCst)
    }

    /// Spans opened but not yet closed
    pub fn open_spans(&self) -> usize {
        self.spans_started().saturating_sub(self.spans.lock().len())
    }

    /// Transactions opened but not yet closed
    pub fn open_transactions(&self) -> usize {
        self.transactions_started()
            .saturating_sub(self.transactions.lock().len())
    }
}

impl TraceExporter for MemoryExporter {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    fn transaction_started(&self, _id: SpanId) {
        self.transactions_started.fetch_add(1, Ordering::SeqCst);
    }

    fn span_started(&self, _id: SpanId) {
        self.spans_started.fetch_add(1, Ordering::SeqCst);
    }

    fn export_span(&self, span: SpanRecord) {
        self.spans.lock().push(span);
    }

    fn export_transaction(&self, transaction: TransactionRecord) {
        self.transactions.lock().push(transaction);
    }

    fn export_event(&self, event: CapturedEvent) {
        self.events.lock().push(event);
    }
}
