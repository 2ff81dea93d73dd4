//! Telemetry record types
//!
//! Handles produce these records when they close. Exporters only ever see
//! finished, immutable records.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

// =============================================================================
// Identifiers
// =============================================================================

/// 128-bit trace identifier shared by a transaction and all of its spans
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct TraceId(pub u128);

impl TraceId {
    pub fn random() -> Self {
        Self(uuid::Uuid::new_v4().as_u128())
    }

    pub fn to_bytes(self) -> [u8; 16] {
        self.0.to_be_bytes()
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

/// 64-bit identifier of a single span or transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SpanId(pub u64);

impl SpanId {
    pub fn random() -> Self {
        // Zero is the invalid span id in W3C trace context
        loop {
            let id = rand::random::<u64>();
            if id != 0 {
                return Self(id);
            }
        }
    }

    pub fn to_bytes(self) -> [u8; 8] {
        self.0.to_be_bytes()
    }
}

impl fmt::Display for SpanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Identity of an open transaction, used to link spans and captured events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TraceContext {
    pub trace_id: TraceId,
    pub transaction_id: SpanId,
}

// =============================================================================
// Labels
// =============================================================================

/// Value of a label attached to a span or transaction
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum LabelValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl LabelValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Int(v) => Some(*v as f64),
            _ => None,
        }
    }
}

impl fmt::Display for LabelValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(v) => write!(f, "{}", v),
            Self::Int(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{}", v),
            Self::Bool(v) => write!(f, "{}", v),
        }
    }
}

impl From<&str> for LabelValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for LabelValue {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl From<i64> for LabelValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<u32> for LabelValue {
    fn from(v: u32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<u64> for LabelValue {
    fn from(v: u64) -> Self {
        Self::Int(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

impl From<f64> for LabelValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<bool> for LabelValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

/// Ordered label map (deterministic export order)
pub type Labels = BTreeMap<String, LabelValue>;

// =============================================================================
// Transaction result
// =============================================================================

/// Terminal outcome of a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionResult {
    Success,
    Failure,
}

impl TransactionResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
        }
    }
}

impl fmt::Display for TransactionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Finished records
// =============================================================================

/// A closed span
#[derive(Debug, Clone, Serialize)]
pub struct SpanRecord {
    pub trace_id: TraceId,
    pub id: SpanId,
    pub transaction_id: SpanId,
    pub name: String,
    pub kind: String,
    pub labels: Labels,
    pub started_at: DateTime<Utc>,
    pub duration: Duration,
}

impl SpanRecord {
    pub fn ended_at(&self) -> DateTime<Utc> {
        self.started_at + chrono::Duration::from_std(self.duration).unwrap_or_default()
    }
}

/// A closed transaction
#[derive(Debug, Clone, Serialize)]
pub struct TransactionRecord {
    pub trace_id: TraceId,
    pub id: SpanId,
    pub name: String,
    pub kind: String,
    pub labels: Labels,
    pub user: Option<String>,
    pub result: Option<TransactionResult>,
    pub span_count: usize,
    pub started_at: DateTime<Utc>,
    pub duration: Duration,
}

impl TransactionRecord {
    pub fn ended_at(&self) -> DateTime<Utc> {
        self.started_at + chrono::Duration::from_std(self.duration).unwrap_or_default()
    }

    pub fn label(&self, key: &str) -> Option<&LabelValue> {
        self.labels.get(key)
    }
}

/// Severity of a captured event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventLevel {
    Info,
    Error,
}

impl EventLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Error => "error",
        }
    }
}

/// Captured error or custom message, optionally linked to a transaction
#[derive(Debug, Clone, Serialize)]
pub struct CapturedEvent {
    pub level: EventLevel,
    pub message: String,
    /// Display strings of the error's source chain, outermost first
    pub causes: Vec<String>,
    #[serde(skip)]
    pub context: Option<TraceContext>,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trace_id_display_is_32_hex_chars() {
        let id = TraceId(0xabc);
        let s = id.to_string();
        assert_eq!(s.len(), 32);
        assert!(s.ends_with("abc"));
    }

    #[test]
    fn test_span_id_random_is_never_zero() {
        for _ in 0..100 {
            assert_ne!(SpanId::random().0, 0);
        }
    }

    #[test]
    fn test_label_value_conversions() {
        assert_eq!(LabelValue::from("a"), LabelValue::Str("a".into()));
        assert_eq!(LabelValue::from(48u32), LabelValue::Int(48));
        assert_eq!(LabelValue::from(u64::MAX), LabelValue::Int(i64::MAX));
        assert_eq!(LabelValue::from(0.5), LabelValue::Float(0.5));
        assert_eq!(LabelValue::Int(3).as_f64(), Some(3.0));
        assert_eq!(LabelValue::Bool(true).as_str(), None);
    }

    #[test]
    fn test_label_value_serializes_untagged() {
        let json = serde_json::to_string(&LabelValue::from("timeout")).unwrap();
        assert_eq!(json, "\"timeout\"");
        let json = serde_json::to_string(&LabelValue::from(42i64)).unwrap();
        assert_eq!(json, "42");
    }

    #[test]
    fn test_transaction_result_display() {
        assert_eq!(TransactionResult::Success.to_string(), "success");
        assert_eq!(TransactionResult::Failure.to_string(), "failure");
    }
}
