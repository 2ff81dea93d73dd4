//! OTLP trace exporter
//!
//! Replays finished records into the OpenTelemetry SDK with their recorded
//! ids and timestamps, and ships them over OTLP/HTTP. Transactions become
//! server spans and stage spans become internal spans. Captured errors become
//! `exception` events on their transaction; info messages become plain span
//! events named after the message.

use std::collections::HashMap;
use std::time::SystemTime;

use opentelemetry::trace::{
    Span as _, SpanContext, SpanId as OtelSpanId, SpanKind, Status, TraceContextExt, TraceFlags,
    TraceId as OtelTraceId, TraceState, Tracer as _, TracerProvider as _,
};
use opentelemetry::{Context, KeyValue, Value};
use opentelemetry_otlp::{WithExportConfig, WithHttpConfig};
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::trace::SdkTracerProvider;
use parking_lot::Mutex;

use super::client::ServiceInfo;
use super::error::TelemetryError;
use super::exporter::TraceExporter;
use super::model::{
    CapturedEvent, EventLevel, LabelValue, Labels, SpanId, SpanRecord, TraceId, TransactionRecord,
    TransactionResult,
};

const INSTRUMENTATION_SCOPE: &str = "cdnn";
const TRACES_PATH: &str = "/v1/traces";

pub struct OtlpExporter {
    provider: SdkTracerProvider,
    pending_events: EventBuffer,
}

/// Captured events waiting for their transaction to close.
///
/// A slot exists only while its transaction is open, so events for a
/// transaction that already closed are handed back instead of buffered.
#[derive(Default)]
struct EventBuffer {
    slots: Mutex<HashMap<SpanId, Vec<CapturedEvent>>>,
}

impl EventBuffer {
    fn open(&self, transaction_id: SpanId) {
        self.slots.lock().entry(transaction_id).or_default();
    }

    /// Buffer `event` under its transaction, or return it when there is none
    fn push(&self, event: CapturedEvent) -> Result<(), CapturedEvent> {
        let Some(ctx) = event.context else {
            return Err(event);
        };
        match self.slots.lock().get_mut(&ctx.transaction_id) {
            Some(slot) => {
                slot.push(event);
                Ok(())
            }
            None => Err(event),
        }
    }

    /// Remove the slot and return what it held
    fn close(&self, transaction_id: SpanId) -> Vec<CapturedEvent> {
        self.slots
            .lock()
            .remove(&transaction_id)
            .unwrap_or_default()
    }
}

impl OtlpExporter {
    /// Build the exporter pipeline.
    ///
    /// The blocking HTTP client must not be created on an async runtime
    /// thread, so construction happens on a dedicated OS thread.
    pub fn new(
        service: &ServiceInfo,
        server_url: &str,
        secret_token: Option<&str>,
    ) -> Result<Self, TelemetryError> {
        let endpoint = traces_endpoint(server_url)?;
        let headers = auth_headers(secret_token);
        let service = service.clone();

        let provider = std::thread::spawn(move || build_provider(&service, endpoint, headers))
            .join()
            .map_err(|_| TelemetryError::Exporter("exporter init thread panicked".into()))??;

        Ok(Self {
            provider,
            pending_events: EventBuffer::default(),
        })
    }
}

fn build_provider(
    service: &ServiceInfo,
    endpoint: String,
    headers: HashMap<String, String>,
) -> Result<SdkTracerProvider, TelemetryError> {
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_http()
        .with_endpoint(endpoint)
        .with_headers(headers)
        .build()
        .map_err(|e| TelemetryError::Exporter(e.to_string()))?;

    let resource = Resource::builder()
        .with_service_name(service.name.clone())
        .with_attribute(KeyValue::new(
            "deployment.environment",
            service.environment.clone(),
        ))
        .build();

    Ok(SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(resource)
        .build())
}

/// Full OTLP/HTTP traces URL for a collector base URL
fn traces_endpoint(server_url: &str) -> Result<String, TelemetryError> {
    let base = server_url.trim().trim_end_matches('/');
    if !(base.starts_with("http://") || base.starts_with("https://")) {
        return Err(TelemetryError::Config(format!(
            "APM server URL must start with http:// or https://: {}",
            server_url
        )));
    }
    if base.ends_with(TRACES_PATH) {
        Ok(base.to_string())
    } else {
        Ok(format!("{}{}", base, TRACES_PATH))
    }
}

fn auth_headers(secret_token: Option<&str>) -> HashMap<String, String> {
    let mut headers = HashMap::new();
    if let Some(token) = secret_token.filter(|t| !t.is_empty()) {
        headers.insert("Authorization".to_string(), format!("Bearer {}", token));
    }
    headers
}

fn label_value(value: &LabelValue) -> Value {
    match value {
        LabelValue::Str(v) => Value::from(v.clone()),
        LabelValue::Int(v) => Value::I64(*v),
        LabelValue::Float(v) => Value::F64(*v),
        LabelValue::Bool(v) => Value::Bool(*v),
    }
}

fn label_attributes(labels: &Labels) -> Vec<KeyValue> {
    labels
        .iter()
        .map(|(k, v)| KeyValue::new(format!("labels.{}", k), label_value(v)))
        .collect()
}

/// Span event name and attributes for a captured event
fn span_event(event: &CapturedEvent) -> (String, Vec<KeyValue>) {
    match event.level {
        EventLevel::Error => {
            let mut attrs = vec![
                KeyValue::new("exception.message", event.message.clone()),
                KeyValue::new("event.level", event.level.as_str()),
            ];
            if !event.causes.is_empty() {
                attrs.push(KeyValue::new("exception.cause", event.causes.join(": ")));
            }
            ("exception".to_string(), attrs)
        }
        EventLevel::Info => (
            event.message.clone(),
            vec![KeyValue::new("event.level", event.level.as_str())],
        ),
    }
}

fn otel_trace_id(id: TraceId) -> OtelTraceId {
    OtelTraceId::from_bytes(id.to_bytes())
}

fn otel_span_id(id: SpanId) -> OtelSpanId {
    OtelSpanId::from_bytes(id.to_bytes())
}

/// Context whose active span is the (already known) parent transaction
fn parent_context(trace_id: TraceId, parent: SpanId) -> Context {
    Context::new().with_remote_span_context(SpanContext::new(
        otel_trace_id(trace_id),
        otel_span_id(parent),
        TraceFlags::SAMPLED,
        true,
        TraceState::default(),
    ))
}

impl TraceExporter for OtlpExporter {
    fn backend_name(&self) -> &'static str {
        "otlp"
    }

    fn transaction_started(&self, id: SpanId) {
        self.pending_events.open(id);
    }

    fn export_span(&self, record: SpanRecord) {
        let tracer = self.provider.tracer(INSTRUMENTATION_SCOPE);
        let parent_cx = parent_context(record.trace_id, record.transaction_id);
        let ended_at = SystemTime::from(record.ended_at());

        let mut attributes = label_attributes(&record.labels);
        attributes.push(KeyValue::new("span.type", record.kind.clone()));

        let mut span = tracer
            .span_builder(record.name)
            .with_kind(SpanKind::Internal)
            .with_trace_id(otel_trace_id(record.trace_id))
            .with_span_id(otel_span_id(record.id))
            .with_start_time(SystemTime::from(record.started_at))
            .with_attributes(attributes)
            .start_with_context(&tracer, &parent_cx);
        span.end_with_timestamp(ended_at);
    }

    fn export_transaction(&self, record: TransactionRecord) {
        let tracer = self.provider.tracer(INSTRUMENTATION_SCOPE);
        let ended_at = SystemTime::from(record.ended_at());
        let events = self.pending_events.close(record.id);

        let mut attributes = label_attributes(&record.labels);
        attributes.push(KeyValue::new("transaction.type", record.kind.clone()));
        if let Some(result) = record.result {
            attributes.push(KeyValue::new("transaction.result", result.as_str()));
        }
        if let Some(user) = &record.user {
            attributes.push(KeyValue::new("user.id", user.clone()));
        }

        let mut span = tracer
            .span_builder(record.name)
            .with_kind(SpanKind::Server)
            .with_trace_id(otel_trace_id(record.trace_id))
            .with_span_id(otel_span_id(record.id))
            .with_start_time(SystemTime::from(record.started_at))
            .with_attributes(attributes)
            .start_with_context(&tracer, &Context::new());

        for event in &events {
            let (name, attrs) = span_event(event);
            span.add_event_with_timestamp(name, SystemTime::from(event.timestamp), attrs);
        }

        match record.result {
            Some(TransactionResult::Success) => span.set_status(Status::Ok),
            Some(TransactionResult::Failure) => span.set_status(Status::error("failure")),
            None => {}
        }
        span.end_with_timestamp(ended_at);
    }

    fn export_event(&self, event: CapturedEvent) {
        if let Err(event) = self.pending_events.push(event) {
            tracing::warn!(
                level = event.level.as_str(),
                "Captured event without an open transaction (not exported): {}",
                event.message
            );
        }
    }

    fn shutdown(&self) -> Result<(), TelemetryError> {
        self.provider
            .shutdown()
            .map_err(|e| TelemetryError::Shutdown(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::telemetry::TraceContext;

    #[test]
    fn test_traces_endpoint_appends_path() {
        assert_eq!(
            traces_endpoint("http://172.18.0.2:8200").unwrap(),
            "http://172.18.0.2:8200/v1/traces"
        );
        assert_eq!(
            traces_endpoint("http://apm:8200/").unwrap(),
            "http://apm:8200/v1/traces"
        );
    }

    #[test]
    fn test_traces_endpoint_keeps_explicit_path() {
        assert_eq!(
            traces_endpoint("https://apm:8200/v1/traces").unwrap(),
            "https://apm:8200/v1/traces"
        );
    }

    #[test]
    fn test_traces_endpoint_rejects_missing_scheme() {
        let err = traces_endpoint("apm:8200").unwrap_err();
        assert!(matches!(err, TelemetryError::Config(_)));
    }

    #[test]
    fn test_auth_headers() {
        let headers = auth_headers(Some("s3cret"));
        assert_eq!(headers.get("Authorization").unwrap(), "Bearer s3cret");
        assert!(auth_headers(Some("")).is_empty());
        assert!(auth_headers(None).is_empty());
    }

    #[test]
    fn test_label_attributes_are_prefixed_and_typed() {
        let mut labels = Labels::new();
        labels.insert("batch_size".into(), LabelValue::Int(48));
        labels.insert("error_type".into(), LabelValue::from("timeout"));

        let attrs = label_attributes(&labels);
        assert_eq!(attrs.len(), 2);
        assert_eq!(attrs[0].key.as_str(), "labels.batch_size");
        assert_eq!(attrs[0].value, Value::I64(48));
        assert_eq!(attrs[1].key.as_str(), "labels.error_type");
        assert_eq!(attrs[1].value, Value::from("timeout".to_string()));
    }

    fn event(level: EventLevel, context: Option<TraceContext>) -> CapturedEvent {
        CapturedEvent {
            level,
            message: "Pipeline completed with 2500 records, accuracy 90.00%".to_string(),
            causes: Vec::new(),
            context,
            timestamp: chrono::Utc::now(),
        }
    }

    fn context(transaction_id: u64) -> TraceContext {
        TraceContext {
            trace_id: TraceId(1),
            transaction_id: SpanId(transaction_id),
        }
    }

    #[test]
    fn test_info_event_is_not_an_exception() {
        let (name, attrs) = span_event(&event(EventLevel::Info, None));
        assert_eq!(name, "Pipeline completed with 2500 records, accuracy 90.00%");
        assert_eq!(attrs.len(), 1);
        assert_eq!(attrs[0].key.as_str(), "event.level");
        assert_eq!(attrs[0].value, Value::from("info"));
    }

    #[test]
    fn test_error_event_is_an_exception_with_causes() {
        let mut err = event(EventLevel::Error, None);
        err.message = "external API call failed: timeout after 30s".to_string();
        err.causes = vec!["timeout after 30s".to_string()];

        let (name, attrs) = span_event(&err);
        assert_eq!(name, "exception");
        let keys: Vec<_> = attrs.iter().map(|kv| kv.key.as_str()).collect();
        assert_eq!(
            keys,
            vec!["exception.message", "event.level", "exception.cause"]
        );
    }

    #[test]
    fn test_event_buffer_holds_events_until_close() {
        let buffer = EventBuffer::default();
        buffer.open(SpanId(5));
        assert!(buffer.push(event(EventLevel::Info, Some(context(5)))).is_ok());
        assert!(buffer.push(event(EventLevel::Error, Some(context(5)))).is_ok());

        let events = buffer.close(SpanId(5));
        assert_eq!(events.len(), 2);
        assert!(buffer.close(SpanId(5)).is_empty());
    }

    #[test]
    fn test_event_buffer_rejects_closed_or_missing_transaction() {
        let buffer = EventBuffer::default();
        buffer.open(SpanId(5));
        buffer.close(SpanId(5));

        assert!(buffer.push(event(EventLevel::Info, Some(context(5)))).is_err());
        assert!(buffer.push(event(EventLevel::Error, None)).is_err());
        assert!(buffer.slots.lock().is_empty());
    }

    #[test]
    fn test_parent_context_carries_ids() {
        let ctx = parent_context(TraceId(7), SpanId(9));
        let span = ctx.span();
        let sc = span.span_context();
        assert_eq!(sc.trace_id(), otel_trace_id(TraceId(7)));
        assert_eq!(sc.span_id(), otel_span_id(SpanId(9)));
        assert!(sc.is_remote());
    }
}
