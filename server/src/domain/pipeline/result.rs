//! Pipeline result record

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineStatus {
    Success,
    Failure,
}

/// Outcome of one pipeline run, built once after the last stage
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineResult {
    pub status: PipelineStatus,
    pub duration_ms: u64,
    pub loaded_records: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<u32>,
    pub accuracy: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serializes_snake_case_fields() {
        let result = PipelineResult {
            status: PipelineStatus::Success,
            duration_ms: 12,
            loaded_records: 2500,
            batch_size: Some(48),
            accuracy: 0.9,
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "status": "success",
                "duration_ms": 12,
                "loaded_records": 2500,
                "batch_size": 48,
                "accuracy": 0.9
            })
        );
    }

    #[test]
    fn test_batch_size_omitted_when_absent() {
        let result = PipelineResult {
            status: PipelineStatus::Success,
            duration_ms: 0,
            loaded_records: 1000,
            batch_size: None,
            accuracy: 0.8,
        };
        let json = serde_json::to_value(&result).unwrap();
        assert!(json.get("batch_size").is_none());
    }
}
