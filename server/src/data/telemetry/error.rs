//! Telemetry error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Telemetry configuration error: {0}")]
    Config(String),

    #[error("Trace exporter error: {0}")]
    Exporter(String),

    #[error("Trace exporter shutdown failed: {0}")]
    Shutdown(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let err = TelemetryError::Config("server url required".to_string());
        assert_eq!(
            err.to_string(),
            "Telemetry configuration error: server url required"
        );
    }

    #[test]
    fn test_exporter_error_display() {
        let err = TelemetryError::Exporter("invalid endpoint".to_string());
        assert_eq!(err.to_string(), "Trace exporter error: invalid endpoint");
    }

    #[test]
    fn test_shutdown_error_display() {
        let err = TelemetryError::Shutdown("timed out".to_string());
        assert_eq!(err.to_string(), "Trace exporter shutdown failed: timed out");
    }
}
