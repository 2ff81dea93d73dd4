// =============================================================================
// Application Identity
// =============================================================================

/// Application name in title case (for display)
pub const APP_NAME: &str = "CDNN";

/// Application name in lowercase (for paths and identifiers)
pub const APP_NAME_LOWER: &str = "cdnn";

// =============================================================================
// Configuration Files
// =============================================================================

/// Config file name
pub const CONFIG_FILE_NAME: &str = "cdnn.json";

/// Environment variable for config file path
pub const ENV_CONFIG: &str = "CDNN_CONFIG";

// =============================================================================
// Environment Variables - Server
// =============================================================================

/// Environment variable for server host
pub const ENV_HOST: &str = "CDNN_HOST";

/// Environment variable for server port
pub const ENV_PORT: &str = "CDNN_PORT";

/// Environment variable for log level/filter
pub const ENV_LOG: &str = "CDNN_LOG";

/// Environment variable for log output format (compact or json)
pub const ENV_LOG_FORMAT: &str = "CDNN_LOG_FORMAT";

// =============================================================================
// Server Defaults
// =============================================================================

/// Default server host
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default server port
pub const DEFAULT_PORT: u16 = 8080;

/// Path serving the pipeline (any method)
pub const PIPELINE_PATH: &str = "/";

/// Graceful shutdown timeout in seconds
pub const SHUTDOWN_TIMEOUT_SECS: u64 = 10;

// =============================================================================
// Environment Variables - Service Identity
// =============================================================================

pub const ENV_SERVICE_NAME: &str = "CDNN_SERVICE_NAME";
pub const ENV_ENVIRONMENT: &str = "CDNN_ENVIRONMENT";

pub const DEFAULT_SERVICE_NAME: &str = "cdnn";
pub const DEFAULT_ENVIRONMENT: &str = "development";

// =============================================================================
// Environment Variables - APM
// =============================================================================

/// Environment variable selecting the trace backend (log or otlp)
pub const ENV_APM_BACKEND: &str = "CDNN_APM_BACKEND";

/// Environment variable for the APM / OTLP collector base URL
pub const ENV_APM_SERVER_URL: &str = "CDNN_APM_SERVER_URL";

/// Environment variable for the APM secret token
pub const ENV_APM_SECRET_TOKEN: &str = "CDNN_APM_SECRET_TOKEN";

// =============================================================================
// Pipeline
// =============================================================================

/// Environment variable for the per-request deadline in seconds (0 = none)
pub const ENV_REQUEST_TIMEOUT_SECS: &str = "CDNN_REQUEST_TIMEOUT_SECS";

/// Environment variable for the simulated latency multiplier
pub const ENV_TIME_SCALE: &str = "CDNN_TIME_SCALE";

/// Default per-request deadline in seconds
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;

/// Default simulated latency multiplier (real-time)
pub const DEFAULT_TIME_SCALE: f64 = 1.0;
/// Upper bound for `time_scale` (1000x slower than real time)
pub const MAX_TIME_SCALE: f64 = 1000.0;
