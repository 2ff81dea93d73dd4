use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::cli::CliConfig;
use super::constants::{
    CONFIG_FILE_NAME, DEFAULT_ENVIRONMENT, DEFAULT_HOST, DEFAULT_PORT,
    DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_SERVICE_NAME, DEFAULT_TIME_SCALE, MAX_TIME_SCALE,
};

// =============================================================================
// APM Backend Enum
// =============================================================================

/// Trace backend type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ApmBackend {
    /// Finished spans and transactions are written to the log
    #[default]
    Log,
    /// Spans and transactions are exported over OTLP/HTTP
    Otlp,
}

impl fmt::Display for ApmBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApmBackend::Log => write!(f, "log"),
            ApmBackend::Otlp => write!(f, "otlp"),
        }
    }
}

// =============================================================================
// File Config Structs (JSON deserialization)
// =============================================================================

/// Server configuration section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct ServerFileConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
}

/// Service identity section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct ServiceFileConfig {
    pub name: Option<String>,
    pub environment: Option<String>,
}

/// APM configuration section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct ApmFileConfig {
    pub backend: Option<ApmBackend>,
    pub server_url: Option<String>,
    pub secret_token: Option<String>,
}

/// Pipeline configuration section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct PipelineFileConfig {
    pub request_timeout_secs: Option<u64>,
    pub time_scale: Option<f64>,
}

/// File-based configuration (JSON)
#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    pub server: Option<ServerFileConfig>,
    pub service: Option<ServiceFileConfig>,
    pub apm: Option<ApmFileConfig>,
    pub pipeline: Option<PipelineFileConfig>,
    #[serde(flatten)]
    pub extra: serde_json::Value,
}

impl FileConfig {
    /// Load configuration from a JSON file
    fn load_from_file(path: &Path) -> Result<Self> {
        tracing::debug!(path = %path.display(), "Loading config file");
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Warn about unknown fields in the config
    fn warn_unknown_fields(&self) {
        if let serde_json::Value::Object(map) = &self.extra
            && !map.is_empty()
        {
            let keys_str: String = map
                .keys()
                .map(|k| k.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            tracing::warn!(
                fields = %keys_str,
                "Unknown fields in config file (possible typos)"
            );
        }
    }
}

// =============================================================================
// Resolved Config Structs
// =============================================================================

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub name: String,
    pub environment: String,
}

#[derive(Clone, Default)]
pub struct ApmConfig {
    pub backend: ApmBackend,
    pub server_url: Option<String>,
    pub secret_token: Option<String>,
}

impl fmt::Debug for ApmConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApmConfig")
            .field("backend", &self.backend)
            .field("server_url", &self.server_url)
            .field(
                "secret_token",
                &self.secret_token.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Per-request deadline; `None` disables it
    pub request_timeout: Option<Duration>,
    /// Multiplier applied to every simulated wait
    pub time_scale: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            request_timeout: Some(Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS)),
            time_scale: DEFAULT_TIME_SCALE,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub service: ServiceConfig,
    pub apm: ApmConfig,
    pub pipeline: PipelineConfig,
}

impl AppConfig {
    /// Load configuration from all sources
    ///
    /// Priority (lowest to highest):
    /// 1. Defaults
    /// 2. Local directory config OR CLI-specified config path
    /// 3. CLI arguments (which include env var fallbacks via clap)
    pub fn load(cli: &CliConfig) -> Result<Self> {
        tracing::debug!("Loading application configuration");

        let path = if let Some(ref path) = cli.config {
            if !path.exists() {
                anyhow::bail!("Config file not found: {}", path.display());
            }
            Some(path.clone())
        } else {
            let local = PathBuf::from(CONFIG_FILE_NAME);
            if local.exists() { Some(local) } else { None }
        };

        let file_config = match path {
            Some(path) => {
                let config = FileConfig::load_from_file(&path)?;
                config.warn_unknown_fields();
                config
            }
            None => FileConfig::default(),
        };

        let config = Self::resolve(cli, file_config);
        config.validate()?;
        tracing::debug!(config = ?config, "Configuration loaded");
        Ok(config)
    }

    /// Layer configs: defaults -> file config -> CLI/env overrides
    fn resolve(cli: &CliConfig, file_config: FileConfig) -> Self {
        let file_server = file_config.server.unwrap_or_default();
        let file_service = file_config.service.unwrap_or_default();
        let file_apm = file_config.apm.unwrap_or_default();
        let file_pipeline = file_config.pipeline.unwrap_or_default();

        let server = ServerConfig {
            host: cli
                .host
                .clone()
                .or(file_server.host)
                .unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: cli.port.or(file_server.port).unwrap_or(DEFAULT_PORT),
        };

        let service = ServiceConfig {
            name: cli
                .service_name
                .clone()
                .or(file_service.name)
                .unwrap_or_else(|| DEFAULT_SERVICE_NAME.to_string()),
            environment: cli
                .environment
                .clone()
                .or(file_service.environment)
                .unwrap_or_else(|| DEFAULT_ENVIRONMENT.to_string()),
        };

        let apm = ApmConfig {
            backend: cli.apm_backend.or(file_apm.backend).unwrap_or_default(),
            server_url: cli
                .apm_server_url
                .clone()
                .or(file_apm.server_url)
                .filter(|s| !s.is_empty()),
            secret_token: cli
                .apm_secret_token
                .clone()
                .or(file_apm.secret_token)
                .filter(|s| !s.is_empty()),
        };

        // request_timeout_secs = 0 disables the deadline
        let timeout_secs = cli
            .request_timeout_secs
            .or(file_pipeline.request_timeout_secs)
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);
        let pipeline = PipelineConfig {
            request_timeout: (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs)),
            time_scale: cli
                .time_scale
                .or(file_pipeline.time_scale)
                .unwrap_or(DEFAULT_TIME_SCALE),
        };

        Self {
            server,
            service,
            apm,
            pipeline,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            anyhow::bail!("server.port must be greater than 0");
        }
        if self.service.name.trim().is_empty() {
            anyhow::bail!("service.name must not be empty");
        }
        if self.apm.backend == ApmBackend::Otlp && self.apm.server_url.is_none() {
            anyhow::bail!("apm.server_url is required when apm.backend is otlp");
        }
        let scale = self.pipeline.time_scale;
        if !scale.is_finite() || !(0.0..=MAX_TIME_SCALE).contains(&scale) {
            anyhow::bail!(
                "pipeline.time_scale must be between 0 and {}, got {}",
                MAX_TIME_SCALE,
                scale
            );
        }
        Ok(())
    }
}

pub fn is_all_interfaces(host: &str) -> bool {
    host == "0.0.0.0" || host == "::"
}
