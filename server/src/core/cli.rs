use clap::{Parser, ValueEnum};

use std::path::PathBuf;

use super::config::ApmBackend;
use super::constants::{
    ENV_APM_BACKEND, ENV_APM_SECRET_TOKEN, ENV_APM_SERVER_URL, ENV_CONFIG, ENV_ENVIRONMENT,
    ENV_HOST, ENV_LOG_FORMAT, ENV_PORT, ENV_REQUEST_TIMEOUT_SECS, ENV_SERVICE_NAME,
    ENV_TIME_SCALE,
};

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

#[derive(Parser)]
#[command(name = "cdnn")]
#[command(
    version,
    about = "CDNN pipeline service with distributed tracing",
    long_about = None
)]
pub struct Cli {
    /// Server host address
    #[arg(long, short = 'H', env = ENV_HOST)]
    pub host: Option<String>,

    /// Server port
    #[arg(long, short = 'p', env = ENV_PORT)]
    pub port: Option<u16>,

    /// Path to config file
    #[arg(long, short = 'c', env = ENV_CONFIG)]
    pub config: Option<PathBuf>,

    /// Log output format
    #[arg(long, env = ENV_LOG_FORMAT, value_enum, default_value_t = LogFormat::Compact)]
    pub log_format: LogFormat,

    /// Service name reported to the tracing backend
    #[arg(long, env = ENV_SERVICE_NAME)]
    pub service_name: Option<String>,

    /// Deployment environment tag
    #[arg(long, env = ENV_ENVIRONMENT)]
    pub environment: Option<String>,

    /// Trace backend (log or otlp)
    #[arg(long, env = ENV_APM_BACKEND, value_parser = parse_apm_backend)]
    pub apm_backend: Option<ApmBackend>,

    /// APM / OTLP collector base URL
    #[arg(long, env = ENV_APM_SERVER_URL)]
    pub apm_server_url: Option<String>,

    /// APM secret token (sent as a bearer token)
    #[arg(long, env = ENV_APM_SECRET_TOKEN, hide_env_values = true)]
    pub apm_secret_token: Option<String>,

    /// Per-request deadline in seconds (0 = no deadline)
    #[arg(long, env = ENV_REQUEST_TIMEOUT_SECS)]
    pub request_timeout_secs: Option<u64>,

    /// Multiplier applied to simulated stage latency (0 = no waiting)
    #[arg(long, env = ENV_TIME_SCALE)]
    pub time_scale: Option<f64>,
}

/// Parse APM backend from CLI/env string
fn parse_apm_backend(s: &str) -> Result<ApmBackend, String> {
    match s.to_lowercase().as_str() {
        "log" => Ok(ApmBackend::Log),
        "otlp" | "apm" => Ok(ApmBackend::Otlp),
        _ => Err(format!(
            "Invalid APM backend '{}'. Valid options: log, otlp",
            s
        )),
    }
}

/// Configuration derived from CLI arguments
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub config: Option<PathBuf>,
    pub log_format: LogFormat,
    pub service_name: Option<String>,
    pub environment: Option<String>,
    pub apm_backend: Option<ApmBackend>,
    pub apm_server_url: Option<String>,
    pub apm_secret_token: Option<String>,
    pub request_timeout_secs: Option<u64>,
    pub time_scale: Option<f64>,
}

impl From<Cli> for CliConfig {
    fn from(cli: Cli) -> Self {
        Self {
            host: cli.host,
            port: cli.port,
            config: cli.config,
            log_format: cli.log_format,
            service_name: cli.service_name,
            environment: cli.environment,
            apm_backend: cli.apm_backend,
            apm_server_url: cli.apm_server_url,
            apm_secret_token: cli.apm_secret_token,
            request_timeout_secs: cli.request_timeout_secs,
            time_scale: cli.time_scale,
        }
    }
}

/// Parse CLI arguments
pub fn parse() -> CliConfig {
    Cli::parse().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_apm_backend() {
        assert_eq!(parse_apm_backend("log").unwrap(), ApmBackend::Log);
        assert_eq!(parse_apm_backend("OTLP").unwrap(), ApmBackend::Otlp);
        assert_eq!(parse_apm_backend("apm").unwrap(), ApmBackend::Otlp);
        assert!(parse_apm_backend("jaeger").is_err());
    }

    #[test]
    fn test_cli_parses_flags() {
        let cli = Cli::try_parse_from([
            "cdnn",
            "--port",
            "9090",
            "--apm-backend",
            "otlp",
            "--apm-server-url",
            "http://apm:8200",
            "--time-scale",
            "0.5",
            "--log-format",
            "json",
        ])
        .unwrap();
        let config = CliConfig::from(cli);
        assert_eq!(config.port, Some(9090));
        assert_eq!(config.apm_backend, Some(ApmBackend::Otlp));
        assert_eq!(config.apm_server_url.as_deref(), Some("http://apm:8200"));
        assert_eq!(config.time_scale, Some(0.5));
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn test_cli_rejects_invalid_backend() {
        assert!(Cli::try_parse_from(["cdnn", "--apm-backend", "zipkin"]).is_err());
    }
}
