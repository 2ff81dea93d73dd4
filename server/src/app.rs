//! Core application

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::api::ApiServer;
use crate::core::banner;
use crate::core::cli::{self, CliConfig, LogFormat};
use crate::core::config::AppConfig;
use crate::core::constants::{APP_NAME_LOWER, ENV_LOG};
use crate::core::shutdown::ShutdownService;
use crate::data::telemetry::{ServiceInfo, TracingClient};
use crate::domain::pipeline::{Orchestrator, RandomSimulation};

pub struct CoreApp {
    pub shutdown: ShutdownService,
    pub config: AppConfig,
    pub orchestrator: Orchestrator,
}

impl CoreApp {
    /// Run the application with CLI argument parsing
    pub async fn run() -> Result<()> {
        dotenvy::dotenv().ok();

        let cli_config = cli::parse();
        Self::init_logging(cli_config.log_format);

        tracing::debug!("Application starting");

        let app = Self::init(&cli_config)?;
        Self::start_server(app).await
    }

    fn init(cli: &CliConfig) -> Result<Self> {
        let config = AppConfig::load(cli)?;

        let service = ServiceInfo {
            name: config.service.name.clone(),
            environment: config.service.environment.clone(),
        };
        let client = TracingClient::from_config(service, &config.apm)
            .context("Failed to initialize tracing client")?;
        tracing::debug!(backend = client.backend_name(), "Tracing client initialized");

        let simulation = Arc::new(RandomSimulation::new(config.pipeline.time_scale));
        let orchestrator = Orchestrator::new(client.clone(), simulation);
        let shutdown = ShutdownService::new(client);

        Ok(Self {
            shutdown,
            config,
            orchestrator,
        })
    }

    fn init_logging(format: LogFormat) {
        let default_filter = format!("info,{}=info", APP_NAME_LOWER);

        let filter = std::env::var(ENV_LOG)
            .or_else(|_| std::env::var("RUST_LOG"))
            .unwrap_or(default_filter);

        match format {
            LogFormat::Compact => tracing_subscriber::fmt()
                .with_target(false)
                .with_thread_ids(false)
                .with_level(true)
                .with_ansi(true)
                .compact()
                .with_env_filter(filter)
                .init(),
            LogFormat::Json => tracing_subscriber::fmt()
                .json()
                .with_current_span(false)
                .with_env_filter(filter)
                .init(),
        }
    }

    async fn start_server(app: Self) -> Result<()> {
        // Install signal handlers FIRST (before any blocking calls)
        app.shutdown.install_signal_handlers();

        banner::print_banner(&app.config);

        let server = ApiServer::new(app);
        let app = server.start().await?;
        app.shutdown.shutdown().await;

        Ok(())
    }
}
