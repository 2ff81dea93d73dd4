//! Core application infrastructure

pub(crate) mod banner;
pub mod cli;
pub mod config;
pub mod constants;
pub mod shutdown;

pub use crate::app::CoreApp;
pub use cli::{CliConfig, LogFormat};
pub use config::{ApmBackend, ApmConfig, AppConfig, PipelineConfig, ServerConfig, ServiceConfig};
pub use shutdown::ShutdownService;
