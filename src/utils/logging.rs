use anyhow::{anyhow, Result};
use clap::ValueEnum;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::settings::{LogFormat, LoggingConfig};
use crate::ServiceConfig;

/// `--log-level` / `LOG_LEVEL` values.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Resolve the logging config (CLI level wins over YAML) and install the subscriber.
pub fn run(service_config: &ServiceConfig, arg_log_level: Option<LogLevel>) -> Result<()> {
    let configured = service_config
        .settings
        .logging
        .clone()
        .unwrap_or_else(|| LoggingConfig::new("info".to_owned(), LogFormat::Compact));

    let level = match arg_log_level {
        Some(level) => level.as_str().to_owned(),
        None => configured.level,
    };

    init_logging(&LoggingConfig::new(level, configured.format))
}

/// Our own events at the configured level, dependencies (hyper, reqwest) at warn.
/// `RUST_LOG`, when set, replaces both.
fn env_filter(level: &str) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    let directives = format!("warn,{}={}", env!("CARGO_CRATE_NAME"), level.to_lowercase());
    EnvFilter::try_new(&directives).map_err(|e| anyhow!("invalid log level '{}': {}", level, e))
}

pub fn init_logging(cfg: &LoggingConfig) -> Result<()> {
    let registry = tracing_subscriber::registry().with(env_filter(&cfg.level)?);

    let installed = match cfg.format {
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_timer(UtcTime::rfc_3339())
                    .flatten_event(true)
                    .with_current_span(false)
                    .with_ansi(false),
            )
            .try_init(),
        LogFormat::Compact => registry
            .with(
                fmt::layer()
                    .compact()
                    .with_timer(UtcTime::rfc_3339())
                    .with_target(false)
                    .with_ansi(true),
            )
            .try_init(),
    };

    installed.map_err(|e| anyhow!("logging already initialised: {}", e))
}
