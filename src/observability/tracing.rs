use crate::config::ObservabilityConfig;
use crate::errors::{AppError, Result};
use std::str::FromStr;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Output format of the log stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per event, for log shippers
    Json,
    /// Single-line human-readable output
    Compact,
    /// Multi-line output for local development
    Pretty,
}

impl LogFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogFormat::Json => "json",
            LogFormat::Compact => "compact",
            LogFormat::Pretty => "pretty",
        }
    }
}

impl FromStr for LogFormat {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "compact" => Ok(LogFormat::Compact),
            "pretty" => Ok(LogFormat::Pretty),
            other => Err(AppError::Configuration(format!(
                "Unknown log format: {}",
                other
            ))),
        }
    }
}

/// Build the level filter; `RUST_LOG` wins over the configured level
fn build_filter(log_level: &str) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }

    EnvFilter::try_new(log_level).map_err(|e| {
        AppError::Configuration(format!("Invalid log level {:?}: {}", log_level, e))
    })
}

/// Install the global subscriber for the admission counter service
///
/// Fails when the format or level is unknown, or when a subscriber is
/// already installed.
pub fn init_tracing(config: &ObservabilityConfig, backend: &str) -> Result<()> {
    let format: LogFormat = config.log_format.parse()?;
    let filter = build_filter(&config.log_level)?;

    let registry = tracing_subscriber::registry().with(filter);

    let installed = match format {
        LogFormat::Json => registry
            .with(fmt::layer().json().flatten_event(true))
            .try_init(),
        LogFormat::Compact => registry.with(fmt::layer().compact()).try_init(),
        LogFormat::Pretty => registry.with(fmt::layer().pretty()).try_init(),
    };
    installed.map_err(|e| AppError::Configuration(format!("Tracing already installed: {}", e)))?;

    tracing::info!(
        service = env!("CARGO_PKG_NAME"),
        version = env!("CARGO_PKG_VERSION"),
        backend,
        level = %config.log_level,
        format = format.as_str(),
        "Tracing initialized"
    );

    Ok(())
}
