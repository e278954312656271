use crate::errors::{AppError, Result};
use serde::Deserialize;
use std::env;
use std::fmt;

/// Deployment environment the service runs in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl Environment {
    /// Read the environment from `ADMISSION_ENV`, defaulting to development
    pub fn from_env() -> Result<Self> {
        match env::var("ADMISSION_ENV") {
            Ok(value) => value.parse(),
            Err(_) => Ok(Environment::Development),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Test => "test",
            Environment::Production => "production",
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }

    /// dotenv file loaded for this environment
    pub fn dotenv_file(&self) -> &'static str {
        match self {
            Environment::Development => ".env.dev",
            _ => ".env.prod",
        }
    }
}

impl std::str::FromStr for Environment {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "test" => Ok(Environment::Test),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(AppError::Configuration(format!(
                "Unknown environment: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_environment")]
    pub environment: Environment,
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub limiter: LimiterConfig,
    pub observability: ObservabilityConfig,
}

fn default_environment() -> Environment {
    Environment::Development
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Redis,
    Memory,
}

impl StoreBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreBackend::Redis => "redis",
            StoreBackend::Memory => "memory",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub redis: RedisConfig,
    /// Sweep interval for expired windows when running the in-memory backend
    pub memory_purge_interval_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub url: String,
    pub connection_timeout_seconds: u64,
}

/// What the calling layer does when the counter store cannot answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreFailurePolicy {
    /// Surface the failure to the client
    Propagate,
    /// Admit the request
    FailOpen,
    /// Reject the request as if the limit were exceeded
    FailClosed,
}

impl StoreFailurePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreFailurePolicy::Propagate => "propagate",
            StoreFailurePolicy::FailOpen => "fail_open",
            StoreFailurePolicy::FailClosed => "fail_closed",
        }
    }
}

/// Longest window a limiter may be configured with (one year)
pub const MAX_WINDOW_SECONDS: u64 = 365 * 24 * 60 * 60;

#[derive(Debug, Clone, Deserialize)]
pub struct LimiterConfig {
    pub key_prefix: String,
    pub points: u64,
    pub duration_seconds: u64,
    pub store_timeout_ms: u64,
    /// Overrides the environment-derived enforcement when set
    pub enforce: Option<bool>,
    pub store_failure_policy: StoreFailurePolicy,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObservabilityConfig {
    pub log_level: String,
    pub log_format: String,
    pub metrics_enabled: bool,
}

impl Config {
    /// Load configuration from dotenv files, config files and environment variables
    pub fn load() -> Result<Self> {
        let environment = Environment::from_env()?;

        // Environment-specific dotenv file first, plain .env as a fallback
        dotenvy::from_filename(environment.dotenv_file()).ok();
        dotenvy::dotenv().ok();

        // The dotenv file may itself pick the environment
        let environment = Environment::from_env()?;

        let config = config::Config::builder()
            // Start with default config
            .add_source(config::File::with_name("config/default"))
            // Add environment-specific config
            .add_source(
                config::File::with_name(&format!("config/{}", environment)).required(false),
            )
            // Add environment variables with prefix ADMISSION
            // e.g., ADMISSION__LIMITER__POINTS=10
            .add_source(
                config::Environment::with_prefix("ADMISSION")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override("environment", environment.as_str())?
            .build()?;

        config.try_deserialize().map_err(AppError::from)
    }

    /// Whether the limiter actually counts in this deployment
    pub fn enforce(&self) -> bool {
        self.limiter
            .enforce
            .unwrap_or_else(|| self.environment.is_production())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(AppError::Configuration("Invalid port number".to_string()));
        }

        if self.store.backend == StoreBackend::Redis && self.store.redis.url.is_empty() {
            return Err(AppError::Configuration(
                "Redis URL is required".to_string(),
            ));
        }

        if self.store.backend == StoreBackend::Memory && self.store.memory_purge_interval_seconds == 0
        {
            return Err(AppError::Configuration(
                "Memory purge interval must be positive".to_string(),
            ));
        }

        if self.limiter.key_prefix.trim().is_empty() {
            return Err(AppError::Configuration(
                "Limiter key prefix is required".to_string(),
            ));
        }

        if self.limiter.points == 0 {
            return Err(AppError::Configuration(
                "Limiter points must be at least 1".to_string(),
            ));
        }

        if self.limiter.duration_seconds == 0 {
            return Err(AppError::Configuration(
                "Limiter window duration must be at least 1 second".to_string(),
            ));
        }

        if self.limiter.duration_seconds > MAX_WINDOW_SECONDS {
            return Err(AppError::Configuration(format!(
                "Limiter window duration must not exceed {} seconds",
                MAX_WINDOW_SECONDS
            )));
        }

        if self.limiter.store_timeout_ms == 0 {
            return Err(AppError::Configuration(
                "Store timeout must be positive".to_string(),
            ));
        }

        self.observability
            .log_format
            .parse::<crate::observability::LogFormat>()?;

        Ok(())
    }
}

#[cfg(test)]
pub(crate) fn test_config() -> Config {
    Config {
        environment: Environment::Test,
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 8080,
        },
        store: StoreConfig {
            backend: StoreBackend::Memory,
            redis: RedisConfig {
                url: "redis://localhost:6379".to_string(),
                connection_timeout_seconds: 5,
            },
            memory_purge_interval_seconds: 60,
        },
        limiter: LimiterConfig {
            key_prefix: "test:rl".to_string(),
            points: 5,
            duration_seconds: 60,
            store_timeout_ms: 250,
            enforce: Some(true),
            store_failure_policy: StoreFailurePolicy::Propagate,
        },
        observability: ObservabilityConfig {
            log_level: "debug".to_string(),
            log_format: "pretty".to_string(),
            metrics_enabled: true,
        },
    }
}
