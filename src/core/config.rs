use crate::core::errors::ConfigError;
use std::env;
use std::time::Duration;
use tracing::Level;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub log_level: Level,
}

/// Remote model configuration
#[derive(Clone)]
pub struct ApiConfig {
    pub api_key: String,
    pub api_base: String,
    pub model: String,
    pub timeout_seconds: u64,
}

// Hand-written so the key never shows up in `{:?}` output
impl std::fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiConfig")
            .field("api_key", &"<redacted>")
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .field("timeout_seconds", &self.timeout_seconds)
            .finish()
    }
}

/// Retry / backoff configuration
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts, including the first one
    pub max_retries: u32,
    /// Wait after the first failed attempt; doubles after each further failure
    pub base_delay_ms: u64,
}

/// Main application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub api: ApiConfig,
    pub retry: RetryConfig,
}

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-preview-09-2025";

impl Config {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if it exists
        let _ = dotenvy::dotenv();

        let config = Self::load_from_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Build a configuration pointing at a specific endpoint, with defaults elsewhere.
    /// Used by tests and by callers embedding the pipeline.
    pub fn for_endpoint(api_base: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            server: ServerConfig {
                port: 1420,
                host: "127.0.0.1".to_string(),
                log_level: Level::INFO,
            },
            api: ApiConfig {
                api_key: api_key.into(),
                api_base: api_base.into(),
                model: DEFAULT_MODEL.to_string(),
                timeout_seconds: 60,
            },
            retry: RetryConfig {
                max_retries: 3,
                base_delay_ms: 1000,
            },
        }
    }

    pub fn with_retry(mut self, max_retries: u32, base_delay_ms: u64) -> Self {
        self.retry = RetryConfig {
            max_retries,
            base_delay_ms,
        };
        self
    }

    fn load_from_env() -> Result<Self, ConfigError> {
        let api_key = env::var("GEMINI_API_KEY")
            .map(|s| s.trim().to_string())
            .unwrap_or_default();

        let log_level = env::var("LOG_LEVEL")
            .ok()
            .and_then(|s| parse_level(&s))
            .unwrap_or(Level::INFO);

        Ok(Self {
            server: ServerConfig {
                port: env::var("SERVER_PORT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(1420),
                host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                log_level,
            },
            api: ApiConfig {
                api_key,
                api_base: env::var("GEMINI_API_BASE")
                    .map(|s| s.trim_end_matches('/').to_string())
                    .unwrap_or_else(|_| DEFAULT_API_BASE.to_string()),
                model: env::var("GEMINI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
                timeout_seconds: env::var("API_TIMEOUT_SECONDS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(60),
            },
            retry: RetryConfig {
                max_retries: env::var("MAX_RETRIES")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(3),
                base_delay_ms: env::var("RETRY_BASE_DELAY_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(1000),
            },
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api.api_key.is_empty() {
            return Err(ConfigError::MissingApiKey);
        }

        if !(self.api.api_base.starts_with("http://") || self.api.api_base.starts_with("https://")) {
            return Err(ConfigError::InvalidApiConfig(format!(
                "api_base must be an http(s) URL, got '{}'",
                self.api.api_base
            )));
        }

        if self.api.model.trim().is_empty() {
            return Err(ConfigError::InvalidApiConfig("model must not be empty".to_string()));
        }

        if self.api.timeout_seconds == 0 {
            return Err(ConfigError::InvalidApiConfig(
                "timeout_seconds must be > 0".to_string(),
            ));
        }

        if self.retry.max_retries == 0 {
            return Err(ConfigError::InvalidMaxRetries(self.retry.max_retries));
        }

        if self.server.host.is_empty() {
            return Err(ConfigError::InvalidServerConfig("host must not be empty".to_string()));
        }

        Ok(())
    }

    pub fn server_port(&self) -> u16 {
        self.server.port
    }

    pub fn server_host(&self) -> &str {
        &self.server.host
    }

    pub fn log_level(&self) -> Level {
        self.server.log_level
    }

    pub fn api_key(&self) -> &str {
        &self.api.api_key
    }

    pub fn model(&self) -> &str {
        &self.api.model
    }

    pub fn api_timeout(&self) -> Duration {
        Duration::from_secs(self.api.timeout_seconds)
    }

    /// Full `generateContent` URL, without the key
    pub fn generate_content_url(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.api.api_base.trim_end_matches('/'),
            self.api.model
        )
    }

    pub fn max_retries(&self) -> u32 {
        self.retry.max_retries
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry.base_delay_ms)
    }
}

fn parse_level(raw: &str) -> Option<Level> {
    match raw.to_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" | "warning" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}

/// Filter directive for `tracing_subscriber::EnvFilter`
pub fn level_directive(level: Level) -> &'static str {
    match level {
        Level::TRACE => "trace",
        Level::DEBUG => "debug",
        Level::INFO => "info",
        Level::WARN => "warn",
        Level::ERROR => "error",
    }
}
