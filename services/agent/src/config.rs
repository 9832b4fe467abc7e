use mago_core::{BackendCredentialProvider, SearchClient, session::DEFAULT_MODEL};
use reqwest::Url;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub backend_url: String,
    pub search_url: String,
    pub realtime_url: String,
    pub realtime_model: String,
    pub request_timeout: Duration,
    pub log_level: Level,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let backend_url = url_var("BACKEND_URL", BackendCredentialProvider::DEFAULT_BASE_URL)?;
        let search_url = url_var("SEARCH_URL", SearchClient::DEFAULT_BASE_URL)?;
        let realtime_url = url_var("REALTIME_URL", openai_realtime::DEFAULT_URL)?;

        let realtime_model =
            std::env::var("REALTIME_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        if realtime_model.trim().is_empty() {
            return Err(ConfigError::MissingVar(
                "REALTIME_MODEL must not be empty".to_string(),
            ));
        }

        let timeout_str =
            std::env::var("REQUEST_TIMEOUT_SECS").unwrap_or_else(|_| "30".to_string());
        let request_timeout = match timeout_str.parse::<u64>() {
            Ok(secs) if secs > 0 => Duration::from_secs(secs),
            _ => {
                return Err(ConfigError::InvalidValue(
                    "REQUEST_TIMEOUT_SECS".to_string(),
                    format!("'{}' is not a positive number of seconds", timeout_str),
                ));
            }
        };

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        Ok(Self {
            backend_url,
            search_url,
            realtime_url,
            realtime_model,
            request_timeout,
            log_level,
        })
    }
}

fn url_var(name: &str, default: &str) -> Result<String, ConfigError> {
    let value = std::env::var(name).unwrap_or_else(|_| default.to_string());
    Url::parse(&value).map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string()))?;
    Ok(value)
}
