//! Configuration management for taskdeck.
//!
//! Configuration can be set via environment variables:
//! - `TASKDECK_API_BASE_URL` - Optional. Backend base URL. Defaults to `http://localhost:8000`.
//! - `TASKDECK_API_KEY` - Optional. Static API key sent as `X-API-Key`. Forces polling.
//! - `TASKDECK_APP_NAME` - Optional. Title shown by the CLI.
//! - `TASKDECK_ENVIRONMENT` - Optional. `local`, `dev` or `development` enable verbose logs. Defaults to `local`.
//! - `TASKDECK_POLL_INTERVAL_MS` - Optional. Polling interval. Defaults to `2500`.
//! - `TASKDECK_HTTP_TIMEOUT_SECS` - Optional. Per-request timeout. Defaults to `15`.
//! - `TASKDECK_HISTORY_PAGE_SIZE` - Optional. History page size. Defaults to `20`.
//! - `TASKDECK_PUSH_ENABLED` - Optional. Set to `false` to disable the event stream entirely.
//! - `TASKDECK_DATA_DIR` - Optional. Directory for the theme preference. Defaults to `./.taskdeck`.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 2500;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Client configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Backend base URL, without trailing slash
    pub api_base_url: String,

    /// Static API key, if any
    pub api_key: Option<String>,

    pub app_name: String,

    /// Deployment environment name
    pub environment: String,

    /// Interval between status polls when the event stream is unavailable
    pub poll_interval: Duration,

    pub http_timeout: Duration,

    pub history_page_size: u32,

    /// Whether the push transport may be used at all
    pub push_enabled: bool,

    /// Directory holding persisted client preferences
    pub data_dir: PathBuf,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if a variable is set but cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_base_url = normalize_base_url(
            &std::env::var("TASKDECK_API_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_API_BASE_URL.to_string()),
        )?;

        let api_key = std::env::var("TASKDECK_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty());

        let app_name = std::env::var("TASKDECK_APP_NAME")
            .unwrap_or_else(|_| "Agent Orchestrator Dashboard".to_string());

        let environment =
            std::env::var("TASKDECK_ENVIRONMENT").unwrap_or_else(|_| "local".to_string());

        let poll_interval_ms: u64 = parse_var("TASKDECK_POLL_INTERVAL_MS", DEFAULT_POLL_INTERVAL_MS)?;
        if poll_interval_ms == 0 {
            return Err(ConfigError::InvalidValue(
                "TASKDECK_POLL_INTERVAL_MS".to_string(),
                "must be greater than zero".to_string(),
            ));
        }

        let http_timeout_secs: u64 = parse_var("TASKDECK_HTTP_TIMEOUT_SECS", 15)?;

        let history_page_size: u32 = parse_var("TASKDECK_HISTORY_PAGE_SIZE", 20)?;

        let push_enabled = std::env::var("TASKDECK_PUSH_ENABLED")
            .ok()
            .map(|v| {
                parse_bool(&v)
                    .map_err(|e| ConfigError::InvalidValue("TASKDECK_PUSH_ENABLED".to_string(), e))
            })
            .transpose()?
            .unwrap_or(true);

        let data_dir = std::env::var("TASKDECK_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                std::env::current_dir()
                    .unwrap_or_else(|_| PathBuf::from("."))
                    .join(".taskdeck")
            });

        Ok(Self {
            api_base_url,
            api_key,
            app_name,
            environment,
            poll_interval: Duration::from_millis(poll_interval_ms),
            http_timeout: Duration::from_secs(http_timeout_secs),
            history_page_size: history_page_size.max(1),
            push_enabled,
            data_dir,
        })
    }

    /// Create a config with default values (useful for testing).
    pub fn new(api_base_url: &str) -> Self {
        Self {
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            api_key: None,
            app_name: "Agent Orchestrator Dashboard".to_string(),
            environment: "local".to_string(),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            http_timeout: Duration::from_secs(15),
            history_page_size: 20,
            push_enabled: true,
            data_dir: PathBuf::from(".taskdeck"),
        }
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Local and development environments log request traces.
    pub fn is_local_env(&self) -> bool {
        matches!(
            self.environment.trim().to_lowercase().as_str(),
            "local" | "development" | "dev"
        )
    }

    /// Default `tracing` filter directive for this environment.
    pub fn default_log_filter(&self) -> &'static str {
        if self.is_local_env() {
            "taskdeck=debug"
        } else {
            "taskdeck=info"
        }
    }
}

fn normalize_base_url(raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim().trim_end_matches('/');
    url::Url::parse(trimmed).map_err(|e| {
        ConfigError::InvalidValue("TASKDECK_API_BASE_URL".to_string(), format!("{}", e))
    })?;
    Ok(trimmed.to_string())
}

fn parse_var<T>(name: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), format!("{}", e))),
        Err(_) => Ok(default),
    }
}

fn parse_bool(value: &str) -> Result<bool, String> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "t" | "yes" | "y" | "on" => Ok(true),
        "0" | "false" | "f" | "no" | "n" | "off" => Ok(false),
        other => Err(format!("expected boolean-like value, got: {}", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_is_stripped() {
        assert_eq!(
            normalize_base_url("http://api.local:8000/").expect("valid url"),
            "http://api.local:8000"
        );
        assert!(normalize_base_url("not a url").is_err());
    }

    #[test]
    fn local_environments_are_detected() {
        let mut config = Config::new("http://localhost:8000");
        assert!(config.is_local_env());
        config.environment = "Development".to_string();
        assert!(config.is_local_env());
        config.environment = "production".to_string();
        assert!(!config.is_local_env());
        assert_eq!(config.default_log_filter(), "taskdeck=info");
    }

    #[test]
    fn bool_parsing_accepts_common_spellings() {
        assert_eq!(parse_bool("Yes"), Ok(true));
        assert_eq!(parse_bool(" off "), Ok(false));
        assert!(parse_bool("maybe").is_err());
    }
}
