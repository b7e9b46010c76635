//! Process-wide configuration.
//!
//! [`AppConfig::load`] is called once from `main`: it reads the `.env` file
//! (if any) into the process environment and then parses the `VOICEASSIST_*`
//! variables into typed fields. The resulting value is passed by reference
//! to whatever needs it; nothing in the workspace reads the environment on
//! its own.

use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use tracing::debug;

use crate::tracing::TracingOutputFormat;

pub const ENV_TOKEN_PATH: &str = "VOICEASSIST_TOKEN_PATH";
pub const ENV_CREDENTIALS_PATH: &str = "VOICEASSIST_CREDENTIALS_PATH";
pub const ENV_CALLBACK_PORT: &str = "VOICEASSIST_CALLBACK_PORT";
pub const ENV_HTTP_TIMEOUT_SECS: &str = "VOICEASSIST_HTTP_TIMEOUT_SECS";
pub const ENV_LOG_FORMAT: &str = "VOICEASSIST_LOG_FORMAT";

/// Errors raised while building an [`AppConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The `.env` file exists but could not be read or parsed.
    #[error("failed to load .env file: {0}")]
    Dotenv(#[from] dotenvy::Error),

    /// An environment variable holds a value of the wrong shape.
    #[error("invalid value for {key}: '{value}' ({reason})")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Configuration shared by every component of the process.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// The `.env` file that was loaded, if one was found.
    pub dotenv_path: Option<PathBuf>,
    /// Where the authorized-user token document lives.
    pub token_path: PathBuf,
    /// Where the OAuth client registration (client secrets) lives.
    pub credentials_path: PathBuf,
    /// Loopback port for the consent-flow redirect.
    pub callback_port: u16,
    /// Timeout applied to every outgoing HTTP request.
    pub http_timeout: Duration,
    /// Log output format.
    pub log_format: TracingOutputFormat,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            dotenv_path: None,
            token_path: PathBuf::from(Self::DEFAULT_TOKEN_PATH),
            credentials_path: PathBuf::from(Self::DEFAULT_CREDENTIALS_PATH),
            callback_port: Self::DEFAULT_CALLBACK_PORT,
            http_timeout: Duration::from_secs(Self::DEFAULT_HTTP_TIMEOUT_SECS),
            log_format: TracingOutputFormat::default(),
        }
    }
}

impl AppConfig {
    pub const DEFAULT_TOKEN_PATH: &'static str = "token.json";
    pub const DEFAULT_CREDENTIALS_PATH: &'static str = "credentials.json";
    pub const DEFAULT_CALLBACK_PORT: u16 = 8080;
    pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

    /// Loads `.env` from the working directory (or its parents) and then
    /// reads the environment.
    ///
    /// A missing `.env` file is not an error.
    pub fn load() -> Result<Self, ConfigError> {
        let dotenv_path = match dotenvy::dotenv() {
            Ok(path) => Some(path),
            Err(e) if e.not_found() => None,
            Err(e) => return Err(e.into()),
        };
        Self::finish(dotenv_path)
    }

    /// Like [`load`](Self::load) but with an explicit `.env` file, which must
    /// exist.
    pub fn load_from(dotenv: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = dotenv.as_ref();
        dotenvy::from_path(path)?;
        Self::finish(Some(path.to_path_buf()))
    }

    fn finish(dotenv_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        if let Some(ref path) = dotenv_path {
            debug!("loaded environment from {}", path.display());
        }
        let mut config = Self::from_lookup(|key| std::env::var(key).ok())?;
        config.dotenv_path = dotenv_path;
        Ok(config)
    }

    /// Builds the configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(path) = non_empty(lookup(ENV_TOKEN_PATH)) {
            config.token_path = PathBuf::from(path);
        }
        if let Some(path) = non_empty(lookup(ENV_CREDENTIALS_PATH)) {
            config.credentials_path = PathBuf::from(path);
        }
        if let Some(port) = non_empty(lookup(ENV_CALLBACK_PORT)) {
            config.callback_port = parse_value(ENV_CALLBACK_PORT, &port)?;
        }
        if let Some(secs) = non_empty(lookup(ENV_HTTP_TIMEOUT_SECS)) {
            let secs: u64 = parse_value(ENV_HTTP_TIMEOUT_SECS, &secs)?;
            if secs == 0 {
                return Err(ConfigError::InvalidValue {
                    key: ENV_HTTP_TIMEOUT_SECS,
                    value: secs.to_string(),
                    reason: "timeout must be positive".to_string(),
                });
            }
            config.http_timeout = Duration::from_secs(secs);
        }
        if let Some(format) = non_empty(lookup(ENV_LOG_FORMAT)) {
            config.log_format = parse_value(ENV_LOG_FORMAT, &format)?;
        }

        Ok(config)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_value<T>(key: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        key,
        value: raw.to_string(),
        reason: e.to_string(),
    })
}
