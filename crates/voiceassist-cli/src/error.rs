//! CLI error types.

use thiserror::Error;

use voiceassist_calendar::AuthError;
use voiceassist_core::{ConfigError, TracingError};

/// Result type for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

/// Errors that end a CLI invocation.
#[derive(Debug, Error)]
pub enum CliError {
    /// Process configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Logging could not be initialized.
    #[error("failed to initialize logging: {0}")]
    Tracing(#[from] TracingError),

    /// Authentication or a calendar call failed.
    #[error("{0}")]
    Auth(#[from] AuthError),
}
