//! Error handling for the linechat CLI

use thiserror::Error;

use crate::config::ConfigError;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Chat client error: {0}")]
    Chat(#[from] linechat_core::ChatError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Companion server error: {0}")]
    Companion(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Session ended: {0}")]
    SessionEnded(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

impl From<anyhow::Error> for CliError {
    fn from(err: anyhow::Error) -> Self {
        CliError::Companion(format!("{:#}", err))
    }
}
