use std::path::PathBuf;

use d4log_events::{EventLogError, WebhookError};
use d4log_memory::MemoryError;

/// Invalid or missing configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} must be a whole number, got '{value}'")]
    InvalidNumber { var: &'static str, value: String },

    #[error("{var} must be at least {min}, got {value}")]
    TooSmall {
        var: &'static str,
        min: u64,
        value: u64,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Memory(#[from] MemoryError),

    #[error("Failed to access offsets file {path}: {source}")]
    OffsetsIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Offsets file {path} is not valid: {source}")]
    OffsetsFormat {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid offset table: {0}")]
    InvalidOffsets(String),

    #[error(transparent)]
    EventLog(#[from] EventLogError),

    #[error(transparent)]
    Webhook(#[from] WebhookError),

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, AgentError>;
