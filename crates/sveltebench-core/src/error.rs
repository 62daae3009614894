//! Unified error types for the core library.

use crate::config::ConfigError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, BenchError>;

#[derive(Debug, Error)]
pub enum BenchError {
    /// The worker process could not be started at all.
    #[error("failed to start worker `{command}`: {source}")]
    Launch {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unsupported provider: {0}")]
    UnsupportedProvider(String),

    #[error("no API key set for {0}")]
    MissingApiKey(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl BenchError {
    pub fn launch(command: impl Into<String>, source: std::io::Error) -> Self {
        Self::Launch {
            command: command.into(),
            source,
        }
    }
}
