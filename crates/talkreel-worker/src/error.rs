//! Pipeline error types.

use std::path::PathBuf;

use thiserror::Error;

pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Speech synthesis failed: {message}")]
    Synthesis { message: String, retryable: bool },

    #[error("{operation} failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        operation: String,
        attempts: u32,
        #[source]
        source: Box<PipelineError>,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error at {path}: {source}")]
    PathIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Media error: {0}")]
    Media(#[from] talkreel_media::MediaError),

    #[error("Model error: {0}")]
    Model(#[from] talkreel_models::ModelError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// A synthesis failure worth another attempt.
    pub fn synthesis_transient(msg: impl Into<String>) -> Self {
        Self::Synthesis {
            message: msg.into(),
            retryable: true,
        }
    }

    /// A synthesis failure that will not go away on retry.
    pub fn synthesis_fatal(msg: impl Into<String>) -> Self {
        Self::Synthesis {
            message: msg.into(),
            retryable: false,
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn path_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::PathIo {
            path: path.into(),
            source,
        }
    }

    /// Check if error is retryable.
    ///
    /// Only external service calls are retried; media, model and filesystem
    /// failures abort the run.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PipelineError::Synthesis { retryable: true, .. })
    }

    /// Check if error stems from configuration rather than a runtime failure.
    pub fn is_config(&self) -> bool {
        match self {
            PipelineError::Config(_) | PipelineError::Model(_) => true,
            PipelineError::Media(e) => e.is_config(),
            _ => false,
        }
    }
}
