//! Error types for the retriever crate.

use docsearch_context::ContextError;
use docsearch_embed::EmbedError;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RetrieverError>;

#[derive(Error, Debug)]
pub enum RetrieverError {
    #[error(transparent)]
    Context(#[from] ContextError),

    #[error("Embedding failed: {0}")]
    Embedding(#[from] EmbedError),

    #[error("Store error during {context}: {source}")]
    Store {
        context: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("Persistence error at {path}: {message}")]
    Persistence { path: PathBuf, message: String },

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Got {chunks} chunks but {metadatas} metadata entries")]
    LengthMismatch { chunks: usize, metadatas: usize },

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Async task failed: {0}")]
    AsyncTask(#[from] tokio::task::JoinError),
}

impl RetrieverError {
    pub fn store(context: impl Into<String>, source: sqlx::Error) -> Self {
        Self::Store {
            context: context.into(),
            source,
        }
    }

    pub fn persistence(path: impl Into<PathBuf>, message: impl std::fmt::Display) -> Self {
        Self::Persistence {
            path: path.into(),
            message: message.to_string(),
        }
    }

    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
