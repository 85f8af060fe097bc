//! Error types for document extraction and chunking

use std::path::PathBuf;

/// Result type for context operations.
pub type Result<T> = std::result::Result<T, ContextError>;

/// Errors raised while turning a document into chunks.
///
/// Every variant carries enough context (the offending path or the rejected setting)
/// for the ingestion loop to log the failure and move on to the next file.
#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    /// The file extension is not one of the supported document formats
    #[error("Unsupported file type '{extension}' for {path}: only PDF and DOCX are supported")]
    UnsupportedFormat { path: PathBuf, extension: String },

    /// The file could be read but its content could not be decoded
    #[error("Failed to extract text from {path}: {message}")]
    Extraction { path: PathBuf, message: String },

    /// Chunk window settings that cannot produce forward progress
    #[error("Invalid chunk configuration: {message}")]
    InvalidChunkConfig { message: String },

    /// IO errors when reading source documents
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ContextError {
    /// Create an extraction error for `path` from anything displayable.
    pub fn extraction<P, M>(path: P, message: M) -> Self
    where
        P: Into<PathBuf>,
        M: std::fmt::Display,
    {
        Self::Extraction {
            path: path.into(),
            message: message.to_string(),
        }
    }

    /// Create an invalid chunk configuration error with a custom message.
    pub fn invalid_chunk_config<S: Into<String>>(message: S) -> Self {
        Self::InvalidChunkConfig {
            message: message.into(),
        }
    }
}
