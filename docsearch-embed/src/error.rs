//! Error types for the embedding system

/// Result type for embedding operations.
pub type Result<T> = std::result::Result<T, EmbedError>;

/// Error type for all embedding operations.
///
/// Covers configuration problems, model loading failures, and runtime failures during
/// embedding generation. Callers in the retrieval layer surface every variant as an
/// embedding failure of the current ingestion or search call.
#[derive(Debug, thiserror::Error)]
pub enum EmbedError {
    /// The configured model name does not map to a known model
    #[error("Unknown embedding model: {name}")]
    UnknownModel { name: String },

    /// Error when model configuration is invalid
    #[error("Invalid model configuration: {message}")]
    InvalidConfig { message: String },

    /// Error during model initialization
    #[error("Model initialization failed: {source}")]
    ModelInitialization {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Error during embedding generation
    #[error("Embedding generation failed: {source}")]
    EmbeddingGeneration {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The model returned vectors of an unexpected length
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The model produced no vector where one was required
    #[error("No embedding generated: {message}")]
    EmptyResult { message: String },

    /// Async task join errors
    #[error("Async task failed: {source}")]
    AsyncTask {
        #[from]
        source: tokio::task::JoinError,
    },

    /// Generic errors from other libraries
    #[error("External error: {source}")]
    External {
        #[from]
        source: anyhow::Error,
    },
}

impl EmbedError {
    /// Wrap an error raised while loading a model.
    pub fn model_init<E>(source: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::ModelInitialization {
            source: source.into(),
        }
    }

    /// Wrap an error raised while generating embeddings.
    pub fn embedding_gen<E>(source: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::EmbeddingGeneration {
            source: source.into(),
        }
    }

    /// Create an invalid configuration error with a custom message.
    pub fn invalid_config<S: Into<String>>(message: S) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create an empty-result error with a custom message.
    pub fn empty_result<S: Into<String>>(message: S) -> Self {
        Self::EmptyResult {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_init_wraps_loader_errors() {
        let err = EmbedError::model_init(anyhow::anyhow!("model.onnx not found"));
        assert!(matches!(err, EmbedError::ModelInitialization { .. }));
        assert_eq!(
            err.to_string(),
            "Model initialization failed: model.onnx not found"
        );
    }

    #[test]
    fn test_embedding_gen_keeps_source() {
        let err = EmbedError::embedding_gen(std::io::Error::other("session closed"));
        assert!(matches!(err, EmbedError::EmbeddingGeneration { .. }));
        assert!(std::error::Error::source(&err).is_some());
    }
}
