//! Configuration for embedding models

use crate::error::{EmbedError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Embedding dimension of the default sentence model.
pub const DEFAULT_DIMENSION: usize = 384;

/// Built-in sentence models that produce vectors of the index dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KnownModel {
    /// sentence-transformers/all-MiniLM-L6-v2
    AllMiniLmL6V2,
    /// BAAI/bge-small-en-v1.5
    BgeSmallEnV15,
}

impl KnownModel {
    /// Resolve a configured model name, accepting the short and the repository form.
    pub fn from_name(name: &str) -> Result<Self> {
        match name.to_lowercase().as_str() {
            "all-minilm-l6-v2" | "sentence-transformers/all-minilm-l6-v2" => {
                Ok(Self::AllMiniLmL6V2)
            }
            "bge-small-en-v1.5" | "baai/bge-small-en-v1.5" => Ok(Self::BgeSmallEnV15),
            _ => Err(EmbedError::UnknownModel {
                name: name.to_string(),
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::AllMiniLmL6V2 => "all-MiniLM-L6-v2",
            Self::BgeSmallEnV15 => "bge-small-en-v1.5",
        }
    }

    pub fn dimension(&self) -> usize {
        DEFAULT_DIMENSION
    }
}

/// Configuration for the FastEmbed provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbedConfig {
    /// Name of the embedding model to use
    pub model_name: String,
    /// Directory where model files are downloaded and cached
    pub cache_dir: Option<PathBuf>,
    /// Maximum number of texts handed to the model per inference call
    pub batch_size: usize,
    /// Whether to L2-normalize embeddings
    pub normalize: bool,
    /// Print download progress when fetching model files
    pub show_download_progress: bool,
}

impl Default for EmbedConfig {
    fn default() -> Self {
        Self {
            model_name: KnownModel::AllMiniLmL6V2.name().to_string(),
            cache_dir: None,
            batch_size: 32,
            normalize: true,
            show_download_progress: false,
        }
    }
}

impl EmbedConfig {
    /// Create a configuration for the named model with default settings.
    pub fn new(model_name: impl Into<String>) -> Self {
        Self {
            model_name: model_name.into(),
            ..Self::default()
        }
    }

    /// Create a default configuration caching model files under `cache_dir`
    pub fn default_with_path<P: AsRef<Path>>(cache_dir: P) -> Self {
        Self::default().with_cache_dir(cache_dir)
    }

    /// Set the batch size for embedding generation (builder style)
    pub fn with_batch_size(self, batch_size: usize) -> Self {
        Self { batch_size, ..self }
    }

    /// Set whether to normalize embeddings (builder style)
    pub fn with_normalize(self, normalize: bool) -> Self {
        Self { normalize, ..self }
    }

    /// Set the model cache directory (builder style)
    pub fn with_cache_dir<P: AsRef<Path>>(self, cache_dir: P) -> Self {
        Self {
            cache_dir: Some(cache_dir.as_ref().to_path_buf()),
            ..self
        }
    }

    pub fn with_download_progress(self, show_download_progress: bool) -> Self {
        Self {
            show_download_progress,
            ..self
        }
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// Resolve the configured model.
    pub fn model(&self) -> Result<KnownModel> {
        KnownModel::from_name(&self.model_name)
    }

    /// Validate settings before any model is loaded.
    pub fn validate(&self) -> Result<()> {
        self.model()?;
        if self.batch_size == 0 {
            return Err(EmbedError::invalid_config("batch_size must be at least 1"));
        }
        tracing::debug!("Embedding configuration valid for: {}", self.model_name);
        Ok(())
    }
}
