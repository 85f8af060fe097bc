//! Embedding provider implementations

use crate::config::{EmbedConfig, KnownModel};
use crate::error::{EmbedError, Result};
use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::sync::{Arc, Mutex};

/// Result of embedding generation
#[derive(Debug, Clone)]
pub struct EmbeddingResult {
    /// The generated embeddings, one per input text, in input order
    pub embeddings: Vec<Vec<f32>>,
    /// The dimension of each embedding vector
    pub dimension: usize,
}

impl EmbeddingResult {
    /// Create a new embedding result, inferring the dimension from the first vector.
    ///
    /// An empty result has dimension 0.
    pub fn new(embeddings: Vec<Vec<f32>>) -> Self {
        let dimension = embeddings.first().map(|e| e.len()).unwrap_or(0);
        Self {
            embeddings,
            dimension,
        }
    }

    pub fn len(&self) -> usize {
        self.embeddings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.embeddings.is_empty()
    }
}

/// Trait for embedding providers that can generate embeddings from text
///
/// Implementations are pure functions of their input from the caller's point of view:
/// the same text always maps to the same vector, and `embed_texts` preserves input order.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate the embedding for a single text
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        let result = self.embed_texts(&[text.to_string()]).await?;
        result
            .embeddings
            .into_iter()
            .next()
            .ok_or_else(|| EmbedError::empty_result("no embedding generated for text"))
    }

    /// Generate embeddings for multiple texts (batch processing)
    async fn embed_texts(&self, texts: &[String]) -> Result<EmbeddingResult>;

    /// Get the dimension of embeddings produced by this provider
    fn embedding_dimension(&self) -> usize;

    /// Get the name/identifier of this provider
    fn provider_name(&self) -> &str;
}

/// Scale `vector` to unit length in place. Zero vectors are left untouched.
pub fn l2_normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for value in vector.iter_mut() {
            *value /= norm;
        }
    }
}

/// FastEmbed-based embedding provider running a local ONNX sentence model.
///
/// The loaded model is owned by the provider (cloning shares it). Inference needs exclusive
/// access to the model, so concurrent `embed_texts` calls on clones of one provider are safe
/// but run one batch at a time.
#[derive(Clone)]
pub struct FastEmbedProvider {
    config: EmbedConfig,
    model: Arc<Mutex<TextEmbedding>>,
    dimension: usize,
}

impl std::fmt::Debug for FastEmbedProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FastEmbedProvider")
            .field("config", &self.config)
            .field("dimension", &self.dimension)
            .finish()
    }
}

impl FastEmbedProvider {
    /// Loads the configured model (downloading it on first use) and validates it.
    pub async fn create(config: EmbedConfig) -> Result<Self> {
        config.validate()?;
        let known = config.model()?;

        tracing::info!(
            "Initializing FastEmbed provider for model: {}",
            config.model_name()
        );

        let options = {
            let mut options = InitOptions::new(fastembed_model(known))
                .with_show_download_progress(config.show_download_progress);
            if let Some(cache_dir) = &config.cache_dir {
                options = options.with_cache_dir(cache_dir.clone());
            }
            options
        };

        let model = tokio::task::spawn_blocking(move || -> Result<TextEmbedding> {
            TextEmbedding::try_new(options).map_err(EmbedError::model_init)
        })
        .await??;

        let provider = Self {
            config,
            model: Arc::new(Mutex::new(model)),
            dimension: known.dimension(),
        };
        provider.validate_model().await?;

        tracing::info!(
            "Model loaded successfully. Dimension: {}",
            provider.dimension
        );
        Ok(provider)
    }

    pub fn config(&self) -> &EmbedConfig {
        &self.config
    }

    /// Embed a small probe text and check dimension and finiteness.
    async fn validate_model(&self) -> Result<()> {
        let embeddings = self.run_batch(vec!["validation test".to_string()]).await?;
        let embedding = embeddings
            .first()
            .ok_or_else(|| EmbedError::empty_result("model validation produced no embedding"))?;

        if embedding.len() != self.dimension {
            return Err(EmbedError::DimensionMismatch {
                expected: self.dimension,
                actual: embedding.len(),
            });
        }
        if embedding.iter().any(|value| !value.is_finite()) {
            return Err(EmbedError::invalid_config(
                "Model validation failed: non-finite values in embedding",
            ));
        }

        tracing::debug!("Model validation passed for: {}", self.config.model_name());
        Ok(())
    }

    /// Run one inference call on a blocking thread.
    async fn run_batch(&self, batch: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let model = Arc::clone(&self.model);
        tokio::task::spawn_blocking(move || -> Result<Vec<Vec<f32>>> {
            tracing::debug!("Processing batch of {} texts", batch.len());
            let mut model_guard = model.lock().map_err(|_| EmbedError::External {
                source: anyhow::anyhow!("embedding model lock poisoned"),
            })?;
            model_guard
                .embed(batch, None)
                .map_err(EmbedError::embedding_gen)
        })
        .await?
    }
}

fn fastembed_model(model: KnownModel) -> EmbeddingModel {
    match model {
        KnownModel::AllMiniLmL6V2 => EmbeddingModel::AllMiniLML6V2,
        KnownModel::BgeSmallEnV15 => EmbeddingModel::BGESmallENV15,
    }
}

#[async_trait]
impl EmbeddingProvider for FastEmbedProvider {
    async fn embed_texts(&self, texts: &[String]) -> Result<EmbeddingResult> {
        if texts.is_empty() {
            return Ok(EmbeddingResult::new(vec![]));
        }

        tracing::debug!("Generating embeddings for {} texts", texts.len());

        let mut all_embeddings = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(self.config.batch_size) {
            let mut batch_embeddings = self.run_batch(chunk.to_vec()).await?;

            if batch_embeddings.len() != chunk.len() {
                return Err(EmbedError::empty_result(format!(
                    "model returned {} embeddings for {} texts",
                    batch_embeddings.len(),
                    chunk.len()
                )));
            }
            for embedding in &mut batch_embeddings {
                if embedding.len() != self.dimension {
                    return Err(EmbedError::DimensionMismatch {
                        expected: self.dimension,
                        actual: embedding.len(),
                    });
                }
                if self.config.normalize {
                    l2_normalize(embedding);
                }
            }
            all_embeddings.extend(batch_embeddings);
        }

        tracing::debug!("Generated {} embeddings", all_embeddings.len());
        Ok(EmbeddingResult::new(all_embeddings))
    }

    fn embedding_dimension(&self) -> usize {
        self.dimension
    }

    fn provider_name(&self) -> &str {
        "fastembed"
    }
}
