//! Deterministic feature-hashing embedder.
//!
//! Maps each lower-cased alphanumeric token to a signed bucket with FNV-1a and L2-normalizes
//! the bucket counts. Texts sharing words end up close together, which is enough for
//! offline indexing and for tests that must not download a model.

use crate::config::DEFAULT_DIMENSION;
use crate::error::{EmbedError, Result};
use crate::provider::{EmbeddingProvider, EmbeddingResult, l2_normalize};
use async_trait::async_trait;
use fnv::FnvHasher;
use std::hash::Hasher;

/// Stateless hashing embedder; safe to call from any number of tasks at once.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self {
            dimension: DEFAULT_DIMENSION,
        }
    }
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(EmbedError::invalid_config("dimension must be at least 1"));
        }
        Ok(Self { dimension })
    }

    /// Embed one text synchronously.
    pub fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];

        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|token| !token.is_empty())
        {
            let mut hasher = FnvHasher::default();
            hasher.write(token.to_lowercase().as_bytes());
            let hash = hasher.finish();

            let bucket = (hash % self.dimension as u64) as usize;
            let sign = if (hash >> 63) == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        l2_normalize(&mut vector);
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for HashingEmbedder {
    async fn embed_texts(&self, texts: &[String]) -> Result<EmbeddingResult> {
        Ok(EmbeddingResult::new(
            texts.iter().map(|text| self.embed(text)).collect(),
        ))
    }

    fn embedding_dimension(&self) -> usize {
        self.dimension
    }

    fn provider_name(&self) -> &str {
        "hashing"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn norm(v: &[f32]) -> f32 {
        v.iter().map(|x| x * x).sum::<f32>().sqrt()
    }

    #[test]
    fn test_dimension_and_unit_length() {
        let embedder = HashingEmbedder::default();
        let v = embedder.embed("Quartz reef near Bendigo");

        assert_eq!(v.len(), 384);
        assert!((norm(&v) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_deterministic_and_case_insensitive() {
        let embedder = HashingEmbedder::default();

        assert_eq!(embedder.embed("Gold Lease"), embedder.embed("gold lease"));
        assert_eq!(embedder.embed("gold, lease!"), embedder.embed("gold lease"));
    }

    #[test]
    fn test_text_without_tokens_is_zero_vector() {
        let embedder = HashingEmbedder::new(8).unwrap();
        assert_eq!(embedder.embed("  ... "), vec![0.0; 8]);
    }

    #[test]
    fn test_zero_dimension_is_rejected() {
        assert!(HashingEmbedder::new(0).is_err());
    }

    #[tokio::test]
    async fn test_batch_preserves_order() {
        let embedder = HashingEmbedder::default();
        let texts = vec!["first text".to_string(), "second text".to_string()];

        let result = embedder.embed_texts(&texts).await.unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(result.dimension, 384);
        assert_eq!(result.embeddings[0], embedder.embed("first text"));
        assert_eq!(result.embeddings[1], embedder.embed("second text"));

        let single = embedder.embed_text("second text").await.unwrap();
        assert_eq!(single, result.embeddings[1]);

        let empty = embedder.embed_texts(&[]).await.unwrap();
        assert!(empty.is_empty());
    }
}
