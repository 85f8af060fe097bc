//! Query-facing facade over an embedder and a vector index.
//!
//! [`RetrievalService`] owns no global state: the embedding provider and the index are
//! constructed by the caller (usually once at start-up from [`RetrieverConfig`]) and shared
//! through `Arc`s, so one service can be cloned into every request handler.
//!
//! [`RetrieverConfig`]: crate::config::RetrieverConfig

use crate::error::{Result, RetrieverError};
use crate::storage::{NewRecord, SearchFilter, SearchResult, StoreStats, VectorIndex};
use docsearch_context::ChunkMetadata;
use docsearch_embed::{EmbedError, EmbeddingProvider};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Texts sent to the embedder per call while adding documents.
pub const DEFAULT_EMBED_BATCH_SIZE: usize = 32;
/// Results returned when a request does not say otherwise.
pub const DEFAULT_TOP_K: usize = 5;

/// A natural-language query plus optional metadata filters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchRequest {
    pub query: String,
    pub k: usize,
    pub date_year: Option<i32>,
    pub date_year_range: Option<(i32, i32)>,
    pub location: Option<String>,
    pub source_file: Option<String>,
}

impl Default for SearchRequest {
    fn default() -> Self {
        Self {
            query: String::new(),
            k: DEFAULT_TOP_K,
            date_year: None,
            date_year_range: None,
            location: None,
            source_file: None,
        }
    }
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }

    pub fn with_k(self, k: usize) -> Self {
        Self { k, ..self }
    }

    pub fn with_year(self, year: i32) -> Self {
        Self {
            date_year: Some(year),
            ..self
        }
    }

    pub fn with_year_range(self, from: i32, to: i32) -> Self {
        Self {
            date_year_range: Some((from, to)),
            ..self
        }
    }

    pub fn with_location(self, location: impl Into<String>) -> Self {
        Self {
            location: Some(location.into()),
            ..self
        }
    }

    pub fn with_source_file(self, source_file: impl Into<String>) -> Self {
        Self {
            source_file: Some(source_file.into()),
            ..self
        }
    }

    pub fn filter(&self) -> SearchFilter {
        SearchFilter {
            date_year: self.date_year,
            date_year_range: self.date_year_range,
            location: self.location.clone(),
            source_file: self.source_file.clone(),
        }
    }
}

/// Index statistics as reported to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatsResponse {
    pub total_chunks: usize,
    pub unique_files: usize,
    pub dimension: usize,
    /// `"min-max"` over the stored years, absent when no chunk has a year
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year_range: Option<String>,
}

impl From<StoreStats> for StatsResponse {
    fn from(stats: StoreStats) -> Self {
        Self {
            total_chunks: stats.total_chunks,
            unique_files: stats.unique_source_files,
            dimension: stats.dimension,
            year_range: stats.year_range.map(|(lo, hi)| format!("{lo}-{hi}")),
        }
    }
}

/// Adds chunks to and answers queries against one vector index.
#[derive(Clone)]
pub struct RetrievalService {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
    embed_batch_size: usize,
}

impl std::fmt::Debug for RetrievalService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetrievalService")
            .field("embedder", &self.embedder.provider_name())
            .field("index", &self.index.backend_name())
            .field("embed_batch_size", &self.embed_batch_size)
            .finish()
    }
}

impl RetrievalService {
    /// Pair an embedder with an index. Both must agree on the vector dimension.
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, index: Arc<dyn VectorIndex>) -> Result<Self> {
        if embedder.embedding_dimension() != index.dimension() {
            return Err(RetrieverError::DimensionMismatch {
                expected: index.dimension(),
                actual: embedder.embedding_dimension(),
            });
        }

        tracing::info!(
            "Retrieval service using {} embeddings and the {} index",
            embedder.provider_name(),
            index.backend_name()
        );
        Ok(Self {
            embedder,
            index,
            embed_batch_size: DEFAULT_EMBED_BATCH_SIZE,
        })
    }

    pub fn with_embed_batch_size(self, embed_batch_size: usize) -> Result<Self> {
        if embed_batch_size == 0 {
            return Err(RetrieverError::invalid_config(
                "embed_batch_size must be at least 1",
            ));
        }
        Ok(Self {
            embed_batch_size,
            ..self
        })
    }

    pub fn embedder(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedder
    }

    pub fn index(&self) -> &Arc<dyn VectorIndex> {
        &self.index
    }

    /// Embed `chunks` and store them with their metadata. Returns the total chunk count.
    ///
    /// Nothing is stored unless every chunk was embedded. An empty input changes nothing.
    pub async fn add_documents(
        &self,
        chunks: Vec<String>,
        metadatas: Vec<ChunkMetadata>,
    ) -> Result<usize> {
        if chunks.len() != metadatas.len() {
            return Err(RetrieverError::LengthMismatch {
                chunks: chunks.len(),
                metadatas: metadatas.len(),
            });
        }
        if chunks.is_empty() {
            return Ok(self.index.stats().await?.total_chunks);
        }

        let mut embeddings = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(self.embed_batch_size) {
            let result = self.embedder.embed_texts(batch).await?;
            if result.len() != batch.len() {
                return Err(EmbedError::empty_result(format!(
                    "embedder returned {} vectors for {} texts",
                    result.len(),
                    batch.len()
                ))
                .into());
            }
            tracing::debug!("Embedded batch of {} chunks", batch.len());
            embeddings.extend(result.embeddings);
        }

        let records: Vec<NewRecord> = chunks
            .into_iter()
            .zip(metadatas)
            .zip(embeddings)
            .map(|((text, metadata), embedding)| NewRecord::new(text, metadata, embedding))
            .collect();
        let added = records.len();

        let total = self.index.insert(records).await?;
        tracing::info!("Added {} chunks, index holds {}", added, total);
        Ok(total)
    }

    /// Embed the query text and return the nearest matching chunks.
    pub async fn search(&self, request: &SearchRequest) -> Result<Vec<SearchResult>> {
        if request.k == 0 {
            return Ok(Vec::new());
        }

        let query = self.embedder.embed_text(&request.query).await?;
        let results = self
            .index
            .search(&query, request.k, &request.filter())
            .await?;

        tracing::debug!(
            "Query {:?} returned {} results",
            request.query,
            results.len()
        );
        Ok(results)
    }

    pub async fn clear(&self) -> Result<()> {
        self.index.clear().await
    }

    pub async fn stats(&self) -> Result<StatsResponse> {
        Ok(self.index.stats().await?.into())
    }

    /// Source files already present in the index.
    pub async fn indexed_sources(&self) -> Result<BTreeSet<String>> {
        self.index.indexed_sources().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SqliteIndex;
    use async_trait::async_trait;
    use docsearch_embed::{EmbeddingResult, HashingEmbedder};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fails every call after the first `succeed` ones.
    struct FlakyEmbedder {
        inner: HashingEmbedder,
        calls: AtomicUsize,
        succeed: usize,
    }

    #[async_trait]
    impl EmbeddingProvider for FlakyEmbedder {
        async fn embed_texts(&self, texts: &[String]) -> docsearch_embed::Result<EmbeddingResult> {
            if self.calls.fetch_add(1, Ordering::SeqCst) >= self.succeed {
                return Err(EmbedError::embedding_gen(std::io::Error::other(
                    "model unavailable",
                )));
            }
            self.inner.embed_texts(texts).await
        }

        fn embedding_dimension(&self) -> usize {
            self.inner.embedding_dimension()
        }

        fn provider_name(&self) -> &str {
            "flaky"
        }
    }

    async fn memory_index(dimension: usize) -> Arc<dyn VectorIndex> {
        Arc::new(
            SqliteIndex::open_memory(dimension, Default::default())
                .await
                .unwrap(),
        )
    }

    fn metadatas(n: usize) -> Vec<ChunkMetadata> {
        (0..n).map(|i| ChunkMetadata::for_source("a.pdf", i)).collect()
    }

    #[test]
    fn test_search_request_defaults() {
        let request: SearchRequest = serde_json::from_str(r#"{"query": "gold"}"#).unwrap();
        assert_eq!(request.k, 5);
        assert!(request.filter().is_empty());

        let request = SearchRequest::new("gold")
            .with_k(3)
            .with_year_range(1850, 1900)
            .with_location("Bendigo");
        let filter = request.filter();
        assert_eq!(filter.date_year_range, Some((1850, 1900)));
        assert_eq!(filter.location.as_deref(), Some("Bendigo"));
    }

    #[test]
    fn test_stats_response_year_range() {
        let stats = StoreStats {
            total_chunks: 3,
            unique_source_files: 2,
            dimension: 384,
            year_range: Some((1851, 1902)),
        };
        let response = StatsResponse::from(stats.clone());
        assert_eq!(response.year_range.as_deref(), Some("1851-1902"));

        let empty = StatsResponse::from(StoreStats {
            year_range: None,
            ..stats
        });
        let json = serde_json::to_value(&empty).unwrap();
        assert!(json.get("year_range").is_none());
        assert_eq!(json["unique_files"], 2);
    }

    #[tokio::test]
    async fn test_dimension_must_agree() {
        let embedder = Arc::new(HashingEmbedder::new(8).unwrap());
        let result = RetrievalService::new(embedder, memory_index(16).await);
        assert!(matches!(
            result,
            Err(RetrieverError::DimensionMismatch {
                expected: 16,
                actual: 8
            })
        ));
    }

    #[tokio::test]
    async fn test_length_mismatch() {
        let service =
            RetrievalService::new(Arc::new(HashingEmbedder::new(8).unwrap()), memory_index(8).await)
                .unwrap();
        let result = service
            .add_documents(vec!["a".to_string(), "b".to_string()], metadatas(1))
            .await;
        assert!(matches!(
            result,
            Err(RetrieverError::LengthMismatch {
                chunks: 2,
                metadatas: 1
            })
        ));
    }

    #[tokio::test]
    async fn test_embedding_failure_inserts_nothing() {
        let embedder = Arc::new(FlakyEmbedder {
            inner: HashingEmbedder::new(8).unwrap(),
            calls: AtomicUsize::new(0),
            succeed: 1,
        });
        let service = RetrievalService::new(embedder, memory_index(8).await)
            .unwrap()
            .with_embed_batch_size(2)
            .unwrap();

        let chunks: Vec<String> = (0..5).map(|i| format!("chunk number {i}")).collect();
        let result = service.add_documents(chunks, metadatas(5)).await;

        assert!(matches!(result, Err(RetrieverError::Embedding(_))));
        assert_eq!(service.stats().await.unwrap().total_chunks, 0);
    }

    #[tokio::test]
    async fn test_zero_batch_size_is_rejected() {
        let service =
            RetrievalService::new(Arc::new(HashingEmbedder::new(8).unwrap()), memory_index(8).await)
                .unwrap();
        assert!(service.with_embed_batch_size(0).is_err());
    }
}
