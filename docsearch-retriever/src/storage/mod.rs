//! Storage abstraction layer for docsearch-retriever
//!
//! This module defines the [`VectorIndex`] contract shared by both storage backends,
//! together with the record, filter, and result types that flow through it.
//!
//! ## Key Components
//!
//! - **VectorIndex**: insert, filtered k-nearest-neighbor search, clear, stats
//! - **FlatIndex**: exact in-process search with atomic snapshot persistence
//! - **SqliteIndex**: SQLite-backed inverted-file search with filter pushdown
//! - **Data Types**: records, filters, results, and statistics
//!
//! ## Architecture
//!
//! ```text
//!                 ┌─ FlatIndex   (records.json + vectors-<gen>.bin)
//! VectorIndex ────┤
//!                 └─ SqliteIndex (documents + ivf_lists tables)
//! ```
//!
//! Both backends order results by ascending distance and break ties by insertion order, so
//! callers see the same ordering rules whichever backend is configured. Similarity values are
//! backend-local: the flat index reports `1 / (1 + squared L2 distance)`, the SQLite index
//! `1 - cosine distance`.

use crate::error::{Result, RetrieverError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use docsearch_context::ChunkMetadata;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub mod flat_store;
pub mod ivf;
pub mod snapshot;
pub mod sqlite_store;

pub use flat_store::FlatIndex;
pub use sqlite_store::{SqliteIndex, SqliteIndexOptions};

/// Insertion-ordered record identifier. Smaller ids were inserted earlier.
pub type RecordId = u64;

/// A chunk ready to be stored: its text, metadata, and embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRecord {
    pub text: String,
    pub metadata: ChunkMetadata,
    pub embedding: Vec<f32>,
}

impl NewRecord {
    pub fn new(text: impl Into<String>, metadata: ChunkMetadata, embedding: Vec<f32>) -> Self {
        Self {
            text: text.into(),
            metadata,
            embedding,
        }
    }
}

/// A stored chunk. Owned by the index that holds it.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedRecord {
    pub id: RecordId,
    pub text: String,
    pub metadata: ChunkMetadata,
    pub embedding: Vec<f32>,
    pub inserted_at: DateTime<Utc>,
}

/// One ranked hit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub text: String,
    pub metadata: ChunkMetadata,
    pub similarity: f32,
    pub distance: f32,
}

/// Aggregate statistics, recomputed on every call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub total_chunks: usize,
    pub unique_source_files: usize,
    pub dimension: usize,
    pub year_range: Option<(i32, i32)>,
}

impl StoreStats {
    /// Compute statistics over the metadata of every stored record.
    pub fn from_metadata<'a, I>(dimension: usize, metadata: I) -> Self
    where
        I: IntoIterator<Item = &'a ChunkMetadata>,
    {
        let mut total_chunks = 0;
        let mut sources = BTreeSet::new();
        let mut year_range: Option<(i32, i32)> = None;

        for md in metadata {
            total_chunks += 1;
            if let Some(source) = &md.source_file {
                sources.insert(source.as_str());
            }
            if let Some(year) = md.date_year {
                year_range = Some(match year_range {
                    Some((lo, hi)) => (lo.min(year), hi.max(year)),
                    None => (year, year),
                });
            }
        }

        Self {
            total_chunks,
            unique_source_files: sources.len(),
            dimension,
            year_range,
        }
    }
}

/// Metadata predicates, combined with AND. An empty filter matches every record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchFilter {
    /// Exact year
    pub date_year: Option<i32>,
    /// Inclusive year range; a reversed range matches nothing
    pub date_year_range: Option<(i32, i32)>,
    /// Case-insensitive substring of the record's location
    pub location: Option<String>,
    /// Exact source file name
    pub source_file: Option<String>,
}

impl SearchFilter {
    pub fn is_empty(&self) -> bool {
        self.date_year.is_none()
            && self.date_year_range.is_none()
            && self.location.is_none()
            && self.source_file.is_none()
    }

    /// Whether `metadata` satisfies every predicate. Records lacking a filtered field never
    /// match that predicate.
    pub fn matches(&self, metadata: &ChunkMetadata) -> bool {
        if let Some(year) = self.date_year {
            if metadata.date_year != Some(year) {
                return false;
            }
        }
        if let Some((from, to)) = self.date_year_range {
            match metadata.date_year {
                Some(year) if from <= year && year <= to => {}
                _ => return false,
            }
        }
        if let Some(location) = &self.location {
            let needle = location.to_lowercase();
            match &metadata.location {
                Some(value) if value.to_lowercase().contains(&needle) => {}
                _ => return false,
            }
        }
        if let Some(source_file) = &self.source_file {
            if metadata.source_file.as_deref() != Some(source_file.as_str()) {
                return false;
            }
        }
        true
    }
}

/// Nearest-neighbor store over fixed-dimension embeddings.
///
/// Implementations are safe to share between tasks: searches may run concurrently while
/// mutations are serialized, and a search observes either the state before or after a
/// concurrent mutation, never a mix.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Append records atomically and return the total record count afterwards.
    ///
    /// Every embedding must have [`dimension`](Self::dimension) components; otherwise nothing
    /// is stored. An empty batch is a no-op.
    async fn insert(&self, records: Vec<NewRecord>) -> Result<usize>;

    /// Return up to `k` records matching `filter`, nearest first, ties by insertion order.
    async fn search(
        &self,
        query: &[f32],
        k: usize,
        filter: &SearchFilter,
    ) -> Result<Vec<SearchResult>>;

    /// Remove every record. The index stays usable.
    async fn clear(&self) -> Result<()>;

    async fn stats(&self) -> Result<StoreStats>;

    /// Distinct `source_file` values currently stored.
    async fn indexed_sources(&self) -> Result<BTreeSet<String>>;

    fn dimension(&self) -> usize;

    fn backend_name(&self) -> &'static str;
}

/// Reject a batch if any embedding has the wrong number of components.
pub fn check_dimensions(expected: usize, records: &[NewRecord]) -> Result<()> {
    match records.iter().find(|r| r.embedding.len() != expected) {
        Some(record) => Err(RetrieverError::DimensionMismatch {
            expected,
            actual: record.embedding.len(),
        }),
        None => Ok(()),
    }
}

/// Squared Euclidean distance.
pub fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}
