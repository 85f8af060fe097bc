//! Exact in-process vector index with snapshot persistence.
//!
//! `FlatIndex` keeps every record in one `Vec` behind a `tokio::sync::RwLock` and answers
//! queries by brute force: the squared Euclidean distance to every stored vector is computed,
//! the full list is ranked, and filters are applied to the ranked list. Similarity is
//! reported as `1 / (1 + distance)`.
//!
//! Every insert and clear writes a complete snapshot (see [`snapshot`](super::snapshot))
//! before the new state becomes visible, so the store on disk always equals the last state a
//! caller observed as committed. Building, encoding, and writing the next record list all
//! happen on a blocking task; the record list is shared behind an `Arc` so readers and the
//! writer never copy it on the async side.

use super::snapshot::{self, Snapshot};
use super::{
    IndexedRecord, NewRecord, RecordId, SearchFilter, SearchResult, StoreStats, VectorIndex,
    check_dimensions, squared_l2,
};
use crate::error::{Result, RetrieverError};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct FlatState {
    records: Arc<Vec<IndexedRecord>>,
    next_id: RecordId,
    generation: u64,
}

/// Exact nearest-neighbor index persisted as a snapshot directory.
#[derive(Debug)]
pub struct FlatIndex {
    dir: Arc<PathBuf>,
    dimension: usize,
    state: RwLock<FlatState>,
    load_warning: Option<String>,
}

impl FlatIndex {
    /// Open the index stored in `dir`, creating the directory if needed.
    ///
    /// A snapshot that cannot be read does not fail the open: the problem is logged, kept in
    /// [`load_warning`](Self::load_warning), and the index starts empty. The next successful
    /// write replaces the unreadable snapshot.
    pub async fn open(dir: impl AsRef<Path>, dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(RetrieverError::invalid_config(
                "index dimension must be at least 1",
            ));
        }

        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| RetrieverError::io(&dir, e))?;

        let load_dir = dir.clone();
        let loaded =
            tokio::task::spawn_blocking(move || snapshot::load(&load_dir, dimension)).await?;

        let (state, load_warning) = match loaded {
            Ok(Some(Snapshot {
                generation,
                next_id,
                records,
            })) => {
                tracing::info!(
                    "Loaded {} records (generation {}) from {}",
                    records.len(),
                    generation,
                    dir.display()
                );
                let state = FlatState {
                    records: Arc::new(records),
                    next_id,
                    generation,
                };
                (state, None)
            }
            Ok(None) => {
                tracing::info!("No snapshot in {}, starting empty", dir.display());
                (FlatState::default(), None)
            }
            Err(e) => {
                tracing::warn!("Could not load snapshot from {}: {}", dir.display(), e);
                (FlatState::default(), Some(e.to_string()))
            }
        };

        Ok(Self {
            dir: Arc::new(dir),
            dimension,
            state: RwLock::new(state),
            load_warning,
        })
    }

    /// Why the snapshot on disk was ignored at open, if it was.
    pub fn load_warning(&self) -> Option<&str> {
        self.load_warning.as_deref()
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Append `added` to `current`, then encode and write the result as snapshot `generation`
    /// on a blocking task. Returns the new record list.
    async fn persist(
        &self,
        generation: u64,
        next_id: RecordId,
        current: Arc<Vec<IndexedRecord>>,
        added: Vec<IndexedRecord>,
    ) -> Result<Vec<IndexedRecord>> {
        let dir = Arc::clone(&self.dir);
        let dimension = self.dimension;
        tokio::task::spawn_blocking(move || -> Result<Vec<IndexedRecord>> {
            let mut records = Vec::with_capacity(current.len() + added.len());
            records.extend(current.iter().cloned());
            records.extend(added);

            let encoded = snapshot::encode(generation, dimension, next_id, &records)?;
            snapshot::write(&dir, &encoded)?;
            Ok(records)
        })
        .await?
    }
}

#[async_trait]
impl VectorIndex for FlatIndex {
    async fn insert(&self, records: Vec<NewRecord>) -> Result<usize> {
        check_dimensions(self.dimension, &records)?;

        let mut state = self.state.write().await;
        if records.is_empty() {
            return Ok(state.records.len());
        }

        let now = Utc::now();
        let added: Vec<IndexedRecord> = records
            .into_iter()
            .enumerate()
            .map(|(offset, record)| IndexedRecord {
                id: state.next_id + offset as RecordId,
                text: record.text,
                metadata: record.metadata,
                embedding: record.embedding,
                inserted_at: now,
            })
            .collect();
        let next_id = state.next_id + added.len() as RecordId;
        let generation = state.generation + 1;

        let records = self
            .persist(generation, next_id, Arc::clone(&state.records), added)
            .await?;

        state.records = Arc::new(records);
        state.next_id = next_id;
        state.generation = generation;

        tracing::info!("Flat index now holds {} records", state.records.len());
        Ok(state.records.len())
    }

    async fn search(
        &self,
        query: &[f32],
        k: usize,
        filter: &SearchFilter,
    ) -> Result<Vec<SearchResult>> {
        if query.len() != self.dimension {
            return Err(RetrieverError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }

        let state = self.state.read().await;
        if k == 0 || state.records.is_empty() {
            return Ok(Vec::new());
        }

        let mut ranked: Vec<(f32, &IndexedRecord)> = state
            .records
            .iter()
            .map(|record| (squared_l2(query, &record.embedding), record))
            .collect();
        ranked.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.id.cmp(&b.1.id)));

        let results: Vec<SearchResult> = ranked
            .into_iter()
            .filter(|(_, record)| filter.matches(&record.metadata))
            .take(k)
            .map(|(distance, record)| SearchResult {
                text: record.text.clone(),
                metadata: record.metadata.clone(),
                similarity: 1.0 / (1.0 + distance),
                distance,
            })
            .collect();

        tracing::debug!(
            "Flat search over {} records returned {} results",
            state.records.len(),
            results.len()
        );
        Ok(results)
    }

    async fn clear(&self) -> Result<()> {
        let mut state = self.state.write().await;
        let generation = state.generation + 1;

        self.persist(generation, 0, Arc::default(), Vec::new()).await?;

        *state = FlatState {
            records: Arc::default(),
            next_id: 0,
            generation,
        };
        tracing::info!("Cleared flat index in {}", self.dir.display());
        Ok(())
    }

    async fn stats(&self) -> Result<StoreStats> {
        let state = self.state.read().await;
        Ok(StoreStats::from_metadata(
            self.dimension,
            state.records.iter().map(|r| &r.metadata),
        ))
    }

    async fn indexed_sources(&self) -> Result<BTreeSet<String>> {
        let state = self.state.read().await;
        Ok(state
            .records
            .iter()
            .filter_map(|r| r.metadata.source_file.clone())
            .collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn backend_name(&self) -> &'static str {
        "flat"
    }
}
