//! SQLite implementation of [`VectorIndex`] with inverted-file approximate search.
//!
//! Every chunk is a row of the `documents` table; metadata columns are indexed so filters are
//! evaluated by SQLite. Locations are also stored lower-cased with Rust's Unicode case mapping,
//! since `LIKE` only folds ASCII. Embeddings are L2-normalized and stored as little blobs of `f32`.
//! Rows are partitioned into lists around centroids kept in `ivf_lists`; a search ranks the
//! centroids against the query, reads only the rows of the nearest `probes` lists that pass
//! the SQL filter, and scores those candidates exactly.
//!
//! ## Database Schema
//!
//! ```sql
//! CREATE TABLE documents (
//!     id INTEGER PRIMARY KEY AUTOINCREMENT,  -- insertion order, used for tie-breaks
//!     content TEXT NOT NULL,
//!     embedding BLOB NOT NULL,               -- unit-length f32 vector
//!     source_file TEXT, file_type TEXT, file_path TEXT,
//!     chunk_index INTEGER NOT NULL,
//!     date_year INTEGER, location TEXT,
//!     location_folded TEXT,                  -- lower-cased location, for filtering
//!     list_id INTEGER NOT NULL,              -- inverted-file partition
//!     created_at TIMESTAMP NOT NULL
//! );
//! CREATE TABLE ivf_lists (list_id INTEGER PRIMARY KEY, centroid BLOB NOT NULL);
//! CREATE TABLE index_settings (key TEXT PRIMARY KEY, value TEXT NOT NULL);
//! ```
//!
//! ## List maintenance
//!
//! Until `lists` centroids exist, each inserted vector that is not already a centroid seeds a
//! new list. After that, rows join the nearest existing list. [`SqliteIndex::train_lists`]
//! reclusters all stored vectors with k-means when the seeded lists no longer reflect the
//! data.

use super::ivf;
use super::{
    NewRecord, SearchFilter, SearchResult, StoreStats, VectorIndex, check_dimensions, dot,
};
use crate::error::{Result, RetrieverError};
use async_trait::async_trait;
use chrono::Utc;
use docsearch_context::ChunkMetadata;
use docsearch_embed::l2_normalize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{QueryBuilder, Row, Sqlite, SqliteConnection, SqlitePool};
use std::collections::BTreeSet;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tokio::sync::Mutex;

/// Rows per multi-row `INSERT` statement.
const MAX_ROWS_PER_STATEMENT: usize = 500;

/// Inverted-file tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SqliteIndexOptions {
    /// Maximum number of lists (centroids)
    pub lists: usize,
    /// Lists read per query
    pub probes: usize,
}

impl Default for SqliteIndexOptions {
    fn default() -> Self {
        Self {
            lists: 100,
            probes: 10,
        }
    }
}

impl SqliteIndexOptions {
    pub fn validate(&self) -> Result<()> {
        if self.lists == 0 || self.probes == 0 {
            return Err(RetrieverError::invalid_config(
                "lists and probes must be at least 1",
            ));
        }
        Ok(())
    }
}

/// SQLite-backed approximate nearest-neighbor index.
#[derive(Debug)]
pub struct SqliteIndex {
    pool: SqlitePool,
    dimension: usize,
    options: SqliteIndexOptions,
    writer: Mutex<()>,
}

struct Candidate {
    id: i64,
    text: String,
    metadata: ChunkMetadata,
    embedding: Vec<f32>,
}

impl SqliteIndex {
    /// Open (or create) the database file at `path`.
    pub async fn open(
        path: impl AsRef<Path>,
        dimension: usize,
        options: SqliteIndexOptions,
    ) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| RetrieverError::io(parent, e))?;
        }

        let pool = SqlitePool::connect_with(
            SqliteConnectOptions::new()
                .filename(path)
                .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
                .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
                .busy_timeout(Duration::from_secs(5))
                .create_if_missing(true)
                .optimize_on_close(true, 1 << 10),
        )
        .await
        .map_err(|e| RetrieverError::store(format!("open {}", path.display()), e))?;

        tracing::info!("Opened SQLite index at {}", path.display());
        Self::new_with_pool(pool, dimension, options).await
    }

    /// Open a private in-memory database, mainly for tests.
    pub async fn open_memory(dimension: usize, options: SqliteIndexOptions) -> Result<Self> {
        let connect = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| RetrieverError::store("open in-memory database", e))?;
        // Each connection to :memory: is its own database, so keep exactly one alive.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(connect)
            .await
            .map_err(|e| RetrieverError::store("open in-memory database", e))?;
        Self::new_with_pool(pool, dimension, options).await
    }

    async fn new_with_pool(
        pool: SqlitePool,
        dimension: usize,
        options: SqliteIndexOptions,
    ) -> Result<Self> {
        if dimension == 0 {
            return Err(RetrieverError::invalid_config(
                "index dimension must be at least 1",
            ));
        }
        options.validate()?;

        Self::create_tables(&pool).await?;
        Self::check_dimension(&pool, dimension).await?;

        Ok(Self {
            pool,
            dimension,
            options,
            writer: Mutex::new(()),
        })
    }

    async fn create_tables(pool: &SqlitePool) -> Result<()> {
        let statements = [
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                content TEXT NOT NULL,
                embedding BLOB NOT NULL,
                source_file TEXT,
                file_type TEXT,
                file_path TEXT,
                chunk_index INTEGER NOT NULL,
                date_year INTEGER,
                location TEXT,
                location_folded TEXT,
                list_id INTEGER NOT NULL,
                created_at TIMESTAMP NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS ivf_lists (
                list_id INTEGER PRIMARY KEY,
                centroid BLOB NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS index_settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )
            "#,
            "CREATE INDEX IF NOT EXISTS idx_documents_source_file ON documents(source_file)",
            "CREATE INDEX IF NOT EXISTS idx_documents_date_year ON documents(date_year)",
            "CREATE INDEX IF NOT EXISTS idx_documents_location_folded ON documents(location_folded)",
            "CREATE INDEX IF NOT EXISTS idx_documents_list_id ON documents(list_id)",
        ];

        for statement in statements {
            sqlx::query(statement)
                .execute(pool)
                .await
                .map_err(|e| RetrieverError::store("create tables", e))?;
        }
        Ok(())
    }

    async fn check_dimension(pool: &SqlitePool, dimension: usize) -> Result<()> {
        let stored: Option<String> =
            sqlx::query_scalar("SELECT value FROM index_settings WHERE key = 'dimension'")
                .fetch_optional(pool)
                .await
                .map_err(|e| RetrieverError::store("read index settings", e))?;

        match stored {
            None => {
                sqlx::query("INSERT INTO index_settings (key, value) VALUES ('dimension', ?)")
                    .bind(dimension.to_string())
                    .execute(pool)
                    .await
                    .map_err(|e| RetrieverError::store("write index settings", e))?;
                Ok(())
            }
            Some(value) => match value.parse::<usize>() {
                Ok(actual) if actual == dimension => Ok(()),
                Ok(actual) => Err(RetrieverError::DimensionMismatch {
                    expected: dimension,
                    actual,
                }),
                Err(_) => Err(RetrieverError::invalid_config(format!(
                    "stored index dimension '{value}' is not a number"
                ))),
            },
        }
    }

    pub fn options(&self) -> SqliteIndexOptions {
        self.options
    }

    /// Number of inverted-file lists currently defined.
    pub async fn list_count(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM ivf_lists")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| RetrieverError::store("count lists", e))?;
        Ok(count as usize)
    }

    /// Recluster every stored vector with k-means and reassign all rows.
    ///
    /// Returns the number of lists after training. Runs in one transaction.
    pub async fn train_lists(&self, max_iterations: usize) -> Result<usize> {
        let _writer = self.writer.lock().await;
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| RetrieverError::store("begin train", e))?;

        let rows = sqlx::query("SELECT id, embedding FROM documents ORDER BY id")
            .fetch_all(&mut *tx)
            .await
            .map_err(|e| RetrieverError::store("train: read vectors", e))?;

        let mut ids = Vec::with_capacity(rows.len());
        let mut vectors = Vec::with_capacity(rows.len());
        for row in &rows {
            let id: i64 = row
                .try_get("id")
                .map_err(|e| RetrieverError::store("train: decode id", e))?;
            let blob: Vec<u8> = row
                .try_get("embedding")
                .map_err(|e| RetrieverError::store("train: decode embedding", e))?;
            ids.push(id);
            vectors.push(self.decode_vector(&blob)?);
        }

        let partition = ivf::train(&vectors, self.options.lists, max_iterations);

        sqlx::query("DELETE FROM ivf_lists")
            .execute(&mut *tx)
            .await
            .map_err(|e| RetrieverError::store("train: delete lists", e))?;
        let centroids: Vec<(usize, &Vec<f32>)> =
            partition.centroids.iter().enumerate().collect();
        insert_centroids(&mut tx, &centroids).await?;

        for (id, list_id) in ids.iter().zip(&partition.assignments) {
            sqlx::query("UPDATE documents SET list_id = ? WHERE id = ?")
                .bind(*list_id as i64)
                .bind(*id)
                .execute(&mut *tx)
                .await
                .map_err(|e| RetrieverError::store("train: assign list", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| RetrieverError::store("commit train", e))?;

        tracing::info!(
            "Trained {} lists over {} vectors",
            partition.centroids.len(),
            vectors.len()
        );
        Ok(partition.centroids.len())
    }

    fn decode_vector(&self, blob: &[u8]) -> Result<Vec<f32>> {
        if blob.len() != self.dimension * 4 {
            return Err(RetrieverError::DimensionMismatch {
                expected: self.dimension,
                actual: blob.len() / 4,
            });
        }
        Ok(bytemuck::pod_collect_to_vec::<u8, f32>(blob))
    }

    async fn load_centroids(&self, conn: &mut SqliteConnection) -> Result<Vec<Vec<f32>>> {
        let blobs: Vec<Vec<u8>> =
            sqlx::query_scalar("SELECT centroid FROM ivf_lists ORDER BY list_id")
                .fetch_all(conn)
                .await
                .map_err(|e| RetrieverError::store("read lists", e))?;
        blobs.iter().map(|b| self.decode_vector(b)).collect()
    }

    async fn fetch_candidates(
        &self,
        conn: &mut SqliteConnection,
        filter: &SearchFilter,
        lists: Option<&[usize]>,
    ) -> Result<Vec<Candidate>> {
        let mut clauses: Vec<String> = Vec::new();
        let mut qb = QueryBuilder::<Sqlite>::new(
            "SELECT id, content, embedding, source_file, file_type, file_path, chunk_index, \
             date_year, location FROM documents WHERE 1 = 1",
        );

        if let Some(year) = filter.date_year {
            clauses.push(format!("date_year = {year}"));
            qb.push(" AND date_year = ").push_bind(year);
        }
        if let Some((from, to)) = filter.date_year_range {
            clauses.push(format!("date_year BETWEEN {from} AND {to}"));
            qb.push(" AND date_year BETWEEN ")
                .push_bind(from)
                .push(" AND ")
                .push_bind(to);
        }
        if let Some(location) = &filter.location {
            let folded = location.to_lowercase();
            clauses.push(format!("location_folded LIKE '%{folded}%'"));
            qb.push(" AND location_folded LIKE ")
                .push_bind(like_pattern(&folded))
                .push(" ESCAPE '\\'");
        }
        if let Some(source_file) = &filter.source_file {
            clauses.push(format!("source_file = '{source_file}'"));
            qb.push(" AND source_file = ").push_bind(source_file.clone());
        }
        if let Some(lists) = lists {
            clauses.push(format!("list_id IN {lists:?}"));
            qb.push(" AND list_id IN (");
            let mut separated = qb.separated(", ");
            for list in lists {
                separated.push_bind(*list as i64);
            }
            separated.push_unseparated(")");
        }

        let context = if clauses.is_empty() {
            "search".to_string()
        } else {
            format!("search where {}", clauses.join(" AND "))
        };
        tracing::debug!("{}", context);

        let rows = qb
            .build()
            .fetch_all(conn)
            .await
            .map_err(|e| RetrieverError::store(&context, e))?;

        rows.iter()
            .map(|row| {
                let (candidate, blob) =
                    decode_candidate(row).map_err(|e| RetrieverError::store(&context, e))?;
                Ok(Candidate {
                    embedding: self.decode_vector(&blob)?,
                    ..candidate
                })
            })
            .collect()
    }
}

fn embedding_blob(vector: &[f32]) -> Vec<u8> {
    bytemuck::cast_slice::<f32, u8>(vector).to_vec()
}

/// `%needle%` with LIKE wildcards in `needle` escaped.
fn like_pattern(needle: &str) -> String {
    let escaped = needle
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

fn decode_candidate(row: &SqliteRow) -> std::result::Result<(Candidate, Vec<u8>), sqlx::Error> {
    let chunk_index: i64 = row.try_get("chunk_index")?;
    let date_year: Option<i64> = row.try_get("date_year")?;
    let metadata = ChunkMetadata {
        source_file: row.try_get("source_file")?,
        file_type: row.try_get("file_type")?,
        file_path: row.try_get("file_path")?,
        chunk_index: chunk_index as usize,
        date_year: date_year.map(|y| y as i32),
        location: row.try_get("location")?,
    };

    Ok((
        Candidate {
            id: row.try_get("id")?,
            text: row.try_get("content")?,
            metadata,
            embedding: Vec::new(),
        },
        row.try_get("embedding")?,
    ))
}

async fn insert_centroids(
    conn: &mut SqliteConnection,
    centroids: &[(usize, &Vec<f32>)],
) -> Result<()> {
    for chunk in centroids.chunks(MAX_ROWS_PER_STATEMENT) {
        let mut qb = QueryBuilder::<Sqlite>::new("INSERT INTO ivf_lists (list_id, centroid) ");
        qb.push_values(chunk, |mut row, (list_id, centroid)| {
            row.push_bind(*list_id as i64)
                .push_bind(embedding_blob(centroid));
        });
        qb.build()
            .execute(&mut *conn)
            .await
            .map_err(|e| RetrieverError::store("insert lists", e))?;
    }
    Ok(())
}

#[async_trait]
impl VectorIndex for SqliteIndex {
    async fn insert(&self, records: Vec<NewRecord>) -> Result<usize> {
        check_dimensions(self.dimension, &records)?;
        if records.is_empty() {
            return Ok(self.stats().await?.total_chunks);
        }

        let records: Vec<NewRecord> = records
            .into_iter()
            .map(|mut record| {
                l2_normalize(&mut record.embedding);
                record
            })
            .collect();

        let _writer = self.writer.lock().await;
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| RetrieverError::store("begin insert", e))?;

        let mut centroids = self.load_centroids(&mut tx).await?;
        let first_new_list = centroids.len();
        let mut list_ids = Vec::with_capacity(records.len());
        for record in &records {
            if centroids.len() < self.options.lists
                && !centroids.iter().any(|c| *c == record.embedding)
            {
                centroids.push(record.embedding.clone());
            }
            list_ids.push(ivf::nearest(&centroids, &record.embedding).unwrap_or(0));
        }

        let seeded: Vec<(usize, &Vec<f32>)> =
            centroids.iter().enumerate().skip(first_new_list).collect();
        insert_centroids(&mut tx, &seeded).await?;

        let now = Utc::now();
        let rows: Vec<(&NewRecord, usize)> = records.iter().zip(list_ids).collect();
        for chunk in rows.chunks(MAX_ROWS_PER_STATEMENT) {
            let mut qb = QueryBuilder::<Sqlite>::new(
                "INSERT INTO documents (content, embedding, source_file, file_type, file_path, \
                 chunk_index, date_year, location, location_folded, list_id, created_at) ",
            );
            qb.push_values(chunk, |mut row, (record, list_id)| {
                let md = &record.metadata;
                row.push_bind(record.text.as_str())
                    .push_bind(embedding_blob(&record.embedding))
                    .push_bind(md.source_file.as_deref())
                    .push_bind(md.file_type.as_deref())
                    .push_bind(md.file_path.as_deref())
                    .push_bind(md.chunk_index as i64)
                    .push_bind(md.date_year)
                    .push_bind(md.location.as_deref())
                    .push_bind(md.location.as_ref().map(|l| l.to_lowercase()))
                    .push_bind(*list_id as i64)
                    .push_bind(now);
            });
            qb.build()
                .execute(&mut *tx)
                .await
                .map_err(|e| RetrieverError::store("insert documents", e))?;
        }

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents")
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| RetrieverError::store("count documents", e))?;
        tx.commit()
            .await
            .map_err(|e| RetrieverError::store("commit insert", e))?;

        tracing::info!(
            "Inserted {} records ({} new lists), SQLite index now holds {}",
            records.len(),
            centroids.len() - first_new_list,
            total
        );
        Ok(total as usize)
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
        if k == 0 {
            return Ok(Vec::new());
        }

        let mut query = query.to_vec();
        l2_normalize(&mut query);

        // One read transaction so lists and rows come from the same snapshot.
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| RetrieverError::store("begin search", e))?;

        let centroids = self.load_centroids(&mut tx).await?;
        if centroids.is_empty() {
            return Ok(Vec::new());
        }

        let probed = ivf::nearest_n(&centroids, &query, self.options.probes);
        let mut candidates = self.fetch_candidates(&mut tx, filter, Some(&probed)).await?;
        if candidates.len() < k && probed.len() < centroids.len() {
            tracing::debug!(
                "Probed lists gave {} of {} candidates, scanning all lists",
                candidates.len(),
                k
            );
            candidates = self.fetch_candidates(&mut tx, filter, None).await?;
        }
        tx.commit()
            .await
            .map_err(|e| RetrieverError::store("end search", e))?;

        let mut scored: Vec<(f32, Candidate)> = candidates
            .into_iter()
            .map(|c| (1.0 - dot(&query, &c.embedding).clamp(-1.0, 1.0), c))
            .collect();
        scored.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.id.cmp(&b.1.id)));

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(distance, c)| SearchResult {
                text: c.text,
                metadata: c.metadata,
                similarity: 1.0 - distance,
                distance,
            })
            .collect())
    }

    async fn clear(&self) -> Result<()> {
        let _writer = self.writer.lock().await;
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| RetrieverError::store("begin clear", e))?;
        sqlx::query("DELETE FROM documents")
            .execute(&mut *tx)
            .await
            .map_err(|e| RetrieverError::store("clear documents", e))?;
        sqlx::query("DELETE FROM ivf_lists")
            .execute(&mut *tx)
            .await
            .map_err(|e| RetrieverError::store("clear lists", e))?;
        tx.commit()
            .await
            .map_err(|e| RetrieverError::store("commit clear", e))?;

        tracing::info!("Cleared SQLite index");
        Ok(())
    }

    async fn stats(&self) -> Result<StoreStats> {
        let (total, files, min_year, max_year): (i64, i64, Option<i64>, Option<i64>) =
            sqlx::query_as(
                "SELECT COUNT(*), COUNT(DISTINCT source_file), MIN(date_year), MAX(date_year) \
                 FROM documents",
            )
            .fetch_one(&self.pool)
            .await
            .map_err(|e| RetrieverError::store("stats", e))?;

        Ok(StoreStats {
            total_chunks: total as usize,
            unique_source_files: files as usize,
            dimension: self.dimension,
            year_range: min_year.zip(max_year).map(|(lo, hi)| (lo as i32, hi as i32)),
        })
    }

    async fn indexed_sources(&self) -> Result<BTreeSet<String>> {
        let sources: Vec<String> = sqlx::query_scalar(
            "SELECT DISTINCT source_file FROM documents WHERE source_file IS NOT NULL",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RetrieverError::store("list sources", e))?;
        Ok(sources.into_iter().collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn backend_name(&self) -> &'static str {
        "sqlite"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn rec(text: &str, source: &str, embedding: Vec<f32>) -> NewRecord {
        NewRecord::new(text, ChunkMetadata::for_source(source, 0), embedding)
    }

    fn options(lists: usize, probes: usize) -> SqliteIndexOptions {
        SqliteIndexOptions { lists, probes }
    }

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("bend"), "%bend%");
        assert_eq!(like_pattern("50%_off\\"), "%50\\%\\_off\\\\%");
    }

    #[tokio::test]
    async fn test_cosine_scores() {
        let index = SqliteIndex::open_memory(2, SqliteIndexOptions::default())
            .await
            .unwrap();
        index
            .insert(vec![
                rec("east", "a.pdf", vec![2.0, 0.0]),
                rec("north", "a.pdf", vec![0.0, 5.0]),
            ])
            .await
            .unwrap();

        let results = index
            .search(&[1.0, 0.0], 2, &SearchFilter::default())
            .await
            .unwrap();
        assert_eq!(results[0].text, "east");
        assert!(results[0].distance.abs() < 1e-6);
        assert!((results[0].similarity - 1.0).abs() < 1e-6);
        assert_eq!(results[1].text, "north");
        assert!((results[1].distance - 1.0).abs() < 1e-6);
        assert!(results[1].similarity.abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_self_match_similarity_never_exceeds_one() {
        let dim = 384;
        let index = SqliteIndex::open_memory(dim, SqliteIndexOptions::default())
            .await
            .unwrap();
        let vectors: Vec<Vec<f32>> = (0..50)
            .map(|i| {
                (0..dim)
                    .map(|j| ((i * 31 + j * 17) as f32 * 0.37).sin())
                    .collect()
            })
            .collect();
        let records = vectors
            .iter()
            .enumerate()
            .map(|(i, v)| rec(&format!("r{i}"), "a.pdf", v.clone()))
            .collect();
        index.insert(records).await.unwrap();

        for vector in &vectors {
            let results = index
                .search(vector, 1, &SearchFilter::default())
                .await
                .unwrap();
            assert!(results[0].similarity <= 1.0);
            assert!(results[0].distance >= 0.0);
        }
    }

    #[tokio::test]
    async fn test_seeding_stops_at_list_limit() {
        let index = SqliteIndex::open_memory(2, options(2, 1)).await.unwrap();
        index
            .insert(vec![
                rec("a", "a.pdf", vec![1.0, 0.0]),
                rec("a again", "a.pdf", vec![1.0, 0.0]),
                rec("b", "a.pdf", vec![0.0, 1.0]),
                rec("c", "a.pdf", vec![-1.0, 0.0]),
            ])
            .await
            .unwrap();

        assert_eq!(index.list_count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_unprobed_lists_are_scanned_when_short() {
        let index = SqliteIndex::open_memory(2, options(2, 1)).await.unwrap();
        index
            .insert(vec![
                rec("east", "a.pdf", vec![1.0, 0.0]),
                rec("north", "b.pdf", vec![0.0, 1.0]),
            ])
            .await
            .unwrap();

        let results = index
            .search(&[1.0, 0.1], 2, &SearchFilter::default())
            .await
            .unwrap();
        let texts: Vec<_> = results.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, vec!["east", "north"]);

        let filter = SearchFilter {
            source_file: Some("b.pdf".to_string()),
            ..Default::default()
        };
        let results = index.search(&[1.0, 0.1], 1, &filter).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].text, "north");
    }

    #[tokio::test]
    async fn test_train_lists_keeps_results() {
        let index = SqliteIndex::open_memory(2, options(4, 1)).await.unwrap();
        let mut records = Vec::new();
        for i in 0..12 {
            let angle = i as f32 * 0.5;
            records.push(rec(&format!("r{i}"), "a.pdf", vec![angle.cos(), angle.sin()]));
        }
        index.insert(records).await.unwrap();
        assert_eq!(index.list_count().await.unwrap(), 4);

        let lists = index.train_lists(10).await.unwrap();
        assert_eq!(lists, 4);
        assert_eq!(index.list_count().await.unwrap(), 4);

        let angle = 7.0f32 * 0.5;
        let results = index
            .search(&[angle.cos(), angle.sin()], 1, &SearchFilter::default())
            .await
            .unwrap();
        assert_eq!(results[0].text, "r7");
        assert_eq!(index.stats().await.unwrap().total_chunks, 12);
    }

    #[tokio::test]
    async fn test_train_empty_index() {
        let index = SqliteIndex::open_memory(2, SqliteIndexOptions::default())
            .await
            .unwrap();
        assert_eq!(index.train_lists(5).await.unwrap(), 0);
        assert!(index
            .search(&[1.0, 0.0], 3, &SearchFilter::default())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_large_batch_spans_statements() {
        let index = SqliteIndex::open_memory(3, options(8, 2)).await.unwrap();
        let records: Vec<NewRecord> = (0..1201)
            .map(|i| {
                let x = i as f32;
                let source = format!("f{}.pdf", i % 7);
                rec(&format!("r{i}"), &source, vec![x.sin(), x.cos(), 1.0])
            })
            .collect();

        assert_eq!(index.insert(records).await.unwrap(), 1201);
        let stats = index.stats().await.unwrap();
        assert_eq!(stats.total_chunks, 1201);
        assert_eq!(stats.unique_source_files, 7);
        assert_eq!(index.indexed_sources().await.unwrap().len(), 7);
    }

    #[tokio::test]
    async fn test_reopen_file_database() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("documents.db");
        {
            let index = SqliteIndex::open(&path, 2, SqliteIndexOptions::default())
                .await
                .unwrap();
            index
                .insert(vec![rec("kept", "a.pdf", vec![1.0, 0.0])])
                .await
                .unwrap();
        }

        let index = SqliteIndex::open(&path, 2, SqliteIndexOptions::default())
            .await
            .unwrap();
        assert_eq!(index.stats().await.unwrap().total_chunks, 1);

        let mismatch = SqliteIndex::open(&path, 3, SqliteIndexOptions::default()).await;
        assert!(matches!(
            mismatch,
            Err(RetrieverError::DimensionMismatch {
                expected: 3,
                actual: 2
            })
        ));
    }

    #[tokio::test]
    async fn test_invalid_options() {
        assert!(SqliteIndex::open_memory(2, options(0, 1)).await.is_err());
        assert!(SqliteIndex::open_memory(2, options(1, 0)).await.is_err());
        assert!(SqliteIndex::open_memory(0, options(1, 1)).await.is_err());
    }
}
