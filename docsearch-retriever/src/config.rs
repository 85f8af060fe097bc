//! TOML configuration and start-up wiring.
//!
//! Every section and field has a default, so an empty file (or no file at all) yields a
//! working configuration:
//!
//! ```toml
//! documents_dir = "data/documents"
//!
//! [chunking]
//! chunk_size = 512
//! chunk_overlap = 50
//!
//! [embedding]
//! provider = "fastembed"          # or "hashing"
//! model_name = "all-MiniLM-L6-v2"
//! batch_size = 32
//!
//! [store]
//! backend = "flat"                # or "sqlite"
//! path = "data/vector_store"
//! database = "data/documents.db"
//! lists = 100
//! probes = 10
//!
//! [ingest]
//! embed_batch_size = 32
//! locations = ["Bendigo", "Ballarat"]
//! ```

use crate::error::{Result, RetrieverError};
use crate::retrieval::{DEFAULT_EMBED_BATCH_SIZE, DocumentIngestor, RetrievalService};
use crate::storage::{FlatIndex, SqliteIndex, SqliteIndexOptions, VectorIndex};
use docsearch_context::{Chunker, ChunkerConfig, DEFAULT_LOCATIONS, MetadataEnricher};
use docsearch_embed::{
    DEFAULT_DIMENSION, EmbedConfig, EmbeddingProvider, FastEmbedProvider, HashingEmbedder,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

/// Which [`VectorIndex`] implementation to open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Flat,
    Sqlite,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "flat" => Ok(Self::Flat),
            "sqlite" => Ok(Self::Sqlite),
            _ => Err(format!("Invalid backend: {s} (expected flat or sqlite)")),
        }
    }
}

/// Which embedding provider to construct.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    #[default]
    Fastembed,
    Hashing,
}

impl FromStr for EmbeddingBackend {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fastembed" => Ok(Self::Fastembed),
            "hashing" => Ok(Self::Hashing),
            _ => Err(format!(
                "Invalid embedder: {s} (expected fastembed or hashing)"
            )),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub provider: EmbeddingBackend,
    /// Model settings, used by the fastembed provider
    #[serde(flatten)]
    pub model: EmbedConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// Snapshot directory of the flat index
    pub path: PathBuf,
    /// Database file of the SQLite index
    pub database: PathBuf,
    pub lists: usize,
    pub probes: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        let sqlite = SqliteIndexOptions::default();
        Self {
            backend: StoreBackend::default(),
            path: PathBuf::from("data/vector_store"),
            database: PathBuf::from("data/documents.db"),
            lists: sqlite.lists,
            probes: sqlite.probes,
        }
    }
}

impl StoreConfig {
    pub fn sqlite_options(&self) -> SqliteIndexOptions {
        SqliteIndexOptions {
            lists: self.lists,
            probes: self.probes,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestSettings {
    pub embed_batch_size: usize,
    /// Place names recognized in chunk text, earlier entries first
    pub locations: Vec<String>,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            embed_batch_size: DEFAULT_EMBED_BATCH_SIZE,
            locations: DEFAULT_LOCATIONS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Top-level configuration of the `docsearch` tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrieverConfig {
    pub documents_dir: PathBuf,
    pub chunking: ChunkerConfig,
    pub embedding: EmbeddingSettings,
    pub store: StoreConfig,
    pub ingest: IngestSettings,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            documents_dir: PathBuf::from("data/documents"),
            chunking: ChunkerConfig::default(),
            embedding: EmbeddingSettings::default(),
            store: StoreConfig::default(),
            ingest: IngestSettings::default(),
        }
    }
}

impl RetrieverConfig {
    /// Read and validate a TOML configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| RetrieverError::io(path, e))?;
        let config = Self::from_toml(&text).map_err(|e| match e {
            RetrieverError::InvalidConfig { message } => {
                RetrieverError::invalid_config(format!("{}: {}", path.display(), message))
            }
            other => other,
        })?;
        tracing::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| RetrieverError::invalid_config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.chunking.step()?;
        if self.ingest.embed_batch_size == 0 {
            return Err(RetrieverError::invalid_config(
                "ingest.embed_batch_size must be at least 1",
            ));
        }
        self.store.sqlite_options().validate()?;
        if self.embedding.provider == EmbeddingBackend::Fastembed {
            self.embedding.model.validate()?;
        }
        Ok(())
    }

    pub fn chunker(&self) -> Result<Chunker> {
        Ok(Chunker::new(self.chunking)?)
    }

    pub fn enricher(&self) -> MetadataEnricher {
        MetadataEnricher::new(self.ingest.locations.iter().cloned())
    }

    /// Build the embedder and index and pair them in a service.
    pub async fn open_service(&self) -> Result<RetrievalService> {
        let embedder = build_embedder(&self.embedding).await?;
        let index = open_index(&self.store, embedder.embedding_dimension()).await?;
        RetrievalService::new(embedder, index)?.with_embed_batch_size(self.ingest.embed_batch_size)
    }

    pub async fn open_ingestor(&self) -> Result<DocumentIngestor> {
        Ok(DocumentIngestor::new(
            self.open_service().await?,
            self.chunker()?,
            self.enricher(),
        ))
    }
}

/// Open the configured index backend.
pub async fn open_index(store: &StoreConfig, dimension: usize) -> Result<Arc<dyn VectorIndex>> {
    match store.backend {
        StoreBackend::Flat => {
            let index = FlatIndex::open(&store.path, dimension).await?;
            if let Some(warning) = index.load_warning() {
                tracing::warn!("Starting with an empty flat index: {}", warning);
            }
            Ok(Arc::new(index))
        }
        StoreBackend::Sqlite => Ok(Arc::new(
            SqliteIndex::open(&store.database, dimension, store.sqlite_options()).await?,
        )),
    }
}

/// Construct the configured embedding provider. Loading a model may download it.
pub async fn build_embedder(settings: &EmbeddingSettings) -> Result<Arc<dyn EmbeddingProvider>> {
    match settings.provider {
        EmbeddingBackend::Fastembed => Ok(Arc::new(
            FastEmbedProvider::create(settings.model.clone()).await?,
        )),
        EmbeddingBackend::Hashing => Ok(Arc::new(HashingEmbedder::new(DEFAULT_DIMENSION)?)),
    }
}
