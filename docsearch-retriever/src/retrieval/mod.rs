//! Query service and directory ingestion built on top of [`crate::storage`].

pub mod ingest;
pub mod service;

pub use ingest::{DocumentIngestor, IngestFailure, IngestReport, scan_documents};
pub use service::{
    DEFAULT_EMBED_BATCH_SIZE, DEFAULT_TOP_K, RetrievalService, SearchRequest, StatsResponse,
};
