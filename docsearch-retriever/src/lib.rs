//! docsearch-retriever: semantic search over chunked documents
//!
//! This crate stores embedded document chunks and answers natural-language queries against
//! them, optionally filtered by year, place, or source file. It ties together
//! `docsearch-context` (extraction, chunking, metadata) and `docsearch-embed` (embedding
//! providers).
//!
//! ## Key Modules
//!
//! - **[`storage`]**: the [`VectorIndex`](storage::VectorIndex) contract with an exact flat
//!   backend and a SQLite inverted-file backend
//! - **[`retrieval`]**: the [`RetrievalService`](retrieval::RetrievalService) facade and
//!   directory ingestion
//! - **[`config`]**: TOML configuration and start-up wiring
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use docsearch_retriever::config::RetrieverConfig;
//! use docsearch_retriever::retrieval::SearchRequest;
//! use std::path::Path;
//!
//! # async fn example() -> docsearch_retriever::Result<()> {
//! let config = RetrieverConfig::default();
//! let ingestor = config.open_ingestor().await?;
//! ingestor.index_directory(Path::new("data/documents"), false).await?;
//!
//! let request = SearchRequest::new("quartz reef lease").with_location("Bendigo");
//! for result in ingestor.service().search(&request).await? {
//!     println!("{:.3} {}", result.similarity, result.text);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! Documents → Extract → Chunker → Enricher ─┐
//!                                           ├→ RetrievalService → VectorIndex (flat | sqlite)
//! Query ──────────────────────── Embedder ──┘
//! ```

pub mod config;
pub mod error;
pub mod retrieval;
pub mod storage;

pub use error::{Result, RetrieverError};
