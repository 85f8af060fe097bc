//! docsearch-context: turning documents into searchable passages
//!
//! This crate covers everything between a file on disk and the list of text chunks handed
//! to the embedder:
//!
//! - [`document`]: PDF/DOCX text extraction and document-level metadata
//! - [`chunker`]: deterministic overlapping word windows
//! - [`enrich`]: year and place detection for filterable metadata
//! - [`metadata`]: the [`ChunkMetadata`] carried by every chunk

pub mod chunker;
pub mod document;
pub mod enrich;
pub mod error;
pub mod metadata;

pub use chunker::{Chunker, ChunkerConfig};
pub use document::{DocumentFormat, extract_text, source_metadata};
pub use enrich::{DEFAULT_LOCATIONS, MetadataEnricher, extract_year};
pub use error::{ContextError, Result};
pub use metadata::ChunkMetadata;
