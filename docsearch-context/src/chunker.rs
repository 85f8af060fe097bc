//! Word-window chunking of extracted document text.
//!
//! The chunker turns a document's raw text into overlapping passages sized for the
//! embedding model. It works on whitespace-delimited tokens rather than characters, so a
//! window never cuts a word in half and re-chunking the same text always reproduces the
//! same boundaries.
//!
//! # Windowing
//!
//! With `chunk_size = S` and `chunk_overlap = O`, windows start at token offsets
//! `0, S-O, 2(S-O), ...` for as long as the start lies inside the text. Each window holds up
//! to `S` tokens; the last one may be shorter.
//!
//! ```
//! use docsearch_context::{ChunkMetadata, Chunker, ChunkerConfig};
//!
//! let chunker = Chunker::new(ChunkerConfig::new(4, 1)).unwrap();
//! let (chunks, metadatas) = chunker.chunk("a b c d e f g", &ChunkMetadata::default());
//!
//! assert_eq!(chunks, vec!["a b c d", "d e f g", "g"]);
//! assert_eq!(metadatas[2].chunk_index, 2);
//! ```

use crate::error::{ContextError, Result};
use crate::metadata::ChunkMetadata;
use serde::{Deserialize, Serialize};

/// Window settings for the chunker, counted in tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkerConfig {
    /// Maximum number of tokens per chunk
    pub chunk_size: usize,
    /// Number of tokens shared by consecutive chunks
    pub chunk_overlap: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            chunk_size: 512,
            chunk_overlap: 50,
        }
    }
}

impl ChunkerConfig {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size,
            chunk_overlap,
        }
    }

    /// Distance in tokens between the starts of consecutive windows.
    ///
    /// Fails when the overlap swallows the whole window, since the chunker would never
    /// advance.
    pub fn step(&self) -> Result<usize> {
        if self.chunk_size == 0 {
            return Err(ContextError::invalid_chunk_config(
                "chunk_size must be at least 1",
            ));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(ContextError::invalid_chunk_config(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(self.chunk_size - self.chunk_overlap)
    }
}

/// Deterministic, stateless splitter producing overlapping token windows.
#[derive(Debug, Clone)]
pub struct Chunker {
    config: ChunkerConfig,
    step: usize,
}

impl Chunker {
    /// Create a chunker, rejecting configurations with `chunk_overlap >= chunk_size`.
    pub fn new(config: ChunkerConfig) -> Result<Self> {
        let step = config.step()?;
        Ok(Self { config, step })
    }

    pub fn config(&self) -> &ChunkerConfig {
        &self.config
    }

    /// Split `text` into windows, giving each a copy of `base` with its `chunk_index` set.
    ///
    /// Whitespace is normalized first, so the returned chunks are single-spaced. Empty or
    /// whitespace-only text yields two empty vectors.
    pub fn chunk(&self, text: &str, base: &ChunkMetadata) -> (Vec<String>, Vec<ChunkMetadata>) {
        let tokens: Vec<&str> = text.split_whitespace().collect();
        if tokens.is_empty() {
            return (Vec::new(), Vec::new());
        }

        let mut chunks = Vec::new();
        let mut metadatas = Vec::new();

        for start in (0..tokens.len()).step_by(self.step) {
            let end = (start + self.config.chunk_size).min(tokens.len());
            chunks.push(tokens[start..end].join(" "));

            let mut metadata = base.clone();
            metadata.chunk_index = metadatas.len();
            metadatas.push(metadata);
        }

        tracing::debug!(
            "Chunked {} tokens into {} chunks (size: {}, overlap: {})",
            tokens.len(),
            chunks.len(),
            self.config.chunk_size,
            self.config.chunk_overlap
        );

        (chunks, metadatas)
    }
}
