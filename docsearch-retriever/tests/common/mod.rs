//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use docsearch_context::ChunkMetadata;
use docsearch_embed::{EmbeddingProvider, EmbeddingResult, l2_normalize};
use docsearch_retriever::storage::{FlatIndex, SqliteIndex, SqliteIndexOptions, VectorIndex};
use std::path::Path;
use std::sync::Arc;

pub const DIM: usize = 16;

/// Deterministic embedder giving each vocabulary word its own axis.
///
/// Texts sharing no vocabulary word are orthogonal, so expected rankings can be worked out
/// by hand. Words outside the vocabulary all land on the last axis.
pub struct WordAxisEmbedder;

const VOCABULARY: &[&str] = &[
    "alpha", "beta", "gamma", "delta", "gold", "quartz", "reef", "lease", "creek", "mine",
    "shaft", "claim", "water", "road", "school",
];

impl WordAxisEmbedder {
    pub fn embed(text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; DIM];
        for word in text.split_whitespace() {
            let word = word.to_lowercase();
            let axis = VOCABULARY
                .iter()
                .position(|w| *w == word)
                .unwrap_or(DIM - 1);
            vector[axis] += 1.0;
        }
        l2_normalize(&mut vector);
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for WordAxisEmbedder {
    async fn embed_texts(&self, texts: &[String]) -> docsearch_embed::Result<EmbeddingResult> {
        Ok(EmbeddingResult::new(
            texts.iter().map(|t| Self::embed(t)).collect(),
        ))
    }

    fn embedding_dimension(&self) -> usize {
        DIM
    }

    fn provider_name(&self) -> &str {
        "word-axis"
    }
}

/// One index of each backend, both empty. The flat index lives under `dir`.
pub async fn both_backends(dir: &Path, dimension: usize) -> Vec<Arc<dyn VectorIndex>> {
    let flat = FlatIndex::open(dir.join("flat"), dimension).await.unwrap();
    let sqlite = SqliteIndex::open(
        dir.join("sqlite").join("documents.db"),
        dimension,
        SqliteIndexOptions::default(),
    )
    .await
    .unwrap();
    vec![Arc::new(flat), Arc::new(sqlite)]
}

/// Unit vector along `axis`.
pub fn axis(axis: usize, dimension: usize) -> Vec<f32> {
    let mut v = vec![0.0; dimension];
    v[axis] = 1.0;
    v
}

pub fn metadata(source: &str, index: usize) -> ChunkMetadata {
    ChunkMetadata::for_source(source, index)
}

/// Write a minimal DOCX whose body holds one paragraph per entry of `paragraphs`.
pub fn write_docx(path: &Path, paragraphs: &[&str]) {
    use std::io::Write;

    let body: String = paragraphs
        .iter()
        .map(|p| format!("<w:p><w:r><w:t>{p}</w:t></w:r></w:p>"))
        .collect();
    let xml = format!("<w:document><w:body>{body}</w:body></w:document>");

    let file = std::fs::File::create(path).unwrap();
    let mut writer = zip::ZipWriter::new(file);
    writer
        .start_file("word/document.xml", zip::write::SimpleFileOptions::default())
        .unwrap();
    writer.write_all(xml.as_bytes()).unwrap();
    writer.finish().unwrap();
}
