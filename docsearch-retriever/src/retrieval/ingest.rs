//! Directory ingestion: find documents, chunk them, and add them to the index.
//!
//! Files are processed one at a time in path order. A file whose name is already present
//! as a `source_file` in the index is skipped, which makes re-running ingestion over a
//! growing directory incremental. One bad file never stops the run: its error is logged
//! and recorded in the [`IngestReport`].

use super::service::RetrievalService;
use crate::error::{Result, RetrieverError};
use docsearch_context::{
    Chunker, DocumentFormat, MetadataEnricher, extract_text, source_metadata,
};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// A file that could not be indexed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestFailure {
    pub path: PathBuf,
    pub error: String,
}

/// Outcome of one ingestion run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub files_found: usize,
    pub files_indexed: usize,
    pub files_skipped: usize,
    pub chunks_added: usize,
    pub failures: Vec<IngestFailure>,
    pub total_chunks: usize,
}

/// Turns a directory of PDF and DOCX files into indexed chunks.
#[derive(Debug, Clone)]
pub struct DocumentIngestor {
    service: RetrievalService,
    chunker: Chunker,
    enricher: MetadataEnricher,
}

impl DocumentIngestor {
    pub fn new(service: RetrievalService, chunker: Chunker, enricher: MetadataEnricher) -> Self {
        Self {
            service,
            chunker,
            enricher,
        }
    }

    pub fn service(&self) -> &RetrievalService {
        &self.service
    }

    /// Index every supported document under `dir`.
    ///
    /// With `reindex` the index is cleared first, so every file is processed again.
    pub async fn index_directory(&self, dir: &Path, reindex: bool) -> Result<IngestReport> {
        let is_dir = tokio::fs::metadata(dir)
            .await
            .map_err(|e| RetrieverError::io(dir, e))?
            .is_dir();
        if !is_dir {
            return Err(RetrieverError::io(
                dir,
                std::io::Error::new(std::io::ErrorKind::NotADirectory, "not a directory"),
            ));
        }

        if reindex {
            tracing::info!("Reindexing: clearing existing index");
            self.service.clear().await?;
        }

        let root = dir.to_path_buf();
        let files = tokio::task::spawn_blocking(move || scan_documents(&root)).await?;
        tracing::info!("Found {} documents in {}", files.len(), dir.display());

        let mut indexed = self.service.indexed_sources().await?;
        let mut report = IngestReport {
            files_found: files.len(),
            ..IngestReport::default()
        };

        for path in files {
            let source = file_name(&path);
            if indexed.contains(&source) {
                tracing::debug!("Skipping already indexed {}", path.display());
                report.files_skipped += 1;
                continue;
            }

            match self.index_file(&path).await {
                Ok(chunks) => {
                    tracing::info!("Indexed {} ({} chunks)", path.display(), chunks);
                    report.files_indexed += 1;
                    report.chunks_added += chunks;
                    indexed.insert(source);
                }
                Err(e) => {
                    tracing::error!("Failed to index {}: {}", path.display(), e);
                    report.failures.push(IngestFailure {
                        path,
                        error: e.to_string(),
                    });
                }
            }
        }

        report.total_chunks = self.service.stats().await?.total_chunks;
        tracing::info!(
            "Ingestion finished: {} indexed, {} skipped, {} failed, {} chunks added",
            report.files_indexed,
            report.files_skipped,
            report.failures.len(),
            report.chunks_added
        );
        Ok(report)
    }

    /// Extract, chunk, enrich, and add one document. Returns the number of chunks added.
    pub async fn index_file(&self, path: &Path) -> Result<usize> {
        let owned = path.to_path_buf();
        let (text, base) = tokio::task::spawn_blocking(move || {
            Ok::<_, docsearch_context::ContextError>((
                extract_text(&owned)?,
                source_metadata(&owned)?,
            ))
        })
        .await??;

        let (chunks, mut metadatas) = self.chunker.chunk(&text, &base);
        if chunks.is_empty() {
            tracing::warn!("No text extracted from {}", path.display());
            return Ok(0);
        }

        for (chunk, metadata) in chunks.iter().zip(metadatas.iter_mut()) {
            self.enricher.enrich(chunk, metadata);
        }

        let count = chunks.len();
        self.service.add_documents(chunks, metadatas).await?;
        Ok(count)
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Supported documents under `root`, recursively, sorted by path. Hidden entries are skipped.
pub fn scan_documents(root: &Path) -> Vec<PathBuf> {
    let mut builder = ignore::WalkBuilder::new(root);
    builder
        .hidden(true)
        .git_ignore(false)
        .git_global(false)
        .git_exclude(false);

    let mut files: Vec<PathBuf> = builder
        .build()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!("Error walking {}: {}", root.display(), e);
                None
            }
        })
        .filter(|entry| entry.file_type().is_some_and(|t| t.is_file()))
        .map(|entry| entry.into_path())
        .filter(|path| DocumentFormat::is_supported(path))
        .collect();

    files.sort();
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_scan_finds_supported_documents_sorted() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("b/nested")).unwrap();
        std::fs::create_dir_all(root.join(".hidden")).unwrap();
        for name in [
            "z.pdf",
            "a.DOCX",
            "notes.txt",
            "b/nested/c.pdf",
            ".hidden/secret.pdf",
        ] {
            std::fs::write(root.join(name), b"x").unwrap();
        }

        let files = scan_documents(root);
        let relative: Vec<_> = files
            .iter()
            .map(|p| p.strip_prefix(root).unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(relative, vec!["a.DOCX", "b/nested/c.pdf", "z.pdf"]);
    }

    #[test]
    fn test_file_name() {
        assert_eq!(file_name(Path::new("/data/x/claims.pdf")), "claims.pdf");
        assert_eq!(file_name(Path::new("/")), "");
    }
}
