//! Snapshot durability of the flat index across process restarts.

mod common;

use anyhow::Result;
use common::{DIM, WordAxisEmbedder, metadata};
use docsearch_retriever::retrieval::{RetrievalService, SearchRequest};
use docsearch_retriever::storage::{FlatIndex, SearchFilter, VectorIndex};
use std::sync::Arc;
use tempfile::tempdir;

async fn service(index: Arc<FlatIndex>) -> RetrievalService {
    RetrievalService::new(Arc::new(WordAxisEmbedder), index).unwrap()
}

#[tokio::test]
async fn test_round_trip_across_reopen() -> Result<()> {
    let dir = tempdir()?;
    let store = dir.path().join("vector_store");

    let before = {
        let index = Arc::new(FlatIndex::open(&store, DIM).await?);
        let service = service(index).await;
        service
            .add_documents(
                vec!["alpha beta".to_string(), "gamma delta".to_string()],
                vec![
                    metadata("a.pdf", 0).with_date_year(1899),
                    metadata("b.pdf", 0).with_location("Clunes"),
                ],
            )
            .await?;
        service
            .add_documents(vec!["gold reef".to_string()], vec![metadata("c.pdf", 0)])
            .await?;
        service.search(&SearchRequest::new("alpha gold").with_k(3)).await?
    };

    let index = Arc::new(FlatIndex::open(&store, DIM).await?);
    assert!(index.load_warning().is_none());
    let service = service(index).await;

    let after = service.search(&SearchRequest::new("alpha gold").with_k(3)).await?;
    assert_eq!(after, before);

    let stats = service.stats().await?;
    assert_eq!(stats.total_chunks, 3);
    assert_eq!(stats.unique_files, 3);
    assert_eq!(stats.year_range.as_deref(), Some("1899-1899"));
    Ok(())
}

#[tokio::test]
async fn test_leftovers_of_an_interrupted_save_are_harmless() -> Result<()> {
    let dir = tempdir()?;
    let store = dir.path().join("vector_store");
    {
        let index = Arc::new(FlatIndex::open(&store, DIM).await?);
        service(index)
            .await
            .add_documents(vec!["alpha".to_string()], vec![metadata("a.pdf", 0)])
            .await?;
    }

    // What a crash mid-save leaves behind: a temp file and a newer, uncommitted vector file.
    std::fs::write(store.join(".tmp-interrupted"), b"{\"generation\": 9")?;
    std::fs::write(store.join("vectors-9.bin"), b"DSVX")?;

    let index = Arc::new(FlatIndex::open(&store, DIM).await?);
    assert!(index.load_warning().is_none());
    assert_eq!(index.len().await, 1);

    // The next save commits a new generation and removes the orphaned vector file.
    index
        .insert(vec![docsearch_retriever::storage::NewRecord::new(
            "beta",
            metadata("b.pdf", 0),
            WordAxisEmbedder::embed("beta"),
        )])
        .await?;
    assert!(!store.join("vectors-9.bin").exists());

    let reopened = FlatIndex::open(&store, DIM).await?;
    let results = reopened
        .search(&WordAxisEmbedder::embed("beta"), 1, &SearchFilter::default())
        .await?;
    assert_eq!(results[0].text, "beta");
    assert_eq!(reopened.len().await, 2);
    Ok(())
}

#[tokio::test]
async fn test_corrupt_snapshot_falls_back_to_empty() -> Result<()> {
    let dir = tempdir()?;
    let store = dir.path().join("vector_store");
    {
        let index = Arc::new(FlatIndex::open(&store, DIM).await?);
        service(index)
            .await
            .add_documents(vec!["alpha".to_string()], vec![metadata("a.pdf", 0)])
            .await?;
    }

    for entry in std::fs::read_dir(&store)? {
        let path = entry?.path();
        if path.extension().is_some_and(|e| e == "bin") {
            std::fs::remove_file(path)?;
        }
    }

    let index = FlatIndex::open(&store, DIM).await?;
    assert!(index.load_warning().is_some());
    assert_eq!(index.stats().await?.total_chunks, 0);
    Ok(())
}

#[tokio::test]
async fn test_dimension_change_is_reported() -> Result<()> {
    let dir = tempdir()?;
    let store = dir.path().join("vector_store");
    {
        let index = FlatIndex::open(&store, DIM).await?;
        index
            .insert(vec![docsearch_retriever::storage::NewRecord::new(
                "alpha",
                metadata("a.pdf", 0),
                WordAxisEmbedder::embed("alpha"),
            )])
            .await?;
    }

    let index = FlatIndex::open(&store, DIM * 2).await?;
    let warning = index.load_warning().unwrap_or_default();
    assert!(warning.contains("dimension"), "unexpected warning: {warning}");
    assert_eq!(index.len().await, 0);
    Ok(())
}
