//! Behavior both index backends must share, exercised through `dyn VectorIndex`.

mod common;

use anyhow::Result;
use common::{axis, both_backends, metadata};
use docsearch_context::ChunkMetadata;
use docsearch_retriever::RetrieverError;
use docsearch_retriever::storage::{NewRecord, SearchFilter, StoreStats, VectorIndex};
use tempfile::tempdir;

const DIM: usize = 8;

fn spread(i: usize) -> Vec<f32> {
    // Distinct, non-axis-aligned vectors so every record is a unique nearest neighbor.
    (0..DIM)
        .map(|j| {
            let base = ((i * 7 + j * 3) % 11) as f32 - 5.0;
            if j == i % DIM { base + 10.0 } else { base }
        })
        .collect()
}

async fn fill(index: &dyn VectorIndex, n: usize) -> Result<Vec<NewRecord>> {
    let records: Vec<NewRecord> = (0..n)
        .map(|i| NewRecord::new(format!("record {i}"), metadata("a.pdf", i), spread(i)))
        .collect();
    index.insert(records.clone()).await?;
    Ok(records)
}

#[tokio::test]
async fn test_self_retrieval() -> Result<()> {
    let dir = tempdir()?;
    for index in both_backends(dir.path(), DIM).await {
        let records = fill(index.as_ref(), 12).await?;

        for record in &records {
            let results = index
                .search(&record.embedding, 3, &SearchFilter::default())
                .await?;
            assert_eq!(
                results[0].text,
                record.text,
                "{} backend did not return the query record first",
                index.backend_name()
            );
            assert!(results[0].similarity <= 1.0, "{}", index.backend_name());
            assert!(results.windows(2).all(|w| w[0].similarity >= w[1].similarity));
            assert!(results.windows(2).all(|w| w[0].distance <= w[1].distance));
        }
    }
    Ok(())
}

#[tokio::test]
async fn test_clear_then_stats() -> Result<()> {
    let dir = tempdir()?;
    for index in both_backends(dir.path(), DIM).await {
        fill(index.as_ref(), 5).await?;
        assert_eq!(index.stats().await?.total_chunks, 5);

        index.clear().await?;
        let stats = index.stats().await?;
        assert_eq!(stats.total_chunks, 0);
        assert_eq!(stats.unique_source_files, 0);
        assert_eq!(stats.year_range, None);
        assert!(index
            .search(&spread(0), 5, &SearchFilter::default())
            .await?
            .is_empty());

        // Usable right away.
        let again = NewRecord::new("again", metadata("b.pdf", 0), spread(1));
        assert_eq!(index.insert(vec![again]).await?, 1);
    }
    Ok(())
}

#[tokio::test]
async fn test_filters() -> Result<()> {
    let dir = tempdir()?;
    for index in both_backends(dir.path(), DIM).await {
        let rows = [
            ("bendigo", 1850, "Bendigo", "a.pdf"),
            ("ballarat", 1900, "Ballarat", "a.pdf"),
            ("melbourne", 1950, "Melbourne", "b.docx"),
        ];
        let records = rows
            .iter()
            .enumerate()
            .map(|(i, (text, year, place, source))| {
                NewRecord::new(
                    *text,
                    metadata(source, i).with_date_year(*year).with_location(*place),
                    axis(i, DIM),
                )
            })
            .collect();
        index.insert(records).await?;
        index
            .insert(vec![NewRecord::new("undated", metadata("c.pdf", 0), axis(3, DIM))])
            .await?;

        let query = vec![1.0; DIM];
        let texts = |filter: SearchFilter| {
            let index = index.clone();
            let query = query.clone();
            async move {
                let mut texts: Vec<String> = index
                    .search(&query, 10, &filter)
                    .await
                    .unwrap()
                    .into_iter()
                    .map(|r| r.text)
                    .collect();
                texts.sort();
                texts
            }
        };

        assert_eq!(
            texts(SearchFilter {
                date_year: Some(1900),
                ..Default::default()
            })
            .await,
            vec!["ballarat"]
        );
        assert_eq!(
            texts(SearchFilter {
                date_year_range: Some((1850, 1900)),
                ..Default::default()
            })
            .await,
            vec!["ballarat", "bendigo"]
        );
        assert!(texts(SearchFilter {
            date_year_range: Some((1900, 1850)),
            ..Default::default()
        })
        .await
        .is_empty());
        assert_eq!(
            texts(SearchFilter {
                location: Some("bend".to_string()),
                ..Default::default()
            })
            .await,
            vec!["bendigo"]
        );
        assert_eq!(
            texts(SearchFilter {
                location: Some("MELB".to_string()),
                ..Default::default()
            })
            .await,
            vec!["melbourne"]
        );
        assert_eq!(
            texts(SearchFilter {
                source_file: Some("a.pdf".to_string()),
                date_year_range: Some((1880, 2000)),
                ..Default::default()
            })
            .await,
            vec!["ballarat"]
        );
        assert!(texts(SearchFilter {
            location: Some("Castlemaine".to_string()),
            ..Default::default()
        })
        .await
        .is_empty());
        assert_eq!(texts(SearchFilter::default()).await.len(), 4);

        let stats = index.stats().await?;
        assert_eq!(stats.year_range, Some((1850, 1950)));
        assert_eq!(stats.unique_source_files, 3);
        let sources: Vec<String> = index.indexed_sources().await?.into_iter().collect();
        assert_eq!(sources, vec!["a.pdf", "b.docx", "c.pdf"]);
    }
    Ok(())
}

#[tokio::test]
async fn test_location_filter_folds_non_ascii_case() -> Result<()> {
    let dir = tempdir()?;
    for index in both_backends(dir.path(), DIM).await {
        index
            .insert(vec![
                NewRecord::new(
                    "vienna",
                    metadata("a.pdf", 0).with_location("ÖSTERREICH"),
                    axis(0, DIM),
                ),
                NewRecord::new(
                    "zurich",
                    metadata("a.pdf", 1).with_location("Schweiz"),
                    axis(1, DIM),
                ),
            ])
            .await?;

        for needle in ["österreich", "ÖSTER", "Österreich"] {
            let filter = SearchFilter {
                location: Some(needle.to_string()),
                ..Default::default()
            };
            let results = index.search(&axis(1, DIM), 5, &filter).await?;
            let texts: Vec<_> = results.iter().map(|r| r.text.as_str()).collect();
            assert_eq!(texts, vec!["vienna"], "{} with {needle}", index.backend_name());
        }

        let wildcard = SearchFilter {
            location: Some("%".to_string()),
            ..Default::default()
        };
        assert!(index.search(&axis(0, DIM), 5, &wildcard).await?.is_empty());
    }
    Ok(())
}

#[tokio::test]
async fn test_ties_break_by_insertion_order() -> Result<()> {
    let dir = tempdir()?;
    for index in both_backends(dir.path(), DIM).await {
        let same = axis(0, DIM);
        index
            .insert(vec![
                NewRecord::new("first", metadata("a.pdf", 0), same.clone()),
                NewRecord::new("second", metadata("a.pdf", 1), same.clone()),
            ])
            .await?;
        index
            .insert(vec![NewRecord::new("third", metadata("a.pdf", 2), same.clone())])
            .await?;

        for _ in 0..3 {
            let results = index.search(&same, 3, &SearchFilter::default()).await?;
            let texts: Vec<_> = results.iter().map(|r| r.text.as_str()).collect();
            assert_eq!(texts, vec!["first", "second", "third"], "{}", index.backend_name());
        }

        let two = index.search(&same, 2, &SearchFilter::default()).await?;
        assert_eq!(two.len(), 2);
        assert_eq!(two[1].text, "second");
    }
    Ok(())
}

#[tokio::test]
async fn test_empty_boundaries() -> Result<()> {
    let dir = tempdir()?;
    for index in both_backends(dir.path(), DIM).await {
        assert!(index
            .search(&axis(0, DIM), 5, &SearchFilter::default())
            .await?
            .is_empty());
        assert_eq!(index.insert(Vec::new()).await?, 0);
        assert_eq!(
            index.stats().await?,
            StoreStats {
                dimension: DIM,
                ..StoreStats::default()
            }
        );

        fill(index.as_ref(), 3).await?;
        assert_eq!(index.insert(Vec::new()).await?, 3);
        assert!(index
            .search(&axis(0, DIM), 0, &SearchFilter::default())
            .await?
            .is_empty());
        assert_eq!(
            index
                .search(&axis(0, DIM), 50, &SearchFilter::default())
                .await?
                .len(),
            3
        );
    }
    Ok(())
}

#[tokio::test]
async fn test_wrong_dimension_is_all_or_nothing() -> Result<()> {
    let dir = tempdir()?;
    for index in both_backends(dir.path(), DIM).await {
        let result = index
            .insert(vec![
                NewRecord::new("ok", ChunkMetadata::default(), axis(0, DIM)),
                NewRecord::new("short", ChunkMetadata::default(), vec![1.0; DIM - 1]),
            ])
            .await;
        assert!(matches!(
            result,
            Err(RetrieverError::DimensionMismatch { .. })
        ));
        assert_eq!(index.stats().await?.total_chunks, 0);

        assert!(matches!(
            index.search(&[1.0; 3], 1, &SearchFilter::default()).await,
            Err(RetrieverError::DimensionMismatch { .. })
        ));
    }
    Ok(())
}
