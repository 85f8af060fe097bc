//! Simple example demonstrating real embedding generation with fastembed

use docsearch_embed::{EmbedConfig, EmbeddingProvider, FastEmbedProvider};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let temp_dir = tempfile::tempdir()?;
    let config = EmbedConfig::default_with_path(temp_dir.path())
        .with_batch_size(2)
        .with_download_progress(true);

    println!("Model: {}", config.model_name);
    println!("Batch size: {}", config.batch_size);

    let provider = FastEmbedProvider::create(config).await?;
    println!(
        "Provider {} ready, dimension {}",
        provider.provider_name(),
        provider.embedding_dimension()
    );

    let texts = vec![
        "Alluvial gold was found along Forest Creek in 1851.".to_string(),
        "The Ballarat reef yielded rich quartz.".to_string(),
        "Mining leases were registered with the warden.".to_string(),
    ];
    let result = provider.embed_texts(&texts).await?;

    for (text, embedding) in texts.iter().zip(result.embeddings.iter()) {
        println!("\"{text}\" -> {:?}", &embedding[..3.min(embedding.len())]);
    }
    Ok(())
}
