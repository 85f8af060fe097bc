use clap::Parser;
use docsearch_context::{
    ChunkMetadata, Chunker, ChunkerConfig, DocumentFormat, MetadataEnricher, extract_text,
    source_metadata,
};
use serde::Serialize;
use std::io::{self, Read};
use std::path::PathBuf;

/// A CLI tool to chunk a document into JSON output using docsearch-context.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the input file (PDF, DOCX, or plain text). If not provided, reads from stdin.
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Maximum number of words per chunk.
    #[arg(short = 's', long, default_value_t = 512)]
    chunk_size: usize,

    /// Number of words shared by consecutive chunks.
    #[arg(short = 'o', long, default_value_t = 50)]
    chunk_overlap: usize,

    /// Detect years and goldfield locations in each chunk.
    #[arg(short, long)]
    enrich: bool,
}

#[derive(Serialize)]
struct SerializableChunk<'a> {
    chunk_index: usize,
    text: &'a str,
    metadata: &'a ChunkMetadata,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let chunker = Chunker::new(ChunkerConfig::new(args.chunk_size, args.chunk_overlap))?;

    let (text, base) = match &args.input {
        Some(path) if DocumentFormat::is_supported(path) => {
            (extract_text(path)?, source_metadata(path)?)
        }
        Some(path) => (std::fs::read_to_string(path)?, ChunkMetadata::default()),
        None => {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer)?;
            (buffer, ChunkMetadata::default())
        }
    };

    let (chunks, mut metadatas) = chunker.chunk(&text, &base);
    if args.enrich {
        let enricher = MetadataEnricher::default();
        for (chunk, metadata) in chunks.iter().zip(metadatas.iter_mut()) {
            enricher.enrich(chunk, metadata);
        }
    }

    let serializable_chunks: Vec<SerializableChunk> = chunks
        .iter()
        .zip(metadatas.iter())
        .map(|(text, metadata)| SerializableChunk {
            chunk_index: metadata.chunk_index,
            text,
            metadata,
        })
        .collect();

    println!("{}", serde_json::to_string_pretty(&serializable_chunks)?);
    Ok(())
}
