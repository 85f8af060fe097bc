use clap::{Parser, Subcommand};
use docsearch_embed::DEFAULT_DIMENSION;
use docsearch_retriever::{
    config::{EmbeddingBackend, RetrieverConfig, StoreBackend, open_index},
    retrieval::{IngestReport, SearchRequest, StatsResponse},
    storage::{SearchResult, SqliteIndex},
};
use std::path::{Path, PathBuf};
use std::process;

/// Name of the configuration file picked up from the working directory.
const DEFAULT_CONFIG_FILE: &str = "docsearch.toml";

/// Index PDF and DOCX documents and search them by meaning.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file (defaults to ./docsearch.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Index backend: flat or sqlite
    #[arg(long, global = true)]
    backend: Option<StoreBackend>,

    /// Snapshot directory of the flat index
    #[arg(long, global = true)]
    store_path: Option<PathBuf>,

    /// Database file of the SQLite index
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    /// Embedding provider: fastembed or hashing
    #[arg(long, global = true)]
    embedder: Option<EmbeddingBackend>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Index every PDF and DOCX document in a directory
    Index {
        /// Directory to scan (defaults to documents_dir from the configuration)
        #[arg(short, long)]
        dir: Option<PathBuf>,
        /// Clear the index before indexing
        #[arg(long)]
        reindex: bool,
        /// Output format
        #[arg(short, long, default_value = "summary")]
        format: OutputFormat,
    },
    /// Search indexed chunks
    Search {
        /// Natural-language query
        query: String,
        /// Maximum number of results
        #[arg(short, default_value_t = 5)]
        k: usize,
        /// Only chunks mentioning this year
        #[arg(long)]
        year: Option<i32>,
        /// Only chunks with a year in this inclusive range, e.g. 1850-1900
        #[arg(long, value_parser = parse_year_range)]
        year_range: Option<(i32, i32)>,
        /// Only chunks whose location contains this text (case-insensitive)
        #[arg(long)]
        location: Option<String>,
        /// Only chunks from this source file name
        #[arg(long)]
        source_file: Option<String>,
        /// Output format
        #[arg(short, long, default_value = "summary")]
        format: OutputFormat,
    },
    /// Show index statistics
    Stats {
        /// Output format
        #[arg(short, long, default_value = "summary")]
        format: OutputFormat,
    },
    /// Remove every chunk from the index
    Clear,
    /// Recluster the SQLite index lists
    Train {
        /// Maximum k-means iterations
        #[arg(long, default_value_t = 10)]
        iterations: usize,
    },
}

#[derive(Debug, Clone, PartialEq)]
enum OutputFormat {
    Summary,
    Full,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "summary" => Ok(OutputFormat::Summary),
            "full" => Ok(OutputFormat::Full),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Invalid format: {s}")),
        }
    }
}

fn parse_year_range(s: &str) -> Result<(i32, i32), String> {
    let (from, to) = s
        .split_once('-')
        .ok_or_else(|| format!("Invalid year range: {s} (expected FROM-TO)"))?;
    let parse = |part: &str| {
        part.trim()
            .parse::<i32>()
            .map_err(|_| format!("Invalid year in range: {part}"))
    };
    Ok((parse(from)?, parse(to)?))
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logging(args.verbose);

    if let Err(e) = run(args).await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => tracing::Level::INFO,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(args: &Args) -> anyhow::Result<RetrieverConfig> {
    let mut config = match &args.config {
        Some(path) => RetrieverConfig::load(path)?,
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
            RetrieverConfig::load(Path::new(DEFAULT_CONFIG_FILE))?
        }
        None => RetrieverConfig::default(),
    };

    if let Some(backend) = args.backend {
        config.store.backend = backend;
    }
    if let Some(path) = &args.store_path {
        config.store.path = path.clone();
    }
    if let Some(database) = &args.database {
        config.store.database = database.clone();
    }
    if let Some(embedder) = args.embedder {
        config.embedding.provider = embedder;
    }
    Ok(config)
}

async fn run(args: Args) -> anyhow::Result<()> {
    let config = load_config(&args)?;

    match args.command {
        Commands::Index {
            dir,
            reindex,
            format,
        } => {
            let dir = dir.unwrap_or_else(|| config.documents_dir.clone());
            let ingestor = config.open_ingestor().await?;
            let report = ingestor.index_directory(&dir, reindex).await?;
            print_report(&report, &format)?;
            Ok(())
        }
        Commands::Search {
            query,
            k,
            year,
            year_range,
            location,
            source_file,
            format,
        } => {
            let request = SearchRequest {
                query,
                k,
                date_year: year,
                date_year_range: year_range,
                location,
                source_file,
            };
            let service = config.open_service().await?;
            let results = service.search(&request).await?;
            print_results(&results, &format)?;
            Ok(())
        }
        Commands::Stats { format } => {
            // Neither stats nor clear need the embedding model.
            let index = open_index(&config.store, DEFAULT_DIMENSION).await?;
            let stats = StatsResponse::from(index.stats().await?);
            print_stats(&stats, index.backend_name(), &format)?;
            Ok(())
        }
        Commands::Clear => {
            let index = open_index(&config.store, DEFAULT_DIMENSION).await?;
            index.clear().await?;
            println!("Cleared {} index", index.backend_name());
            Ok(())
        }
        Commands::Train { iterations } => {
            if config.store.backend != StoreBackend::Sqlite {
                anyhow::bail!("train is only available for the sqlite backend");
            }
            let index = SqliteIndex::open(
                &config.store.database,
                DEFAULT_DIMENSION,
                config.store.sqlite_options(),
            )
            .await?;
            let lists = index.train_lists(iterations).await?;
            println!("Trained {lists} lists");
            Ok(())
        }
    }
}

fn print_report(report: &IngestReport, format: &OutputFormat) -> anyhow::Result<()> {
    if *format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    println!("Indexing complete:");
    println!("  Files found: {}", report.files_found);
    println!("  Files indexed: {}", report.files_indexed);
    println!("  Files skipped (already indexed): {}", report.files_skipped);
    println!("  Chunks added: {}", report.chunks_added);
    println!("  Total chunks: {}", report.total_chunks);
    if !report.failures.is_empty() {
        println!("  Failed files: {}", report.failures.len());
        for failure in &report.failures {
            println!("    {}: {}", failure.path.display(), failure.error);
        }
    }
    Ok(())
}

fn print_results(results: &[SearchResult], format: &OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(results)?);
        }
        OutputFormat::Summary => {
            println!("Found {} results:", results.len());
            for (rank, result) in results.iter().enumerate() {
                let md = &result.metadata;
                println!(
                    "  {}. Similarity: {:.3} | File: {} | Chunk: {} | Year: {} | Location: {}",
                    rank + 1,
                    result.similarity,
                    md.source_file.as_deref().unwrap_or("-"),
                    md.chunk_index,
                    md.date_year.map(|y| y.to_string()).unwrap_or_else(|| "-".into()),
                    md.location.as_deref().unwrap_or("-"),
                );
                println!(
                    "     {}",
                    result.text.chars().take(100).collect::<String>()
                );
            }
        }
        OutputFormat::Full => {
            for result in results {
                println!("Similarity: {:.3}", result.similarity);
                println!("Distance: {:.4}", result.distance);
                println!("Metadata: {}", serde_json::to_string(&result.metadata)?);
                println!("Content:\n{}", result.text);
                println!("---");
            }
        }
    }
    Ok(())
}

fn print_stats(stats: &StatsResponse, backend: &str, format: &OutputFormat) -> anyhow::Result<()> {
    if *format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(stats)?);
        return Ok(());
    }

    println!("Index Statistics ({backend}):");
    println!("  Total chunks: {}", stats.total_chunks);
    println!("  Unique files: {}", stats.unique_files);
    println!("  Dimension: {}", stats.dimension);
    if let Some(year_range) = &stats.year_range {
        println!("  Years: {year_range}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_year_range() {
        assert_eq!(parse_year_range("1850-1900"), Ok((1850, 1900)));
        assert_eq!(parse_year_range(" 1900 - 1850 "), Ok((1900, 1850)));
        assert!(parse_year_range("1850").is_err());
        assert!(parse_year_range("abc-1900").is_err());
    }

    #[test]
    fn test_args_parse() {
        let args = Args::try_parse_from([
            "docsearch",
            "--backend",
            "sqlite",
            "search",
            "gold lease",
            "-k",
            "3",
            "--year-range",
            "1850-1900",
            "--location",
            "bendigo",
        ])
        .unwrap();

        assert_eq!(args.backend, Some(StoreBackend::Sqlite));
        match args.command {
            Commands::Search {
                query,
                k,
                year_range,
                location,
                ..
            } => {
                assert_eq!(query, "gold lease");
                assert_eq!(k, 3);
                assert_eq!(year_range, Some((1850, 1900)));
                assert_eq!(location.as_deref(), Some("bendigo"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let args = Args::try_parse_from(["docsearch", "stats", "--embedder", "hashing", "-v"])
            .unwrap();
        assert_eq!(args.embedder, Some(EmbeddingBackend::Hashing));
        assert_eq!(args.verbose, 1);
    }
}
