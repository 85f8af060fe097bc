//! # docsearch-embed
//!
//! Text-to-vector embedding for document search. Every provider implements
//! [`EmbeddingProvider`]: a batched, order-preserving function from texts to fixed-length
//! `f32` vectors.
//!
//! ## Providers
//!
//! - [`FastEmbedProvider`]: local ONNX sentence models through FastEmbed
//!   (`all-MiniLM-L6-v2` by default, 384 dimensions)
//! - [`HashingEmbedder`]: deterministic feature hashing, no model download
//!
//! ## Quick Start
//!
//! ```no_run
//! use docsearch_embed::{EmbedConfig, EmbeddingProvider, FastEmbedProvider};
//!
//! # async fn example() -> docsearch_embed::Result<()> {
//! let provider = FastEmbedProvider::create(EmbedConfig::default()).await?;
//!
//! let texts = vec!["Gold lease at Bendigo".to_string(), "Quartz reef".to_string()];
//! let result = provider.embed_texts(&texts).await?;
//!
//! println!("Generated {} embeddings of dimension {}", result.len(), result.dimension);
//! # Ok(())
//! # }
//! ```
//!
//! ## Ownership
//!
//! A provider owns its loaded model; there is no process-wide model cache. Construct one
//! provider at start-up and share it (it is cheap to clone) with everything that embeds.

pub mod config;
pub mod error;
pub mod hashing;
pub mod provider;

pub use config::{DEFAULT_DIMENSION, EmbedConfig, KnownModel};
pub use error::{EmbedError, Result};
pub use hashing::HashingEmbedder;
pub use provider::{EmbeddingProvider, EmbeddingResult, FastEmbedProvider, l2_normalize};
