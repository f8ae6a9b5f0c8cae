//! The `chunk` and `sections` commands.
//!
//! Loads a document, splits it with the configured (or overridden)
//! strategy, and prints a summary or JSON. Semantic chunking runs under the
//! configured embedding timeout and degrades to sentence chunking when the
//! provider fails or times out, so a document is never left unchunked.

use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use tracing::{info, warn};

use tutor_context_core::chunk::{self, extract_sections, ChunkParams, ChunkStrategy};
use tutor_context_core::embedding::EmbeddingProvider;
use tutor_context_core::models::Chunk;

use crate::config::Config;
use crate::embedding::create_provider;
use crate::extract::load_document;

/// Overrides for the `chunk` command.
#[derive(Debug, Default, Clone)]
pub struct ChunkOptions {
    pub strategy: Option<String>,
    pub chunk_size: Option<usize>,
    pub overlap: Option<usize>,
    pub json: bool,
}

/// Chunk `text`, falling back to sentence chunking if the semantic
/// strategy cannot finish within `timeout`.
pub async fn chunk_document(
    text: &str,
    strategy: ChunkStrategy,
    params: &ChunkParams,
    embedder: Option<&dyn EmbeddingProvider>,
    timeout: Duration,
) -> Vec<Chunk> {
    if strategy != ChunkStrategy::Semantic {
        return chunk::split_text(text, strategy, params);
    }

    match tokio::time::timeout(timeout, chunk::split(text, strategy, params, embedder)).await {
        Ok(Ok(chunks)) => chunks,
        Ok(Err(e)) => {
            warn!(error = %e, "semantic chunking failed, using sentence chunking");
            chunk::split_text(text, ChunkStrategy::Sentence, params)
        }
        Err(_) => {
            warn!(
                timeout_secs = timeout.as_secs(),
                "semantic chunking timed out, using sentence chunking"
            );
            chunk::split_text(text, ChunkStrategy::Sentence, params)
        }
    }
}

/// Build the configured embedding provider, or `None` when embeddings are
/// disabled or the provider cannot be constructed.
pub fn configured_embedder(config: &Config) -> Option<Box<dyn EmbeddingProvider>> {
    if !config.embedding.is_enabled() {
        return None;
    }
    match create_provider(&config.embedding) {
        Ok(provider) => Some(provider),
        Err(e) => {
            warn!(
                error = %e,
                provider = %config.embedding.provider,
                "embedding provider unavailable"
            );
            None
        }
    }
}

pub async fn run_chunk(config: &Config, path: &Path, options: ChunkOptions) -> Result<()> {
    let strategy = match &options.strategy {
        Some(tag) => ChunkStrategy::parse_or_default(tag),
        None => config.chunking.strategy(),
    };
    let params = ChunkParams::new(
        options.chunk_size.unwrap_or(config.chunking.chunk_size),
        options.overlap.unwrap_or(config.chunking.chunk_overlap),
    )?;

    let text = load_document(path)?;
    let embedder = if strategy == ChunkStrategy::Semantic {
        configured_embedder(config)
    } else {
        None
    };
    let timeout = Duration::from_secs(config.chunking.embed_timeout_secs);
    let chunks = chunk_document(&text, strategy, &params, embedder.as_deref(), timeout).await;

    info!(
        path = %path.display(),
        strategy = %strategy,
        chunks = chunks.len(),
        "chunked document"
    );

    if options.json {
        println!("{}", serde_json::to_string_pretty(&chunks)?);
        return Ok(());
    }

    println!("chunk {}", path.display());
    println!("  strategy: {}", strategy);
    println!("  chunk_size: {}", params.chunk_size());
    println!("  overlap: {}", params.overlap());
    println!("  chunks: {}", chunks.len());
    println!("  oversized: {}", chunks.iter().filter(|c| c.oversized).count());
    println!();
    for c in &chunks {
        let title = c
            .section_title
            .as_deref()
            .map(|t| format!(" section=\"{}\"", t))
            .unwrap_or_default();
        println!(
            "[chunk {}] {}..{} ({} chars){}{}",
            c.sequence_index,
            c.start_offset,
            c.end_offset,
            c.text.chars().count(),
            title,
            if c.oversized { " oversized" } else { "" }
        );
        println!("{}", c.text.trim());
        println!();
    }
    println!("ok");
    Ok(())
}

pub fn run_sections(path: &Path, json: bool) -> Result<()> {
    let text = load_document(path)?;
    let sections = extract_sections(&text);

    if json {
        println!("{}", serde_json::to_string_pretty(&sections)?);
        return Ok(());
    }

    if !sections.iter().any(|s| s.title.is_some()) {
        println!("No headings detected.");
        return Ok(());
    }
    println!("sections {}", path.display());
    for (i, section) in sections.iter().enumerate() {
        println!(
            "  {:>3}. {} ({} chars)",
            i + 1,
            section.title.as_deref().unwrap_or("(untitled)"),
            section.text.chars().count()
        );
    }
    Ok(())
}
