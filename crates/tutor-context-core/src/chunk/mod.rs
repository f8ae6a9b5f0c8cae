//! Document chunking.
//!
//! Turns a document's raw text into an ordered sequence of [`Chunk`]s using
//! one of four strategies, selected by a [`ChunkStrategy`] tag:
//!
//! | Strategy | Splits on | Overlap |
//! |----------|-----------|---------|
//! | `sentence` (default) | terminal punctuation and blank lines | re-includes the tail of the previous chunk |
//! | `section` | detected headings, then sentences for long sections | per section, sentence rules |
//! | `semantic` | sentence chunks merged by embedding similarity | merged groups de-duplicate overlap |
//! | `recursive` | paragraph, line, sentence, word, then character | prefixed once, after splitting |
//!
//! Sizes and overlaps are measured in characters. Offsets are byte offsets
//! into the source text, so `&doc[chunk.start_offset..chunk.end_offset]`
//! is always the chunk's text.
//!
//! A chunk passes `chunk_size` only when a single sentence inside it is
//! already longer than that. Such chunks carry [`Chunk::oversized`]; the
//! sentence packer trims the carried overlap so every other chunk fits.
//!
//! Chunking is deterministic: the same document, strategy, and parameters
//! always yield identical chunks, including their SHA-256 hashes.
//!
//! # Example
//!
//! ```rust
//! use tutor_context_core::chunk::{split_text, ChunkParams, ChunkStrategy};
//!
//! let params = ChunkParams::new(40, 10).unwrap();
//! let chunks = split_text(
//!     "First sentence here. Second sentence here. Third one.",
//!     ChunkStrategy::Sentence,
//!     &params,
//! );
//! assert_eq!(chunks[0].sequence_index, 0);
//! assert!(chunks.iter().all(|c| !c.text.is_empty()));
//! ```

mod recursive;
mod section;
mod semantic;
mod sentence;

use std::fmt;
use std::ops::Range;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::embedding::EmbeddingProvider;
use crate::error::{Error, Result};
use crate::models::Chunk;

pub use section::{extract_sections, is_heading, Section};
pub use semantic::{SimilarityGrouper, SEMANTIC_GROWTH_FACTOR, SEMANTIC_SIMILARITY_THRESHOLD};

/// Default chunk size in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 500;
/// Default overlap in characters.
pub const DEFAULT_CHUNK_OVERLAP: usize = 50;

/// Chunking strategy tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkStrategy {
    #[default]
    Sentence,
    Section,
    Semantic,
    Recursive,
}

impl ChunkStrategy {
    pub const ALL: [ChunkStrategy; 4] = [
        ChunkStrategy::Sentence,
        ChunkStrategy::Section,
        ChunkStrategy::Semantic,
        ChunkStrategy::Recursive,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkStrategy::Sentence => "sentence",
            ChunkStrategy::Section => "section",
            ChunkStrategy::Semantic => "semantic",
            ChunkStrategy::Recursive => "recursive",
        }
    }

    /// Parse a strategy tag, falling back to [`ChunkStrategy::Sentence`]
    /// (with a warning) when the tag is not recognized.
    pub fn parse_or_default(tag: &str) -> Self {
        match tag.parse() {
            Ok(strategy) => strategy,
            Err(e) => {
                warn!(tag, error = %e, "falling back to sentence chunking");
                ChunkStrategy::Sentence
            }
        }
    }
}

impl FromStr for ChunkStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sentence" => Ok(ChunkStrategy::Sentence),
            "section" => Ok(ChunkStrategy::Section),
            "semantic" => Ok(ChunkStrategy::Semantic),
            "recursive" => Ok(ChunkStrategy::Recursive),
            other => Err(Error::InvalidConfiguration(format!(
                "unknown chunking strategy '{}'. Use one of: sentence, section, semantic, recursive",
                other
            ))),
        }
    }
}

impl fmt::Display for ChunkStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validated size parameters for a chunking run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkParams {
    chunk_size: usize,
    overlap: usize,
}

impl ChunkParams {
    /// Fails with [`Error::InvalidConfiguration`] when `chunk_size` is zero
    /// or `overlap >= chunk_size`.
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(Error::InvalidConfiguration(
                "chunk_size must be greater than zero".to_string(),
            ));
        }
        if overlap >= chunk_size {
            return Err(Error::InvalidConfiguration(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                overlap, chunk_size
            )));
        }
        Ok(Self {
            chunk_size,
            overlap,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }
}

impl Default for ChunkParams {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

/// Split a document with any strategy.
///
/// The semantic strategy awaits `embedder`; when none is supplied it
/// degrades to sentence chunking. Empty or whitespace-only input yields an
/// empty sequence.
pub async fn split(
    doc: &str,
    strategy: ChunkStrategy,
    params: &ChunkParams,
    embedder: Option<&dyn EmbeddingProvider>,
) -> Result<Vec<Chunk>> {
    match (strategy, embedder) {
        (ChunkStrategy::Semantic, Some(embedder)) => {
            if doc.trim().is_empty() {
                return Ok(Vec::new());
            }
            let chunks = semantic::split_semantic(doc, params, embedder).await?;
            debug!(count = chunks.len(), strategy = %strategy, "chunked document");
            Ok(chunks)
        }
        _ => Ok(split_text(doc, strategy, params)),
    }
}

/// Split a document by strategy tag and raw sizes.
///
/// Invalid sizes are a hard error; an unknown tag falls back to the
/// sentence strategy.
pub async fn split_tagged(
    doc: &str,
    tag: &str,
    chunk_size: usize,
    overlap: usize,
    embedder: Option<&dyn EmbeddingProvider>,
) -> Result<Vec<Chunk>> {
    let params = ChunkParams::new(chunk_size, overlap)?;
    let strategy = ChunkStrategy::parse_or_default(tag);
    split(doc, strategy, &params, embedder).await
}

/// Split a document without an embedding provider.
///
/// [`ChunkStrategy::Semantic`] degrades to sentence chunking here.
pub fn split_text(doc: &str, strategy: ChunkStrategy, params: &ChunkParams) -> Vec<Chunk> {
    if doc.trim().is_empty() {
        return Vec::new();
    }

    let whole = 0..doc.len();
    let chunks = match strategy {
        ChunkStrategy::Sentence => build_chunks(
            doc,
            sentence::chunk_spans(doc, whole, params)
                .into_iter()
                .map(|(span, oversized)| (span, None, oversized)),
            strategy,
        ),
        ChunkStrategy::Section => match section::section_spans(doc, params) {
            Some(spans) => build_chunks(doc, spans, strategy),
            None => {
                debug!("no headings detected, using sentence chunking");
                split_text(doc, ChunkStrategy::Sentence, params)
            }
        },
        ChunkStrategy::Recursive => build_chunks(
            doc,
            recursive::chunk_spans(doc, whole, params)
                .into_iter()
                .map(|span| (span, None, false)),
            strategy,
        ),
        ChunkStrategy::Semantic => {
            warn!("semantic chunking needs an embedding provider, using sentence chunking");
            split_text(doc, ChunkStrategy::Sentence, params)
        }
    };

    debug!(count = chunks.len(), strategy = %strategy, "chunked document");
    chunks
}

/// Number of characters in `s`.
pub(crate) fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Byte position where the last `n` characters of `doc[span]` begin.
///
/// Returns `span.start` when the span holds `n` characters or fewer.
pub(crate) fn tail_start(doc: &str, span: &Range<usize>, n: usize) -> usize {
    if n == 0 {
        return span.end;
    }
    doc[span.clone()]
        .char_indices()
        .rev()
        .nth(n - 1)
        .map(|(i, _)| span.start + i)
        .unwrap_or(span.start)
}

/// Turn `(span, section title, oversized)` triples into numbered chunks.
fn build_chunks<I>(doc: &str, spans: I, strategy: ChunkStrategy) -> Vec<Chunk>
where
    I: IntoIterator<Item = (Range<usize>, Option<String>, bool)>,
{
    spans
        .into_iter()
        .enumerate()
        .map(|(index, (span, title, oversized))| {
            make_chunk(doc, index, span, title, strategy, oversized)
        })
        .collect()
}

/// Create a single [`Chunk`] with a SHA-256 content hash.
fn make_chunk(
    doc: &str,
    index: usize,
    span: Range<usize>,
    section_title: Option<String>,
    strategy: ChunkStrategy,
    oversized: bool,
) -> Chunk {
    let text = &doc[span.clone()];
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    Chunk {
        sequence_index: index,
        text: text.to_string(),
        start_offset: span.start,
        end_offset: span.end,
        section_title,
        strategy,
        oversized,
        hash,
    }
}
