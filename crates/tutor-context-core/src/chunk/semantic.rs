//! Semantic chunking: sentence chunks merged by embedding similarity.

use std::ops::Range;

use tracing::debug;

use super::{build_chunks, char_len, sentence, ChunkParams, ChunkStrategy};
use crate::embedding::{cosine_similarity, EmbeddingProvider};
use crate::error::{Error, Result};
use crate::models::Chunk;

/// Cosine similarity above which adjacent chunks are merged.
pub const SEMANTIC_SIMILARITY_THRESHOLD: f32 = 0.85;
/// Merged groups may grow to `chunk_size` times this factor.
pub const SEMANTIC_GROWTH_FACTOR: usize = 2;

/// Merges consecutive, semantically close chunks into groups.
///
/// The candidate is compared against the embedding of the last chunk
/// merged into the group, not a running average.
#[derive(Debug, Clone, Copy)]
pub struct SimilarityGrouper {
    threshold: f32,
    max_chars: usize,
}

impl SimilarityGrouper {
    pub fn new(chunk_size: usize) -> Self {
        Self {
            threshold: SEMANTIC_SIMILARITY_THRESHOLD,
            max_chars: chunk_size.saturating_mul(SEMANTIC_GROWTH_FACTOR),
        }
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    /// Group `spans` (consecutive, possibly overlapping ranges of `doc`)
    /// using one embedding per span.
    ///
    /// Returns ranges of member indices. Groups are contiguous, in order,
    /// and cover every input. A span without an embedding is never merged
    /// with its neighbours.
    pub fn group(
        &self,
        doc: &str,
        spans: &[Range<usize>],
        embeddings: &[Vec<f32>],
    ) -> Vec<Range<usize>> {
        let mut groups = Vec::new();
        if spans.is_empty() {
            return groups;
        }

        let mut first = 0;
        let mut merged_len = char_len(&doc[spans[0].clone()]);
        for i in 1..spans.len() {
            // Overlap with the previous member is counted once.
            let fresh_start = spans[i].start.max(spans[i - 1].end);
            let added = char_len(&doc[fresh_start..spans[i].end.max(fresh_start)]);
            let similarity = match (embeddings.get(i - 1), embeddings.get(i)) {
                (Some(prev), Some(next)) => cosine_similarity(prev, next),
                _ => f32::NEG_INFINITY,
            };

            if similarity > self.threshold && merged_len + added <= self.max_chars {
                merged_len += added;
            } else {
                groups.push(first..i);
                first = i;
                merged_len = char_len(&doc[spans[i].clone()]);
            }
        }
        groups.push(first..spans.len());
        groups
    }
}

pub(crate) async fn split_semantic(
    doc: &str,
    params: &ChunkParams,
    embedder: &dyn EmbeddingProvider,
) -> Result<Vec<Chunk>> {
    let (spans, flags): (Vec<Range<usize>>, Vec<bool>) =
        sentence::chunk_spans(doc, 0..doc.len(), params).into_iter().unzip();
    let texts: Vec<String> = spans.iter().map(|s| doc[s.clone()].to_string()).collect();

    let embeddings = embedder
        .embed(&texts)
        .await
        .map_err(|e| Error::Embedding(format!("{:#}", e)))?;
    if embeddings.len() != texts.len() {
        return Err(Error::Embedding(format!(
            "provider '{}' returned {} vectors for {} chunks",
            embedder.model_name(),
            embeddings.len(),
            texts.len()
        )));
    }

    let groups = SimilarityGrouper::new(params.chunk_size()).group(doc, &spans, &embeddings);
    debug!(
        sentence_chunks = spans.len(),
        groups = groups.len(),
        "merged similar chunks"
    );

    Ok(build_chunks(
        doc,
        groups.into_iter().map(|g| {
            let oversized = flags[g.clone()].iter().any(|&f| f);
            (spans[g.start].start..spans[g.end - 1].end, None, oversized)
        }),
        ChunkStrategy::Semantic,
    ))
}
