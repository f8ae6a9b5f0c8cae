//! Recursive separator chunking.
//!
//! Splits on paragraph breaks first and only falls through to finer
//! separators for fragments that are still too large. Separators stay
//! attached to the text before them. Overlap is applied once, after all
//! splitting, by extending each chunk backwards into its predecessor.

use std::ops::Range;

use super::{char_len, tail_start, ChunkParams};

const SEPARATORS: [&str; 4] = ["\n\n", "\n", ". ", " "];

pub(crate) fn chunk_spans(
    doc: &str,
    range: Range<usize>,
    params: &ChunkParams,
) -> Vec<Range<usize>> {
    // Leave room for the overlap prefix so prefixed chunks still fit.
    let budget = params.chunk_size() - params.overlap();

    let mut fragments = Vec::new();
    split_fragment(doc, range, budget, 0, &mut fragments);

    let mut chunks: Vec<Range<usize>> = Vec::with_capacity(fragments.len());
    for fragment in fragments {
        let start = match chunks.last() {
            Some(prev) => tail_start(doc, prev, params.overlap()),
            None => fragment.start,
        };
        chunks.push(start..fragment.end);
    }
    chunks
}

fn split_fragment(
    doc: &str,
    span: Range<usize>,
    budget: usize,
    level: usize,
    out: &mut Vec<Range<usize>>,
) {
    if char_len(&doc[span.clone()]) <= budget {
        out.push(span);
        return;
    }

    let Some(separator) = SEPARATORS.get(level) else {
        split_chars(doc, span, budget, out);
        return;
    };

    let parts = pieces(doc, &span, separator);
    if parts.len() < 2 {
        split_fragment(doc, span, budget, level + 1, out);
        return;
    }

    let mut current: Option<(Range<usize>, usize)> = None;
    for part in parts {
        let part_len = char_len(&doc[part.clone()]);
        current = Some(match current.take() {
            None => (part, part_len),
            Some((span, len)) if len + part_len <= budget => {
                (span.start..part.end, len + part_len)
            }
            Some((span, len)) => {
                flush(doc, span, len, budget, level, out);
                (part, part_len)
            }
        });
    }
    if let Some((span, len)) = current {
        flush(doc, span, len, budget, level, out);
    }
}

fn flush(
    doc: &str,
    span: Range<usize>,
    len: usize,
    budget: usize,
    level: usize,
    out: &mut Vec<Range<usize>>,
) {
    if len > budget {
        split_fragment(doc, span, budget, level + 1, out);
    } else {
        out.push(span);
    }
}

/// Pieces of `doc[span]` split after each `separator` occurrence.
fn pieces(doc: &str, span: &Range<usize>, separator: &str) -> Vec<Range<usize>> {
    let mut parts = Vec::new();
    let mut start = span.start;
    for (i, _) in doc[span.clone()].match_indices(separator) {
        let end = span.start + i + separator.len();
        if end > start {
            parts.push(start..end);
            start = end;
        }
    }
    if start < span.end {
        parts.push(start..span.end);
    }
    parts
}

fn split_chars(doc: &str, span: Range<usize>, budget: usize, out: &mut Vec<Range<usize>>) {
    let mut start = span.start;
    for (n, (i, _)) in doc[span.clone()].char_indices().enumerate() {
        if n > 0 && n % budget == 0 {
            out.push(start..span.start + i);
            start = span.start + i;
        }
    }
    if start < span.end {
        out.push(start..span.end);
    }
}
