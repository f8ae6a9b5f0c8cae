//! Sentence-based chunking.
//!
//! A sentence ends after a run of terminal punctuation (`.`, `!`, `?`,
//! optionally followed by closing quotes or brackets) that is followed by
//! whitespace or the end of the text. A blank line also ends a sentence, so
//! headings and list items without punctuation do not swallow the
//! paragraph after them. The whitespace after a sentence belongs to it,
//! which makes the sentences tile the input exactly.

use std::ops::Range;

use super::{char_len, tail_start, ChunkParams};

fn is_terminal(c: char) -> bool {
    matches!(c, '.' | '!' | '?')
}

fn is_closer(c: char) -> bool {
    matches!(c, '"' | '\'' | ')' | ']' | '\u{201D}' | '\u{2019}')
}

/// Byte spans of the sentences in `doc[range]`, tiling it exactly.
pub(crate) fn sentence_spans(doc: &str, range: Range<usize>) -> Vec<Range<usize>> {
    let chars: Vec<(usize, char)> = doc[range.clone()]
        .char_indices()
        .map(|(i, c)| (range.start + i, c))
        .collect();
    let pos = |i: usize| chars.get(i).map(|&(p, _)| p).unwrap_or(range.end);

    let mut spans = Vec::new();
    let mut start = range.start;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i].1;

        if is_terminal(c) {
            let mut j = i + 1;
            while j < chars.len() && (is_terminal(chars[j].1) || is_closer(chars[j].1)) {
                j += 1;
            }
            if j == chars.len() || chars[j].1.is_whitespace() {
                while j < chars.len() && chars[j].1.is_whitespace() {
                    j += 1;
                }
                let end = pos(j);
                spans.push(start..end);
                start = end;
            }
            i = j;
            continue;
        }

        if c.is_whitespace() {
            let mut j = i;
            let mut newlines = 0;
            while j < chars.len() && chars[j].1.is_whitespace() {
                if chars[j].1 == '\n' {
                    newlines += 1;
                }
                j += 1;
            }
            let has_content = !doc[start..pos(i)].trim().is_empty();
            if newlines >= 2 && has_content && j < chars.len() {
                let end = pos(j);
                spans.push(start..end);
                start = end;
            }
            i = j;
            continue;
        }

        i += 1;
    }

    if start < range.end {
        spans.push(start..range.end);
    }
    spans
}

/// Greedily pack the sentences of `doc[range]` into chunk spans.
///
/// Each span comes with its oversized flag. A chunk is emitted once the
/// next sentence would push it past `chunk_size`. The following chunk
/// starts with the last `overlap` characters of the emitted one, trimmed to
/// whatever still fits beside the next sentence. A sentence longer than
/// `chunk_size` is never cut: it keeps the full overlap and is flagged.
pub(crate) fn chunk_spans(
    doc: &str,
    range: Range<usize>,
    params: &ChunkParams,
) -> Vec<(Range<usize>, bool)> {
    let size = params.chunk_size();
    let mut chunks = Vec::new();
    // (span, length in chars, holds an oversized sentence)
    let mut current: Option<(Range<usize>, usize, bool)> = None;

    for unit in sentence_spans(doc, range) {
        let unit_len = char_len(&doc[unit.clone()]);
        let oversized = unit_len > size;
        current = Some(match current.take() {
            None => (unit, unit_len, oversized),
            Some((span, len, false)) if len + unit_len <= size => {
                (span.start..unit.end, len + unit_len, false)
            }
            Some((span, _, flagged)) => {
                let carry = if oversized {
                    params.overlap()
                } else {
                    params.overlap().min(size - unit_len)
                };
                let next_start = tail_start(doc, &span, carry);
                let carried = char_len(&doc[next_start..span.end]);
                chunks.push((span.clone(), flagged));
                (next_start..unit.end, carried + unit_len, oversized)
            }
        });
    }

    if let Some((span, _, flagged)) = current {
        chunks.push((span, flagged));
    }
    chunks
}
