//! Section extraction by heading heuristics.
//!
//! A line is treated as a heading when, after trimming, it is between 4 and
//! 99 characters long, does not end like a sentence, and matches one of:
//!
//! - a markdown marker (`## Tuition`)
//! - all capitals (`FINANCIAL AID`)
//! - a numbered prefix followed by a capitalized word (`2.1 Late Fees`)
//! - title case, allowing short connecting words (`Terms of Enrollment`)
//!
//! Body lines are grouped under the most recent heading. Text before the
//! first heading forms an untitled section.

use std::ops::Range;

use serde::Serialize;

use super::{char_len, sentence, ChunkParams};

const MIN_HEADING_CHARS: usize = 4;
const MAX_HEADING_CHARS: usize = 99;
const MAX_TITLE_CASE_WORDS: usize = 12;

const CONNECTING_WORDS: [&str; 14] = [
    "a", "an", "and", "as", "at", "by", "for", "in", "of", "on", "or", "the", "to", "with",
];

/// A provisional section of a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Section {
    /// Heading text with markup stripped, `None` for leading text.
    pub title: Option<String>,
    /// Heading and body, exactly as in the source.
    pub text: String,
    pub start_offset: usize,
    pub end_offset: usize,
}

/// Whether a single line looks like a heading.
pub fn is_heading(line: &str) -> bool {
    let line = line.trim();
    let len = char_len(line);
    if !(MIN_HEADING_CHARS..=MAX_HEADING_CHARS).contains(&len) {
        return false;
    }
    if line.ends_with(['.', ',', ';', '!', '?']) {
        return false;
    }

    if line.starts_with('#') {
        return !line.trim_start_matches('#').trim().is_empty();
    }
    is_all_caps(line) || is_numbered(line) || is_title_case(line)
}

fn is_all_caps(line: &str) -> bool {
    line.chars().any(char::is_alphabetic) && !line.chars().any(char::is_lowercase)
}

fn is_numbered(line: &str) -> bool {
    let Some((prefix, rest)) = line.split_once(char::is_whitespace) else {
        return false;
    };
    let prefix = prefix.trim_end_matches(['.', ')']);
    let numeric = !prefix.is_empty()
        && prefix
            .split('.')
            .all(|part| !part.is_empty() && part.chars().all(|c| c.is_ascii_digit()));
    numeric && rest.trim_start().starts_with(char::is_uppercase)
}

fn is_title_case(line: &str) -> bool {
    let words: Vec<&str> = line.split_whitespace().collect();
    if words.is_empty() || words.len() > MAX_TITLE_CASE_WORDS {
        return false;
    }
    words.iter().enumerate().all(|(i, word)| {
        let word = word.trim_start_matches(['(', '"', '\'']);
        match word.chars().next() {
            Some(c) if c.is_uppercase() || c.is_ascii_digit() => true,
            Some('&') => i > 0,
            Some(_) => i > 0 && CONNECTING_WORDS.contains(&word.to_lowercase().as_str()),
            None => false,
        }
    }) && line.chars().any(char::is_alphabetic)
}

fn clean_title(line: &str) -> String {
    line.trim().trim_start_matches('#').trim().to_string()
}

/// Split a document into sections by heading heuristics.
///
/// Returns an empty vector for empty or whitespace-only text.
pub fn extract_sections(doc: &str) -> Vec<Section> {
    let mut sections = Vec::new();
    // (title, start, end) of the section being built
    let mut current: Option<(Option<String>, usize, usize)> = None;

    let mut line_start = 0;
    for line in doc.split_inclusive('\n') {
        let offset = line_start;
        line_start += line.len();

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let lead = line.len() - line.trim_start().len();
        let start = offset + lead;
        let end = start + trimmed.len();

        if is_heading(trimmed) {
            if let Some(section) = current.take() {
                sections.push(close(doc, section));
            }
            current = Some((Some(clean_title(trimmed)), start, end));
        } else {
            match current.as_mut() {
                Some((_, _, section_end)) => *section_end = end,
                None => current = Some((None, start, end)),
            }
        }
    }

    if let Some(section) = current {
        sections.push(close(doc, section));
    }
    sections
}

fn close(doc: &str, (title, start, end): (Option<String>, usize, usize)) -> Section {
    Section {
        title,
        text: doc[start..end].to_string(),
        start_offset: start,
        end_offset: end,
    }
}

/// Chunk spans for the section strategy, or `None` when the document has
/// no headings.
pub(crate) fn section_spans(
    doc: &str,
    params: &ChunkParams,
) -> Option<Vec<(Range<usize>, Option<String>, bool)>> {
    let sections = extract_sections(doc);
    if !sections.iter().any(|s| s.title.is_some()) {
        return None;
    }

    let mut spans = Vec::new();
    for section in sections {
        let range = section.start_offset..section.end_offset;
        if char_len(&section.text) <= params.chunk_size() {
            spans.push((range, section.title, false));
        } else {
            spans.extend(
                sentence::chunk_spans(doc, range, params)
                    .into_iter()
                    .map(|(span, oversized)| (span, section.title.clone(), oversized)),
            );
        }
    }
    Some(spans)
}
