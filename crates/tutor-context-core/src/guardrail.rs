//! Generated-answer validation.
//!
//! Empty and degenerate answers are replaced by a fixed fallback, short
//! answers pass through unchanged, and long answers are truncated at the
//! last sentence boundary that fits (falling back to a word boundary).
//! Lengths are counted in characters of the trimmed answer.

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Answer substituted when the generated text is unusable or ungrounded.
pub const FALLBACK_RESPONSE: &str = "I don't have enough information to answer that question. \
Please contact our support team for assistance.";

pub const DEFAULT_MIN_RESPONSE_LENGTH: usize = 10;
pub const DEFAULT_MAX_RESPONSE_LENGTH: usize = 1000;

/// What the guardrail did to an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Accepted,
    /// Shorter than the minimum; passed through unmodified.
    BelowMinimum,
    Truncated,
    /// Replaced by the fallback answer.
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GuardrailOutcome {
    pub text: String,
    pub verdict: Verdict,
}

#[derive(Debug, Clone)]
pub struct ResponseGuardrail {
    min_length: usize,
    max_length: usize,
    fallback: String,
}

impl ResponseGuardrail {
    pub fn new(min_length: usize, max_length: usize) -> Result<Self> {
        if max_length == 0 {
            return Err(Error::InvalidConfiguration(
                "max_response_length must be greater than zero".to_string(),
            ));
        }
        if min_length > max_length {
            return Err(Error::InvalidConfiguration(format!(
                "min_response_length ({}) exceeds max_response_length ({})",
                min_length, max_length
            )));
        }
        Ok(Self {
            min_length,
            max_length,
            fallback: FALLBACK_RESPONSE.to_string(),
        })
    }

    pub fn with_fallback(mut self, fallback: impl Into<String>) -> Self {
        self.fallback = fallback.into();
        self
    }

    pub fn min_length(&self) -> usize {
        self.min_length
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    /// Reject answers that cannot be shown at all.
    pub fn check(&self, text: &str) -> Result<()> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(Error::EmptyResponse);
        }
        if !trimmed.chars().any(char::is_alphanumeric) {
            return Err(Error::DegenerateResponse);
        }
        Ok(())
    }

    pub fn validate(&self, text: &str) -> GuardrailOutcome {
        if let Err(e) = self.check(text) {
            warn!(error = %e, "replacing generated response with fallback");
            return self.fallback();
        }

        let trimmed = text.trim();
        let len = trimmed.chars().count();

        if len > self.max_length {
            let cut = truncate_at_boundary(trimmed, self.max_length);
            if !cut.chars().any(char::is_alphanumeric) {
                warn!(len, max = self.max_length, "nothing usable left after truncation");
                return self.fallback();
            }
            debug!(from = len, to = cut.chars().count(), "truncated response");
            return GuardrailOutcome {
                text: cut.to_string(),
                verdict: Verdict::Truncated,
            };
        }

        if len < self.min_length {
            debug!(len, min = self.min_length, "response shorter than minimum");
            return GuardrailOutcome {
                text: trimmed.to_string(),
                verdict: Verdict::BelowMinimum,
            };
        }

        GuardrailOutcome {
            text: trimmed.to_string(),
            verdict: Verdict::Accepted,
        }
    }

    pub fn fallback(&self) -> GuardrailOutcome {
        GuardrailOutcome {
            text: self.fallback.clone(),
            verdict: Verdict::Fallback,
        }
    }
}

impl Default for ResponseGuardrail {
    fn default() -> Self {
        Self {
            min_length: DEFAULT_MIN_RESPONSE_LENGTH,
            max_length: DEFAULT_MAX_RESPONSE_LENGTH,
            fallback: FALLBACK_RESPONSE.to_string(),
        }
    }
}

/// Validate an answer against explicit bounds and return the text to show.
pub fn validate(text: &str, min_length: usize, max_length: usize) -> String {
    ResponseGuardrail {
        min_length,
        max_length,
        fallback: FALLBACK_RESPONSE.to_string(),
    }
    .validate(text)
    .text
}

fn is_terminal(c: char) -> bool {
    matches!(c, '.' | '!' | '?')
}

/// The longest prefix of `text` within `max_chars` characters that ends at
/// a sentence boundary, else at a word boundary, else a hard cut.
pub fn truncate_at_boundary(text: &str, max_chars: usize) -> &str {
    let limit = match text.char_indices().nth(max_chars) {
        Some((i, _)) => i,
        None => return text,
    };
    let window = &text[..limit];

    let sentence_end = window
        .char_indices()
        .filter(|&(i, c)| {
            let after = i + c.len_utf8();
            is_terminal(c) && text[after..].chars().next().map_or(true, char::is_whitespace)
        })
        .map(|(i, c)| i + c.len_utf8())
        .last();
    if let Some(end) = sentence_end {
        return &text[..end];
    }

    if text[limit..].starts_with(char::is_whitespace) {
        return window.trim_end();
    }
    if let Some((i, _)) = window.char_indices().rev().find(|(_, c)| c.is_whitespace()) {
        let cut = window[..i].trim_end();
        if !cut.is_empty() {
            return cut;
        }
    }
    window
}
