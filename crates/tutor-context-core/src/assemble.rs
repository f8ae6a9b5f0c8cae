//! Context assembly and confidence scoring.
//!
//! Retrieved passages are ranked by descending score (stable, so ties keep
//! retrieval order) and appended after an optional conversation-history
//! block until the character budget would be exceeded. A passage is never
//! cut: assembly stops before the first one that does not fit.
//!
//! # Confidence
//!
//! Computed from the passages that made it into the context:
//!
//! ```text
//! none      → 0
//! one       → clamp(top)
//! several   → min(1, clamp(top) + min(bonus × k, max_bonus))
//! ```
//!
//! where `k` counts the extra passages scoring above `relevance_floor`.
//! Weak extra passages add nothing, and a lone strong passage is never
//! discounted.

use serde::Serialize;
use tracing::debug;

use crate::models::RetrievedResult;

/// Header line of the conversation-history block.
pub const HISTORY_HEADER: &str = "Previous conversation:";
/// Separator between rendered blocks.
pub const BLOCK_SEPARATOR: &str = "\n\n---\n\n";

pub const DEFAULT_MAX_CONTEXT_CHARS: usize = 4000;
pub const DEFAULT_RELEVANCE_FLOOR: f64 = 0.5;
pub const DEFAULT_CORROBORATION_BONUS: f64 = 0.05;
pub const DEFAULT_MAX_CORROBORATION_BONUS: f64 = 0.15;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AssemblyParams {
    pub max_context_chars: usize,
    pub relevance_floor: f64,
    pub corroboration_bonus: f64,
    pub max_corroboration_bonus: f64,
}

impl AssemblyParams {
    pub fn with_max_chars(max_context_chars: usize) -> Self {
        Self {
            max_context_chars,
            ..Self::default()
        }
    }
}

impl Default for AssemblyParams {
    fn default() -> Self {
        Self {
            max_context_chars: DEFAULT_MAX_CONTEXT_CHARS,
            relevance_floor: DEFAULT_RELEVANCE_FLOOR,
            corroboration_bonus: DEFAULT_CORROBORATION_BONUS,
            max_corroboration_bonus: DEFAULT_MAX_CORROBORATION_BONUS,
        }
    }
}

/// One retrieved passage included in the context.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContextBlock {
    pub id: String,
    pub score: f64,
    pub text: String,
}

impl ContextBlock {
    fn render(&self) -> String {
        format!("[{}]\n{}", self.id, self.text)
    }
}

/// The bounded context handed to answer generation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssembledContext {
    /// Rendered history block, when history was supplied and fit.
    pub history: Option<String>,
    /// Included passages in ranked order.
    pub blocks: Vec<ContextBlock>,
    /// Ranked passages left out for lack of room.
    pub omitted: usize,
    /// History was supplied but did not fit the budget.
    pub history_dropped: bool,
    pub confidence: f64,
}

impl AssembledContext {
    /// The context text: history first, then passages, joined by
    /// [`BLOCK_SEPARATOR`].
    pub fn render(&self) -> String {
        self.history
            .iter()
            .cloned()
            .chain(self.blocks.iter().map(ContextBlock::render))
            .collect::<Vec<_>>()
            .join(BLOCK_SEPARATOR)
    }

    /// Whether any retrieved passage made it into the context.
    pub fn is_grounded(&self) -> bool {
        !self.blocks.is_empty()
    }

    pub fn meets_threshold(&self, min_confidence: f64) -> bool {
        self.is_grounded() && self.confidence >= min_confidence
    }

    /// Ids of the included passages, in ranked order.
    pub fn sources(&self) -> Vec<&str> {
        self.blocks.iter().map(|b| b.id.as_str()).collect()
    }
}

/// Rank, pack, and score retrieved passages.
pub fn assemble(
    results: &[RetrievedResult],
    history_context: &str,
    params: &AssemblyParams,
) -> AssembledContext {
    let budget = params.max_context_chars;
    let separator_len = BLOCK_SEPARATOR.chars().count();
    let mut used = 0usize;
    let mut rendered_blocks = 0usize;

    let mut fits = |len: usize| -> bool {
        let cost = if rendered_blocks == 0 { len } else { separator_len + len };
        if used + cost > budget {
            return false;
        }
        used += cost;
        rendered_blocks += 1;
        true
    };

    let mut history = None;
    let mut history_dropped = false;
    let history_context = history_context.trim();
    if !history_context.is_empty() {
        let block = format!("{}\n{}", HISTORY_HEADER, history_context);
        if fits(block.chars().count()) {
            history = Some(block);
        } else {
            history_dropped = true;
            debug!(chars = block.chars().count(), budget, "history does not fit context budget");
        }
    }

    let ranked = rank_results(results);
    let mut blocks = Vec::new();
    for result in &ranked {
        let block = ContextBlock {
            id: result.id.clone(),
            score: result.score,
            text: result.text.clone(),
        };
        if !fits(block.render().chars().count()) {
            break;
        }
        blocks.push(block);
    }
    let omitted = ranked.len() - blocks.len();

    let scores: Vec<f64> = blocks.iter().map(|b| b.score).collect();
    let confidence = score_confidence(&scores, params);
    debug!(
        included = blocks.len(),
        omitted,
        confidence,
        "assembled context"
    );

    AssembledContext {
        history,
        blocks,
        omitted,
        history_dropped,
        confidence,
    }
}

/// Sort results by descending score; ties keep their input order. NaN
/// scores rank as 0.
pub fn rank_results(results: &[RetrievedResult]) -> Vec<&RetrievedResult> {
    let mut ranked: Vec<&RetrievedResult> = results.iter().collect();
    ranked.sort_by(|a, b| sanitize(b.score).total_cmp(&sanitize(a.score)));
    ranked
}

/// Confidence for scores given in ranked order (highest first).
pub fn score_confidence(ranked_scores: &[f64], params: &AssemblyParams) -> f64 {
    let Some((&top, rest)) = ranked_scores.split_first() else {
        return 0.0;
    };
    let base = clamp_unit(top);
    let corroborating = rest
        .iter()
        .filter(|&&s| clamp_unit(s) > params.relevance_floor)
        .count();
    let bonus =
        (corroborating as f64 * params.corroboration_bonus).min(params.max_corroboration_bonus);
    (base + bonus).min(1.0)
}

fn sanitize(score: f64) -> f64 {
    if score.is_nan() {
        0.0
    } else {
        score
    }
}

fn clamp_unit(score: f64) -> f64 {
    sanitize(score).clamp(0.0, 1.0)
}
