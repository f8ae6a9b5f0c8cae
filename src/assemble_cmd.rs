//! The `assemble` and `validate` commands.
//!
//! `assemble` replays a saved transcript into a fresh session, runs one
//! turn against a file of retrieved passages, and prints the resulting
//! context and confidence. `validate` runs a generated answer through the
//! response guardrail.

use std::io::Read;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use tutor_context_core::assemble::{assemble, AssembledContext};
use tutor_context_core::guardrail::ResponseGuardrail;
use tutor_context_core::models::{RetrievedResult, Role};

use crate::config::{Config, GuardrailConfig};
use crate::tutor::Tutor;

/// One line of a saved conversation.
#[derive(Debug, Clone, Deserialize)]
pub struct TranscriptEntry {
    pub role: Role,
    pub content: String,
}

/// Overrides for the `assemble` command.
#[derive(Debug, Default, Clone)]
pub struct AssembleOptions {
    pub transcript: Option<std::path::PathBuf>,
    pub question: Option<String>,
    pub max_chars: Option<usize>,
    pub json: bool,
}

#[derive(Debug, Serialize)]
struct AssembleReport<'a> {
    session_id: Option<&'a str>,
    language: Option<&'a str>,
    confidence: f64,
    min_confidence: f64,
    meets_threshold: bool,
    context: &'a AssembledContext,
    rendered: String,
}

pub fn load_results(path: &Path) -> Result<Vec<RetrievedResult>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read results file: {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse results file: {}", path.display()))
}

pub fn load_transcript(path: &Path) -> Result<Vec<TranscriptEntry>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read transcript: {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse transcript: {}", path.display()))
}

pub fn run_assemble(config: &Config, results_path: &Path, options: AssembleOptions) -> Result<()> {
    let results = load_results(results_path)?;
    let transcript = match &options.transcript {
        Some(path) => load_transcript(path)?,
        None => Vec::new(),
    };

    let mut assembly = config.assembly.params();
    if let Some(max_chars) = options.max_chars {
        assembly.max_context_chars = max_chars;
    }
    let tutor = Tutor::from_config(config)?.with_assembly(assembly);
    // Aborted with the runtime when the command returns.
    let _sweeper = tutor.spawn_sweeper();

    let session_id = match tutor.store() {
        Some(store) => {
            let id = store.create(None);
            for entry in &transcript {
                store.add_message(&id, entry.role, entry.content.as_str(), None);
            }
            Some(id)
        }
        None => {
            if !transcript.is_empty() {
                warn!("conversation memory is disabled, ignoring transcript");
            }
            None
        }
    };

    let (session_id, language, context) = match &options.question {
        Some(question) => {
            let turn = tutor.begin_turn(question, session_id.as_deref(), None, &results);
            (Some(turn.session_id), Some(turn.language), turn.context)
        }
        None => {
            let history = match (tutor.store(), &session_id) {
                (Some(store), Some(id)) => store.get_context_string(id),
                _ => String::new(),
            };
            (session_id, None, assemble(&results, &history, &assembly))
        }
    };

    let meets_threshold = context.meets_threshold(tutor.min_confidence());
    info!(
        results = results.len(),
        included = context.blocks.len(),
        confidence = context.confidence,
        "assembled context"
    );

    if options.json {
        let report = AssembleReport {
            session_id: session_id.as_deref(),
            language: language.as_deref(),
            confidence: context.confidence,
            min_confidence: tutor.min_confidence(),
            meets_threshold,
            rendered: context.render(),
            context: &context,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let history_status = if context.history.is_some() {
        "included"
    } else if context.history_dropped {
        "dropped"
    } else {
        "none"
    };

    println!("assemble {}", results_path.display());
    if let Some(id) = &session_id {
        println!("  session: {}", id);
    }
    if let Some(language) = &language {
        println!("  language: {}", language);
    }
    println!("  results: {}", results.len());
    println!("  included: {}", context.blocks.len());
    println!("  omitted: {}", context.omitted);
    println!("  history: {}", history_status);
    println!(
        "  confidence: {:.3} (threshold {:.2}, {})",
        context.confidence,
        tutor.min_confidence(),
        if meets_threshold { "ok" } else { "low" }
    );
    println!();
    println!("{}", context.render());
    println!();
    println!("ok");
    Ok(())
}

/// Bounds overriding the configured guardrail.
#[derive(Debug, Default, Clone)]
pub struct ValidateOptions {
    pub min: Option<usize>,
    pub max: Option<usize>,
    pub json: bool,
}

/// Read an answer from `source` (`-` for stdin), validate it and print the
/// text to show.
pub fn run_validate(config: &Config, source: &str, options: ValidateOptions) -> Result<()> {
    let text = read_source(source)?;
    let guardrail = guardrail_for(config, &options)?;

    let outcome = guardrail.validate(&text);
    info!(verdict = ?outcome.verdict, chars = outcome.text.chars().count(), "validated response");

    if options.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        println!("{}", outcome.text);
    }
    Ok(())
}

/// Guardrail from the config with the command-line bounds applied.
///
/// A configured bound that conflicts with the one given on the command
/// line is clamped to it, so `--max 5` alone lowers the minimum as well.
fn guardrail_for(config: &Config, options: &ValidateOptions) -> Result<ResponseGuardrail> {
    let configured_min = config.guardrail.min_response_length;
    let configured_max = config.guardrail.max_response_length;
    let (min, max) = match (options.min, options.max) {
        (Some(min), Some(max)) => (min, max),
        (Some(min), None) => (min, configured_max.max(min)),
        (None, Some(max)) => (configured_min.min(max), max),
        (None, None) => (configured_min, configured_max),
    };

    let bounds = GuardrailConfig {
        min_response_length: min,
        max_response_length: max,
        ..config.guardrail.clone()
    };
    bounds.guardrail()
}

fn read_source(source: &str) -> Result<String> {
    if source == "-" {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read response from stdin")?;
        return Ok(text);
    }
    let path = Path::new(source);
    if !path.exists() {
        bail!("Response file not found: {}", path.display());
    }
    std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read response file: {}", path.display()))
}
