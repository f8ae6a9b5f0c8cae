//! # Tutor CLI (`tutor`)
//!
//! The `tutor` binary exposes the context assembly pipeline for inspection
//! and offline use: chunk a handbook, list its sections, assemble context
//! from a file of retrieved passages, and validate generated answers.
//!
//! ## Usage
//!
//! ```bash
//! tutor --config ./config/tutor.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `tutor chunk <file>` | Split a document into chunks |
//! | `tutor sections <file>` | List the headings detected in a document |
//! | `tutor assemble --results <file>` | Build context and confidence from retrieved passages |
//! | `tutor validate <file>` | Apply the response guardrail to an answer |
//!
//! ## Examples
//!
//! ```bash
//! # Section-aware chunking of a PDF handbook
//! tutor chunk handbook.pdf --strategy section --chunk-size 800
//!
//! # Follow-up question with prior conversation
//! tutor assemble --results hits.json --transcript chat.json --question "And late fees?"
//!
//! # Clamp a generated answer read from stdin
//! echo "..." | tutor validate - --max 500
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use tutor_context::assemble_cmd::{self, AssembleOptions, ValidateOptions};
use tutor_context::config;
use tutor_context::ingest::{self, ChunkOptions};
use tutor_context::logging;

/// Tutor: context assembly for a student-handbook assistant.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/tutor.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "tutor",
    about = "Context assembly for a student-handbook tutor",
    version,
    long_about = "Splits handbooks into retrievable chunks, remembers conversations, \
    packs retrieved passages into a bounded context with a confidence score, \
    and keeps generated answers within length limits."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/tutor.toml`. A missing file means built-in
    /// defaults.
    #[arg(long, global = true, default_value = "./config/tutor.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Split a document into chunks.
    ///
    /// Reads text, markdown, or PDF. Strategy, size, and overlap default to
    /// the `[chunking]` section of the config.
    Chunk {
        /// Document to chunk.
        file: PathBuf,

        /// Chunking strategy: `sentence`, `recursive`, `section`, or `semantic`.
        /// Unknown names fall back to `sentence`.
        #[arg(long)]
        strategy: Option<String>,

        /// Target chunk size in characters.
        #[arg(long)]
        chunk_size: Option<usize>,

        /// Characters shared between consecutive chunks.
        #[arg(long)]
        overlap: Option<usize>,

        /// Print chunks as JSON.
        #[arg(long)]
        json: bool,
    },

    /// List the sections detected in a document.
    Sections {
        /// Document to scan for headings.
        file: PathBuf,

        /// Print sections as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Assemble context from retrieved passages.
    ///
    /// Replays an optional transcript into a fresh session, runs one turn,
    /// and prints the context with its confidence score.
    Assemble {
        /// JSON array of `{ "id", "text", "score" }` passages.
        #[arg(long)]
        results: PathBuf,

        /// JSON array of `{ "role", "content" }` messages to replay first.
        #[arg(long)]
        transcript: Option<PathBuf>,

        /// Question for this turn. Recorded after the history snapshot.
        #[arg(long)]
        question: Option<String>,

        /// Override `assembly.max_context_chars`.
        #[arg(long)]
        max_chars: Option<usize>,

        /// Print the assembled context as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Apply the response guardrail to a generated answer.
    ///
    /// Prints the answer to show: the fallback for empty input, or the
    /// text truncated at a sentence boundary when too long.
    Validate {
        /// File holding the answer, or `-` for stdin.
        file: String,

        /// Override `guardrail.min_response_length`.
        #[arg(long)]
        min: Option<usize>,

        /// Override `guardrail.max_response_length`.
        #[arg(long)]
        max: Option<usize>,

        /// Print the text and verdict as JSON.
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let cfg = config::load_config(&cli.config)?;
    logging::init_tracing(&cfg.logging.level)?;

    match cli.command {
        Commands::Chunk {
            file,
            strategy,
            chunk_size,
            overlap,
            json,
        } => {
            let options = ChunkOptions {
                strategy,
                chunk_size,
                overlap,
                json,
            };
            ingest::run_chunk(&cfg, &file, options).await?;
        }
        Commands::Sections { file, json } => {
            ingest::run_sections(&file, json)?;
        }
        Commands::Assemble {
            results,
            transcript,
            question,
            max_chars,
            json,
        } => {
            let options = AssembleOptions {
                transcript,
                question,
                max_chars,
                json,
            };
            assemble_cmd::run_assemble(&cfg, &results, options)?;
        }
        Commands::Validate {
            file,
            min,
            max,
            json,
        } => {
            let options = ValidateOptions { min, max, json };
            assemble_cmd::run_validate(&cfg, &file, options)?;
        }
    }

    Ok(())
}
