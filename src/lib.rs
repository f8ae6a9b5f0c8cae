//! # Tutor Context
//!
//! Context assembly for a retrieval-augmented student-handbook tutor.
//!
//! The algorithms live in `tutor-context-core`: chunking a handbook into
//! retrievable passages, remembering conversations, packing retrieved
//! passages into a bounded context with a confidence score, and keeping
//! generated answers within length limits. This crate wires them to a TOML
//! configuration, embedding providers, and the `tutor` CLI.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────┐   ┌──────────────┐
//! │ Document │──▶│ ChunkSplitter│──▶│   Chunks     │──▶ (external index)
//! └──────────┘   └──────┬───────┘   └──────────────┘
//!                       │ semantic
//!                 ┌─────▼──────┐
//!                 │  Embedding │
//!                 └────────────┘
//!
//! (retrieved passages) ──▶ ┌──────────┐ ──▶ context ──▶ (generation)
//!   history ◀───────────── │  Tutor   │ ◀── answer
//!   ConversationStore ───▶ └────┬─────┘
//!                               ▼
//!                          Guardrail ──▶ final answer
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`logging`] | Tracing subscriber setup |
//! | [`extract`] | Document text loading (text, markdown, PDF) |
//! | [`embedding`] | OpenAI and Ollama embedding providers |
//! | [`ingest`] | The `chunk` and `sections` commands |
//! | [`tutor`] | Question/answer turn orchestration |
//! | [`language`] | Question language detection |
//! | [`assemble_cmd`] | The `assemble` and `validate` commands |
//! | [`sweeper`] | Background purge of expired sessions |

pub mod assemble_cmd;
pub mod config;
pub mod embedding;
pub mod extract;
pub mod ingest;
pub mod language;
pub mod logging;
pub mod sweeper;
pub mod tutor;
