//! # Tutor Context Core
//!
//! Runtime-free logic for Tutor Context: document chunking strategies,
//! session-scoped conversation memory, context assembly with confidence
//! scoring, and answer guardrails.
//!
//! This crate performs no I/O of its own. The only suspension point is the
//! semantic chunking strategy, which awaits an injected
//! [`EmbeddingProvider`](embedding::EmbeddingProvider); everything else is
//! synchronous computation over caller-supplied data.
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`chunk`] | Sentence, section, semantic, and recursive chunking |
//! | [`memory`] | Conversation store with TTL expiry and history eviction |
//! | [`assemble`] | Bounded context assembly and confidence scoring |
//! | [`guardrail`] | Generated-answer validation and truncation |
//! | [`embedding`] | Embedding provider trait and cosine similarity |
//! | [`models`] | Shared data types |

pub mod assemble;
pub mod chunk;
pub mod embedding;
pub mod error;
pub mod guardrail;
pub mod memory;
pub mod models;

pub use error::{Error, Result};
