//! Data types shared by the chunking, memory, and assembly modules.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::chunk::ChunkStrategy;

/// Opaque per-message metadata (e.g. `confidence`, `sources`).
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// An immutable unit of source text produced by one chunking run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Chunk {
    /// Position in emission order, contiguous from 0.
    pub sequence_index: usize,
    pub text: String,
    /// Byte offset of the chunk start in the source document.
    pub start_offset: usize,
    /// Byte offset one past the chunk end in the source document.
    pub end_offset: usize,
    /// Heading of the enclosing section (section strategy only).
    pub section_title: Option<String>,
    pub strategy: ChunkStrategy,
    /// Set when the chunk holds a sentence that alone is longer than
    /// `chunk_size`. Unflagged chunks never exceed `chunk_size`, except
    /// semantic groups, which may grow to twice that.
    pub oversized: bool,
    /// SHA-256 of `text`, hex encoded.
    pub hash: String,
}

/// Speaker of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Label used when rendering history into a prompt.
    pub fn label(&self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Assistant => "Assistant",
        }
    }
}

/// One conversation turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub metadata: Metadata,
}

impl Message {
    pub fn new(
        role: Role,
        content: impl Into<String>,
        timestamp: DateTime<Utc>,
        metadata: Option<Metadata>,
    ) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp,
            metadata: metadata.unwrap_or_default(),
        }
    }
}

/// A passage returned by the external similarity search.
///
/// `score` is a similarity where 0 means unrelated and 1 means identical.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedResult {
    pub id: String,
    #[serde(alias = "content")]
    pub text: String,
    pub score: f64,
}

impl RetrievedResult {
    pub fn new(id: impl Into<String>, text: impl Into<String>, score: f64) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            score,
        }
    }
}
