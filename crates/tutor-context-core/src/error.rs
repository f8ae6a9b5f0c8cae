use thiserror::Error;

/// Errors surfaced by the core crate.
///
/// Only [`Error::InvalidConfiguration`] is meant to reach an end caller as a
/// hard failure. The response variants are produced internally by the
/// guardrail and absorbed into a fallback answer; [`Error::Embedding`] is
/// returned by semantic chunking so the caller can decide how to degrade.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("embedding provider failed: {0}")]
    Embedding(String),

    #[error("generated response is empty")]
    EmptyResponse,

    #[error("generated response has no readable content")]
    DegenerateResponse,
}

pub type Result<T> = std::result::Result<T, Error>;
