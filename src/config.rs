//! TOML configuration (`tutor.toml`).
//!
//! Every section and field has a default, so an empty file (or no file at
//! all) yields a working configuration with embeddings disabled.
//!
//! ```toml
//! [chunking]
//! strategy = "section"
//! chunk_size = 500
//! chunk_overlap = 50
//!
//! [memory]
//! max_conversation_history = 10
//! conversation_ttl_hours = 24
//!
//! [assembly]
//! min_confidence_score = 0.7
//!
//! [guardrail]
//! max_response_length = 1000
//!
//! [embedding]
//! provider = "ollama"
//! model = "nomic-embed-text"
//! dims = 768
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::debug;

use tutor_context_core::assemble::AssemblyParams;
use tutor_context_core::chunk::{ChunkParams, ChunkStrategy};
use tutor_context_core::guardrail::ResponseGuardrail;
use tutor_context_core::memory::StoreParams;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub assembly: AssemblyConfig,
    #[serde(default)]
    pub guardrail: GuardrailConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_strategy")]
    pub strategy: String,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    /// Upper bound on the embedding calls of one semantic chunking run.
    #[serde(default = "default_embed_timeout_secs")]
    pub embed_timeout_secs: u64,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            strategy: default_strategy(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            embed_timeout_secs: default_embed_timeout_secs(),
        }
    }
}

fn default_strategy() -> String {
    "sentence".to_string()
}
fn default_chunk_size() -> usize {
    500
}
fn default_chunk_overlap() -> usize {
    50
}
fn default_embed_timeout_secs() -> u64 {
    60
}

impl ChunkingConfig {
    /// The configured strategy; unknown names fall back to sentence.
    pub fn strategy(&self) -> ChunkStrategy {
        ChunkStrategy::parse_or_default(&self.strategy)
    }

    pub fn params(&self) -> Result<ChunkParams> {
        Ok(ChunkParams::new(self.chunk_size, self.chunk_overlap)?)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct MemoryConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_max_history")]
    pub max_conversation_history: usize,
    #[serde(default = "default_ttl_hours")]
    pub conversation_ttl_hours: u64,
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    #[serde(default = "default_shards")]
    pub shards: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_conversation_history: default_max_history(),
            conversation_ttl_hours: default_ttl_hours(),
            sweep_interval_secs: default_sweep_interval_secs(),
            shards: default_shards(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_max_history() -> usize {
    10
}
fn default_ttl_hours() -> u64 {
    24
}
fn default_sweep_interval_secs() -> u64 {
    300
}
fn default_shards() -> usize {
    16
}

impl MemoryConfig {
    pub fn store_params(&self) -> Result<StoreParams> {
        let hours = i64::try_from(self.conversation_ttl_hours)
            .context("memory.conversation_ttl_hours is too large")?;
        let ttl = chrono::Duration::try_hours(hours)
            .context("memory.conversation_ttl_hours is too large")?;
        Ok(StoreParams::new(
            self.max_conversation_history,
            ttl,
            self.shards,
        )?)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AssemblyConfig {
    #[serde(default = "default_max_context_chars")]
    pub max_context_chars: usize,
    #[serde(default = "default_min_confidence")]
    pub min_confidence_score: f64,
    #[serde(default = "default_relevance_floor")]
    pub relevance_floor: f64,
    #[serde(default = "default_corroboration_bonus")]
    pub corroboration_bonus: f64,
    #[serde(default = "default_max_corroboration_bonus")]
    pub max_corroboration_bonus: f64,
}

impl Default for AssemblyConfig {
    fn default() -> Self {
        Self {
            max_context_chars: default_max_context_chars(),
            min_confidence_score: default_min_confidence(),
            relevance_floor: default_relevance_floor(),
            corroboration_bonus: default_corroboration_bonus(),
            max_corroboration_bonus: default_max_corroboration_bonus(),
        }
    }
}

fn default_max_context_chars() -> usize {
    4000
}
fn default_min_confidence() -> f64 {
    0.7
}
fn default_relevance_floor() -> f64 {
    0.5
}
fn default_corroboration_bonus() -> f64 {
    0.05
}
fn default_max_corroboration_bonus() -> f64 {
    0.15
}

impl AssemblyConfig {
    pub fn params(&self) -> AssemblyParams {
        AssemblyParams {
            max_context_chars: self.max_context_chars,
            relevance_floor: self.relevance_floor,
            corroboration_bonus: self.corroboration_bonus,
            max_corroboration_bonus: self.max_corroboration_bonus,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct GuardrailConfig {
    #[serde(default = "default_min_response_length")]
    pub min_response_length: usize,
    #[serde(default = "default_max_response_length")]
    pub max_response_length: usize,
    /// Replaces the built-in fallback answer when set.
    #[serde(default)]
    pub fallback_response: Option<String>,
}

impl Default for GuardrailConfig {
    fn default() -> Self {
        Self {
            min_response_length: default_min_response_length(),
            max_response_length: default_max_response_length(),
            fallback_response: None,
        }
    }
}

fn default_min_response_length() -> usize {
    10
}
fn default_max_response_length() -> usize {
    1000
}

impl GuardrailConfig {
    pub fn guardrail(&self) -> Result<ResponseGuardrail> {
        let guardrail = ResponseGuardrail::new(self.min_response_length, self.max_response_length)?;
        Ok(match &self.fallback_response {
            Some(text) => guardrail.with_fallback(text.clone()),
            None => guardrail,
        })
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL for the Ollama provider.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            url: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Load and validate the configuration at `path`.
///
/// A missing file yields [`Config::default`]; an unreadable or invalid one
/// is an error.
pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        debug!(path = %path.display(), "config file not found, using defaults");
        return Ok(Config::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

/// Check cross-field constraints that serde cannot express.
pub fn validate(config: &Config) -> Result<()> {
    // Validate chunking
    config.chunking.params().context("Invalid [chunking] section")?;
    if config.chunking.embed_timeout_secs == 0 {
        bail!("chunking.embed_timeout_secs must be > 0");
    }
    // Unknown strategies are tolerated; this logs the fallback once at startup.
    config.chunking.strategy();

    // Validate memory
    config.memory.store_params().context("Invalid [memory] section")?;
    if config.memory.sweep_interval_secs == 0 {
        bail!("memory.sweep_interval_secs must be > 0");
    }

    // Validate assembly
    if config.assembly.max_context_chars == 0 {
        bail!("assembly.max_context_chars must be > 0");
    }
    for (name, value) in [
        ("min_confidence_score", config.assembly.min_confidence_score),
        ("relevance_floor", config.assembly.relevance_floor),
        ("corroboration_bonus", config.assembly.corroboration_bonus),
        ("max_corroboration_bonus", config.assembly.max_corroboration_bonus),
    ] {
        if !(0.0..=1.0).contains(&value) {
            bail!("assembly.{} must be in [0.0, 1.0], got {}", name, value);
        }
    }

    // Validate guardrail
    config.guardrail.guardrail().context("Invalid [guardrail] section")?;

    // Validate embedding
    match config.embedding.provider.as_str() {
        "disabled" | "openai" | "ollama" => {}
        other => bail!(
            "Unknown embedding provider: '{}'. Must be disabled, openai, or ollama.",
            other
        ),
    }
    if config.embedding.is_enabled() {
        if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
            bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.model.is_none() {
            bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
    }
    if config.embedding.batch_size == 0 {
        bail!("embedding.batch_size must be > 0");
    }

    Ok(())
}
