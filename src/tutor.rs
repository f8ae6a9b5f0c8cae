//! Question/answer turns over conversation memory.
//!
//! A turn has two halves. [`Tutor::begin_turn`] resolves the session,
//! snapshots the prior history, records the question, and assembles the
//! context for answer generation. [`Tutor::complete_turn`] runs the
//! generated answer through the guardrail and records it with the
//! confidence and sources it was based on.
//!
//! The history snapshot is taken before the question is recorded, so the
//! context never repeats the question being answered. Each turn also
//! carries the detected language of the question.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use serde::Serialize;
use serde_json::json;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

use tutor_context_core::assemble::{assemble, AssembledContext, AssemblyParams};
use tutor_context_core::guardrail::{GuardrailOutcome, ResponseGuardrail};
use tutor_context_core::memory::ConversationStore;
use tutor_context_core::models::{Metadata, RetrievedResult, Role};

use crate::config::Config;
use crate::language::detect_language;
use crate::sweeper::spawn_sweeper;

/// State carried from [`Tutor::begin_turn`] to [`Tutor::complete_turn`].
#[derive(Debug, Clone, Serialize)]
pub struct Turn {
    pub session_id: String,
    pub question: String,
    /// ISO 639-1 code of the question's language.
    pub language: String,
    /// History as it stood before the question was recorded.
    pub history: String,
    pub context: AssembledContext,
    /// Whether the context is grounded and meets the confidence threshold.
    pub confident: bool,
}

pub struct Tutor {
    /// `None` when conversation memory is disabled.
    store: Option<Arc<ConversationStore>>,
    assembly: AssemblyParams,
    guardrail: ResponseGuardrail,
    min_confidence: f64,
    sweep_interval: Option<Duration>,
}

impl Tutor {
    pub fn new(
        store: Option<Arc<ConversationStore>>,
        assembly: AssemblyParams,
        guardrail: ResponseGuardrail,
        min_confidence: f64,
    ) -> Self {
        Self {
            store,
            assembly,
            guardrail,
            min_confidence,
            sweep_interval: None,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let store = if config.memory.enabled {
            Some(Arc::new(ConversationStore::new(
                config.memory.store_params()?,
            )))
        } else {
            None
        };
        let tutor = Self::new(
            store,
            config.assembly.params(),
            config.guardrail.guardrail()?,
            config.assembly.min_confidence_score,
        );
        Ok(tutor.with_sweep_interval(Duration::from_secs(config.memory.sweep_interval_secs)))
    }

    pub fn with_assembly(mut self, assembly: AssemblyParams) -> Self {
        self.assembly = assembly;
        self
    }

    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = Some(interval);
        self
    }

    pub fn sweep_interval(&self) -> Option<Duration> {
        self.sweep_interval
    }

    /// Start purging expired sessions in the background.
    ///
    /// Returns `None` when memory is disabled or no interval is set. Must be
    /// called inside a Tokio runtime.
    pub fn spawn_sweeper(&self) -> Option<JoinHandle<()>> {
        let store = self.store.as_ref()?;
        let interval = self.sweep_interval?;
        info!(interval_secs = interval.as_secs(), "starting session sweeper");
        Some(spawn_sweeper(store.clone(), interval))
    }

    pub fn store(&self) -> Option<&Arc<ConversationStore>> {
        self.store.as_ref()
    }

    pub fn min_confidence(&self) -> f64 {
        self.min_confidence
    }

    /// Open a turn for `question` against the retrieved `results`.
    ///
    /// A missing `session_id` allocates a new session for `student_id`. An
    /// unknown or expired id is accepted and starts a fresh conversation.
    pub fn begin_turn(
        &self,
        question: &str,
        session_id: Option<&str>,
        student_id: Option<&str>,
        results: &[RetrievedResult],
    ) -> Turn {
        let (session_id, history) = match &self.store {
            Some(store) => {
                let id = match session_id {
                    Some(id) => id.to_string(),
                    None => store.create(student_id),
                };
                let history = store.get_context_string(&id);
                store.add_message(&id, Role::User, question, None);
                (id, history)
            }
            None => (
                session_id
                    .map(str::to_string)
                    .unwrap_or_else(|| Uuid::new_v4().to_string()),
                String::new(),
            ),
        };

        let language = detect_language(question);
        let context = assemble(results, &history, &self.assembly);
        let confident = context.meets_threshold(self.min_confidence);

        if confident {
            info!(
                session_id = %session_id,
                language,
                confidence = context.confidence,
                sources = context.blocks.len(),
                "assembled context"
            );
        } else {
            warn!(
                session_id = %session_id,
                confidence = context.confidence,
                threshold = self.min_confidence,
                sources = context.blocks.len(),
                "low confidence context"
            );
        }

        Turn {
            session_id,
            question: question.to_string(),
            language: language.to_string(),
            history,
            context,
            confident,
        }
    }

    /// Close a turn with the generated answer and return what to show.
    ///
    /// An ungrounded turn always answers with the fallback.
    pub fn complete_turn(&self, turn: &Turn, generated: &str) -> GuardrailOutcome {
        let outcome = if turn.context.is_grounded() {
            self.guardrail.validate(generated)
        } else {
            self.guardrail.fallback()
        };

        if let Some(store) = &self.store {
            let mut metadata = Metadata::new();
            metadata.insert("confidence".to_string(), json!(turn.context.confidence));
            metadata.insert("sources".to_string(), json!(turn.context.sources()));
            metadata.insert("verdict".to_string(), json!(outcome.verdict));
            metadata.insert("language".to_string(), json!(turn.language));
            store.add_message(
                &turn.session_id,
                Role::Assistant,
                outcome.text.clone(),
                Some(metadata),
            );
        }

        info!(
            session_id = %turn.session_id,
            verdict = ?outcome.verdict,
            chars = outcome.text.chars().count(),
            "completed turn"
        );
        outcome
    }
}
