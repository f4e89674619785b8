//! The LLM oracle boundary.
//!
//! The core never talks to a provider directly; it consumes the capability
//! set below. Calls are slow, nondeterministic, and fallible — failures
//! surface as [`OracleError`] and abort the current orchestration step
//! without mutating durable state.

pub mod http;
pub mod scripted;

use async_trait::async_trait;
use noesis_model::{Belief, BeliefSystem, DialecticalInteraction, InteractionEvent, LearningObjective};
use thiserror::Error;

pub use http::HttpOracle;
pub use scripted::ScriptedOracle;

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("oracle transport: {0}")]
    Transport(String),

    #[error("oracle timed out")]
    Timeout,

    #[error("oracle unavailable: {0}")]
    Unavailable(String),

    #[error("malformed oracle output: {0}")]
    Malformed(String),
}

impl OracleError {
    /// Attach the calling operation and lift into the shared taxonomy.
    pub fn into_model(self, operation: &'static str) -> noesis_model::Error {
        noesis_model::Error::Oracle {
            operation,
            message: self.to_string(),
        }
    }
}

impl From<reqwest::Error> for OracleError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_connect() {
            Self::Unavailable(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

pub type OracleResult<T> = Result<T, OracleError>;

/// Outcome of asking whether an existing belief should absorb a new event.
#[derive(Debug, Clone, Default)]
pub struct BeliefUpdateDecision {
    pub should_update: bool,
    pub updated_text: String,
}

/// Which incoming beliefs survive and which existing ones they invalidate.
#[derive(Debug, Clone, Default)]
pub struct ValidityVerdict {
    pub kept_ids: Vec<String>,
    pub invalidated_ids: Vec<String>,
}

/// The capability set the core consumes. Implementations wrap a provider
/// (see [`HttpOracle`]) or script deterministic behavior for tests
/// (see [`ScriptedOracle`]).
#[async_trait]
pub trait Oracle: Send + Sync {
    /// A novel, non-repeating next question given the belief summary and the
    /// prior turns.
    async fn generate_question(
        &self,
        belief_summary: &str,
        prior: &[InteractionEvent],
    ) -> OracleResult<String>;

    async fn generate_question_for_objective(
        &self,
        objective: &LearningObjective,
        prior: &[InteractionEvent],
    ) -> OracleResult<String>;

    /// 0..N belief statements extracted from an answered Q&A pair.
    async fn interaction_event_as_beliefs(
        &self,
        event: &InteractionEvent,
    ) -> OracleResult<Vec<String>>;

    async fn update_belief_with_event(
        &self,
        event: &InteractionEvent,
        existing_belief: &str,
    ) -> OracleResult<BeliefUpdateDecision>;

    async fn extract_questions_from_text(&self, text: &str) -> OracleResult<Vec<String>>;

    /// Positionally aligned answers for `questions`; an empty string means
    /// "no answer found in the blob".
    async fn match_answers_to_questions(
        &self,
        answer_blob: &str,
        questions: &[String],
    ) -> OracleResult<Vec<String>>;

    async fn predict_answer(&self, question: &str) -> OracleResult<String>;

    async fn extract_beliefs_from_resource(&self, resource: &str) -> OracleResult<Vec<String>>;

    async fn determine_belief_validity(
        &self,
        existing: &[Belief],
        incoming: &[Belief],
    ) -> OracleResult<ValidityVerdict>;

    /// Completion percentage in [0, 100].
    async fn check_objective_completion(
        &self,
        objective: &LearningObjective,
        beliefs: &[Belief],
    ) -> OracleResult<f64>;

    async fn generate_analysis(
        &self,
        strategy: &str,
        belief_system: &BeliefSystem,
        interactions: &[DialecticalInteraction],
        event: &InteractionEvent,
    ) -> OracleResult<String>;

    async fn is_answer_to_question(&self, question: &str, answer: &str) -> OracleResult<bool>;

    async fn summarize_belief_system(&self, belief_texts: &[String]) -> OracleResult<String>;

    async fn generate_perspective(
        &self,
        belief_summary: &str,
        event: &InteractionEvent,
    ) -> OracleResult<String>;
}
