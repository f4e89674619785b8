//! Pluggable epistemic strategies.
//!
//! A strategy turns an event into an updated belief system (`process`) and
//! synthesizes the next move in a dialectic (`respond`). The service
//! dispatches by the dialectic's agent type.

mod dialectical;
mod perspective;

use async_trait::async_trait;
use noesis_model::{Belief, BeliefSystem, DialecticEvent, DialecticalInteraction, Result};

pub use dialectical::DialecticalEpistemology;
pub use perspective::PerspectiveTakingEpistemology;

/// The spliced history plus the freshly synthesized pending turn.
#[derive(Debug, Clone)]
pub struct DialecticResponse {
    pub previous_interactions: Vec<DialecticalInteraction>,
    pub new_interaction: DialecticalInteraction,
}

/// What a strategy answers with: the next turn of a dialectic, or a
/// free-text perspective on an exchange.
#[derive(Debug, Clone)]
pub enum EpistemicResponse {
    Turn(DialecticResponse),
    Perspective(String),
}

#[async_trait]
pub trait Epistemology: Send + Sync {
    /// Transform the self-model's belief system given the event. Honors
    /// `dry_run` by leaving all durable state untouched.
    async fn process(
        &self,
        event: &DialecticEvent,
        dry_run: bool,
        self_model_id: &str,
    ) -> Result<BeliefSystem>;

    /// Produce the strategy's response to the current state of the dialectic.
    async fn respond(
        &self,
        belief_system: &BeliefSystem,
        event: &DialecticEvent,
        answer: Option<&str>,
    ) -> Result<EpistemicResponse>;
}

/// The belief already expressing `text`, if any: case-insensitive substring
/// containment in either direction.
pub(crate) fn find_equivalent<'a>(beliefs: &'a [Belief], text: &str) -> Option<&'a Belief> {
    let candidate = text.to_lowercase();
    beliefs.iter().find(|belief| {
        let held = belief.content_text().to_lowercase();
        held.contains(&candidate) || candidate.contains(&held)
    })
}
