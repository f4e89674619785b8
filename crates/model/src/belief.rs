use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::ppc::PredictiveProcessingContext;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BeliefType {
    #[default]
    Statement,
    Causal,
    Falsifiable,
    Clarification,
}

/// Cause/effect detail carried by beliefs of type [`BeliefType::Causal`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CausalBelief {
    pub cause: String,
    pub effect: String,
}

/// A versioned proposition held by a self-model.
///
/// Versions start at 1 and strictly increase on every mutation. A belief is
/// either active or tombstoned (`active = false`); tombstones stay in the
/// store for history and are excluded from listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Belief {
    pub id: String,
    pub self_model_id: String,
    pub version: i64,
    pub belief_type: BeliefType,
    pub active: bool,
    /// Ordered text fragments; never empty.
    pub content: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub causal_belief: Option<CausalBelief>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub observation_context_ids: Vec<String>,
    /// Outcome label → probability in [0, 1].
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub probabilities: HashMap<String, f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
}

impl Belief {
    /// First version of a plain statement belief.
    pub fn new(id: String, self_model_id: String, content: String, belief_type: BeliefType) -> Self {
        Self {
            id,
            self_model_id,
            version: 1,
            belief_type,
            active: true,
            content: vec![content],
            causal_belief: None,
            observation_context_ids: Vec::new(),
            probabilities: HashMap::new(),
            action: None,
            result: None,
        }
    }

    /// All content fragments joined into a single oracle-ready string.
    pub fn content_text(&self) -> String {
        self.content.join(" ")
    }
}

/// One epistemic lens over a belief system. Currently always carries a
/// predictive-processing context.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EpistemicContext {
    pub predictive_processing_context: PredictiveProcessingContext,
}

/// A self-model's active beliefs plus its predictive-processing graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BeliefSystem {
    pub beliefs: Vec<Belief>,
    pub epistemic_contexts: Vec<EpistemicContext>,
}

impl BeliefSystem {
    /// The lazily-created initial shape: no beliefs, one empty PPC.
    pub fn empty() -> Self {
        Self {
            beliefs: Vec::new(),
            epistemic_contexts: vec![EpistemicContext::default()],
        }
    }

    pub fn active_beliefs(&self) -> impl Iterator<Item = &Belief> {
        self.beliefs.iter().filter(|b| b.active)
    }

    /// Concatenated content of all active beliefs, one per line. Used as the
    /// summary input for question generation.
    pub fn belief_summary(&self) -> String {
        self.active_beliefs()
            .map(Belief::content_text)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_belief_starts_at_version_one_and_active() {
        let b = Belief::new(
            "bi_x".into(),
            "sm_1".into(),
            "sleep matters".into(),
            BeliefType::Statement,
        );
        assert_eq!(b.version, 1);
        assert!(b.active);
        assert_eq!(b.content_text(), "sleep matters");
    }

    #[test]
    fn empty_belief_system_has_one_ppc() {
        let bs = BeliefSystem::empty();
        assert!(bs.beliefs.is_empty());
        assert_eq!(bs.epistemic_contexts.len(), 1);
    }

    #[test]
    fn belief_summary_skips_tombstones() {
        let mut bs = BeliefSystem::empty();
        bs.beliefs.push(Belief::new(
            "bi_a".into(),
            "sm_1".into(),
            "kept".into(),
            BeliefType::Statement,
        ));
        let mut gone = Belief::new("bi_b".into(), "sm_1".into(), "gone".into(), BeliefType::Statement);
        gone.active = false;
        bs.beliefs.push(gone);
        assert_eq!(bs.belief_summary(), "kept");
    }

    #[test]
    fn belief_serde_roundtrip() {
        let b = Belief::new("bi_r".into(), "sm_1".into(), "roundtrip".into(), BeliefType::Falsifiable);
        let json = serde_json::to_string(&b).unwrap();
        let back: Belief = serde_json::from_str(&json).unwrap();
        assert_eq!(back, b);
    }
}
