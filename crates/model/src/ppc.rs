//! Predictive-processing graph types.
//!
//! The graph is kept acyclic in memory by referencing beliefs and observation
//! contexts by ID rather than holding pointers into the belief list.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A named state an observation context can be in. Numeric `properties`
/// (e.g. `min_value` / `max_value`) feed range interpreters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObservationState {
    pub name: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub properties: HashMap<String, f64>,
}

/// A named slot under which beliefs are evaluated. `parent_id` links contexts
/// into a forest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObservationContext {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub possible_states: Vec<ObservationState>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub possible_values: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum EpistemicEmotion {
    #[default]
    Confirmation,
    Surprise,
    Curiosity,
    Confusion,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceRating {
    /// Score in [0, 1].
    pub confidence_score: f64,
    pub is_default: bool,
}

/// The edge between one belief and one observation context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeliefContext {
    pub belief_id: String,
    pub observation_context_id: String,
    pub confidence_ratings: Vec<ConfidenceRating>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub conditional_probs: HashMap<String, f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dialectic_interaction_ids: Vec<String>,
    pub epistemic_emotion: EpistemicEmotion,
    /// Intensity in [0, 1].
    pub emotion_intensity: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PredictiveProcessingContext {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub observation_contexts: Vec<ObservationContext>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub belief_contexts: Vec<BeliefContext>,
}

impl PredictiveProcessingContext {
    pub fn observation_context(&self, id: &str) -> Option<&ObservationContext> {
        self.observation_contexts.iter().find(|oc| oc.id == id)
    }
}
