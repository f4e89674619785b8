//! Predictive-processing context manager.
//!
//! Keeps every belief system at exactly one PPC, grows the observation graph
//! as interactions are recorded, and answers pure-read queries over the
//! belief/observation edges.

use noesis_model::{
    Belief, BeliefContext, BeliefSystem, BeliefType, ConfidenceRating, EpistemicContext,
    EpistemicEmotion, Error, ObservationContext, Result, ids,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const DEFAULT_CONFIDENCE_SCORE: f64 = 0.8;
pub const DEFAULT_EMOTION_INTENSITY: f64 = 0.5;

/// Guarantee the belief system carries exactly one epistemic context.
pub fn ensure_context(belief_system: &mut BeliefSystem) {
    if belief_system.epistemic_contexts.is_empty() {
        belief_system.epistemic_contexts.push(EpistemicContext::default());
    }
}

fn context_mut(belief_system: &mut BeliefSystem) -> &mut EpistemicContext {
    ensure_context(belief_system);
    &mut belief_system.epistemic_contexts[0]
}

/// Append an observation context to the PPC.
pub fn append_observation(belief_system: &mut BeliefSystem, context: ObservationContext) {
    context_mut(belief_system)
        .predictive_processing_context
        .observation_contexts
        .push(context);
}

/// Link one belief to one observation context with the default confidence
/// rating and epistemic emotion. Both endpoints must already exist.
pub fn link_belief(
    belief_system: &mut BeliefSystem,
    belief_id: &str,
    observation_context_id: &str,
    interaction_id: Option<&str>,
) -> Result<()> {
    if !belief_system.beliefs.iter().any(|b| b.id == belief_id) {
        return Err(Error::invariant(format!(
            "belief context references unknown belief `{belief_id}`"
        )));
    }

    let ppc = &mut context_mut(belief_system).predictive_processing_context;
    if ppc.observation_context(observation_context_id).is_none() {
        return Err(Error::invariant(format!(
            "belief context references unknown observation context `{observation_context_id}`"
        )));
    }

    ppc.belief_contexts.push(BeliefContext {
        belief_id: belief_id.to_string(),
        observation_context_id: observation_context_id.to_string(),
        confidence_ratings: vec![ConfidenceRating {
            confidence_score: DEFAULT_CONFIDENCE_SCORE,
            is_default: true,
        }],
        conditional_probs: Default::default(),
        dialectic_interaction_ids: interaction_id.map(|id| vec![id.to_string()]).unwrap_or_default(),
        epistemic_emotion: EpistemicEmotion::Confirmation,
        emotion_intensity: DEFAULT_EMOTION_INTENSITY,
    });
    Ok(())
}

/// Record one answered interaction: a fresh observation context named after
/// the question, linked to every belief the answer produced.
pub fn attach_interaction(
    belief_system: &mut BeliefSystem,
    interaction_id: &str,
    question: &str,
    belief_ids: &[String],
) -> Result<()> {
    let context = ObservationContext {
        id: ids::new_observation_context_id(),
        name: question.to_string(),
        parent_id: None,
        possible_states: Vec::new(),
        possible_values: Vec::new(),
    };
    let context_id = context.id.clone();
    append_observation(belief_system, context);
    for belief_id in belief_ids {
        link_belief(belief_system, belief_id, &context_id, Some(interaction_id))?;
    }
    debug!(interaction_id, linked = belief_ids.len(), "interaction recorded in ppc");
    Ok(())
}

/// All observation contexts a belief is linked to.
pub fn observations_by_belief<'a>(
    belief_system: &'a BeliefSystem,
    belief_id: &str,
) -> Vec<&'a ObservationContext> {
    let Some(context) = belief_system.epistemic_contexts.first() else {
        return Vec::new();
    };
    let ppc = &context.predictive_processing_context;
    ppc.belief_contexts
        .iter()
        .filter(|bc| bc.belief_id == belief_id)
        .filter_map(|bc| ppc.observation_context(&bc.observation_context_id))
        .collect()
}

/// All beliefs linked under one observation context.
pub fn beliefs_by_observation<'a>(
    belief_system: &'a BeliefSystem,
    observation_context_id: &str,
) -> Vec<&'a Belief> {
    let Some(context) = belief_system.epistemic_contexts.first() else {
        return Vec::new();
    };
    context
        .predictive_processing_context
        .belief_contexts
        .iter()
        .filter(|bc| bc.observation_context_id == observation_context_id)
        .filter_map(|bc| belief_system.beliefs.iter().find(|b| b.id == bc.belief_id))
        .collect()
}

/// Derived counts over a belief system. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BeliefSystemMetrics {
    pub total_beliefs: usize,
    pub statement_beliefs: usize,
    pub causal_beliefs: usize,
    pub falsifiable_beliefs: usize,
    pub clarification_beliefs: usize,
    pub observation_contexts: usize,
    pub belief_contexts: usize,
    /// Share of beliefs holding at least one observation link, in [0, 1].
    pub context_coverage: f64,
}

pub fn metrics(belief_system: &BeliefSystem) -> BeliefSystemMetrics {
    let mut m = BeliefSystemMetrics {
        total_beliefs: belief_system.beliefs.len(),
        ..Default::default()
    };
    for belief in &belief_system.beliefs {
        match belief.belief_type {
            BeliefType::Statement => m.statement_beliefs += 1,
            BeliefType::Causal => m.causal_beliefs += 1,
            BeliefType::Falsifiable => m.falsifiable_beliefs += 1,
            BeliefType::Clarification => m.clarification_beliefs += 1,
        }
    }
    if let Some(context) = belief_system.epistemic_contexts.first() {
        let ppc = &context.predictive_processing_context;
        m.observation_contexts = ppc.observation_contexts.len();
        m.belief_contexts = ppc.belief_contexts.len();
        if !belief_system.beliefs.is_empty() {
            let covered = belief_system
                .beliefs
                .iter()
                .filter(|b| ppc.belief_contexts.iter().any(|bc| bc.belief_id == b.id))
                .count();
            m.context_coverage = covered as f64 / belief_system.beliefs.len() as f64;
        }
    }
    m
}

#[cfg(test)]
mod tests {
    use super::*;

    fn system_with_belief(id: &str) -> BeliefSystem {
        let mut bs = BeliefSystem::empty();
        bs.beliefs.push(Belief::new(
            id.into(),
            "sm_1".into(),
            "sleep matters".into(),
            BeliefType::Statement,
        ));
        bs
    }

    #[test]
    fn attach_interaction_links_beliefs_with_defaults() {
        let mut bs = system_with_belief("bi_1");
        attach_interaction(&mut bs, "din_1", "How do you sleep?", &["bi_1".to_string()]).unwrap();

        let ppc = &bs.epistemic_contexts[0].predictive_processing_context;
        assert_eq!(ppc.observation_contexts.len(), 1);
        assert_eq!(ppc.observation_contexts[0].name, "How do you sleep?");
        assert_eq!(ppc.belief_contexts.len(), 1);

        let edge = &ppc.belief_contexts[0];
        assert_eq!(edge.confidence_ratings[0].confidence_score, DEFAULT_CONFIDENCE_SCORE);
        assert!(edge.confidence_ratings[0].is_default);
        assert_eq!(edge.epistemic_emotion, EpistemicEmotion::Confirmation);
        assert_eq!(edge.emotion_intensity, DEFAULT_EMOTION_INTENSITY);
        assert_eq!(edge.dialectic_interaction_ids, vec!["din_1".to_string()]);
    }

    #[test]
    fn linking_unknown_belief_is_an_invariant_violation() {
        let mut bs = system_with_belief("bi_1");
        attach_interaction(&mut bs, "din_1", "Q", &["bi_1".to_string()]).unwrap();
        let context_id = bs.epistemic_contexts[0]
            .predictive_processing_context
            .observation_contexts[0]
            .id
            .clone();

        let err = link_belief(&mut bs, "bi_ghost", &context_id, None).unwrap_err();
        assert!(matches!(err, Error::InvariantViolation(_)));
    }

    #[test]
    fn linking_unknown_observation_is_an_invariant_violation() {
        let mut bs = system_with_belief("bi_1");
        let err = link_belief(&mut bs, "bi_1", "oc_ghost", None).unwrap_err();
        assert!(matches!(err, Error::InvariantViolation(_)));
    }

    #[test]
    fn read_helpers_walk_both_directions() {
        let mut bs = system_with_belief("bi_1");
        attach_interaction(&mut bs, "din_1", "Q", &["bi_1".to_string()]).unwrap();
        let context_id = bs.epistemic_contexts[0]
            .predictive_processing_context
            .observation_contexts[0]
            .id
            .clone();

        let observations = observations_by_belief(&bs, "bi_1");
        assert_eq!(observations.len(), 1);
        let beliefs = beliefs_by_observation(&bs, &context_id);
        assert_eq!(beliefs.len(), 1);
        assert_eq!(beliefs[0].id, "bi_1");
    }

    #[test]
    fn metrics_count_types_and_coverage() {
        let mut bs = system_with_belief("bi_1");
        bs.beliefs.push(Belief::new(
            "bi_2".into(),
            "sm_1".into(),
            "unlinked".into(),
            BeliefType::Falsifiable,
        ));
        attach_interaction(&mut bs, "din_1", "Q", &["bi_1".to_string()]).unwrap();

        let m = metrics(&bs);
        assert_eq!(m.total_beliefs, 2);
        assert_eq!(m.statement_beliefs, 1);
        assert_eq!(m.falsifiable_beliefs, 1);
        assert_eq!(m.observation_contexts, 1);
        assert_eq!(m.belief_contexts, 1);
        assert_eq!(m.context_coverage, 0.5);
    }
}
