//! The question-driven strategy: refine existing beliefs against the latest
//! answer, mint new ones when nothing refines, and keep asking.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use noesis_beliefs::BeliefService;
use noesis_model::{
    Belief, BeliefSystem, BeliefType, DialecticEvent, DialecticalInteraction, EpistemicContext,
    InteractionStatus, Result, ids,
};
use noesis_oracle::Oracle;
use tracing::debug;

use super::{DialecticResponse, EpistemicResponse, Epistemology, find_equivalent};

pub struct DialecticalEpistemology {
    oracle: Arc<dyn Oracle>,
    beliefs: BeliefService,
    predictive_processing: bool,
}

impl DialecticalEpistemology {
    pub fn new(oracle: Arc<dyn Oracle>, beliefs: BeliefService, predictive_processing: bool) -> Self {
        Self {
            oracle,
            beliefs,
            predictive_processing,
        }
    }
}

#[async_trait]
impl Epistemology for DialecticalEpistemology {
    async fn process(
        &self,
        event: &DialecticEvent,
        dry_run: bool,
        self_model_id: &str,
    ) -> Result<BeliefSystem> {
        let current = self.beliefs.get_belief_system(self_model_id)?;

        let Some(answered) = event.last_answered() else {
            // Nothing to absorb yet; hand back the current system.
            return Ok(current);
        };

        // Offer the event to every active belief first.
        let mut updated_by_id: HashMap<String, Belief> = HashMap::new();
        for belief in current.active_beliefs() {
            let decision = self
                .oracle
                .update_belief_with_event(&answered, &belief.content_text())
                .await
                .map_err(|e| e.into_model("update_belief_with_event"))?;
            if decision.should_update && !decision.updated_text.trim().is_empty() {
                let updated = self.beliefs.update_belief(
                    self_model_id,
                    &belief.id,
                    belief.version,
                    &decision.updated_text,
                    BeliefType::Clarification,
                    dry_run,
                )?;
                updated_by_id.insert(updated.id.clone(), updated);
            }
        }

        // Only mint new beliefs when nothing existing absorbed the answer.
        let mut created = Vec::new();
        if updated_by_id.is_empty() {
            let texts = self
                .oracle
                .interaction_event_as_beliefs(&answered)
                .await
                .map_err(|e| e.into_model("interaction_event_as_beliefs"))?;
            for text in texts {
                if text.trim().is_empty()
                    || find_equivalent(&current.beliefs, &text).is_some()
                    || find_equivalent(&created, &text).is_some()
                {
                    continue;
                }
                let belief =
                    self.beliefs
                        .create_belief(self_model_id, &text, BeliefType::Statement, dry_run)?;
                created.push(belief);
            }
        }

        debug!(
            self_model_id,
            updated = updated_by_id.len(),
            created = created.len(),
            dry_run,
            "dialectical process"
        );

        // The full system: existing beliefs with updates folded in, plus the
        // newly minted ones. The stored PPC graph rides along when predictive
        // processing is on.
        let mut beliefs: Vec<Belief> = current
            .beliefs
            .iter()
            .map(|b| updated_by_id.remove(&b.id).unwrap_or_else(|| b.clone()))
            .collect();
        beliefs.extend(created);

        let mut epistemic_contexts = if self.predictive_processing {
            current.epistemic_contexts
        } else {
            Vec::new()
        };
        if self.predictive_processing && epistemic_contexts.is_empty() {
            epistemic_contexts.push(EpistemicContext::default());
        }
        Ok(BeliefSystem {
            beliefs,
            epistemic_contexts,
        })
    }

    async fn respond(
        &self,
        belief_system: &BeliefSystem,
        event: &DialecticEvent,
        answer: Option<&str>,
    ) -> Result<EpistemicResponse> {
        let mut interactions = event.previous_interactions.clone();
        if let Some(answer) = answer
            && let Some(last) = interactions.last_mut()
            && last.is_pending()
        {
            last.answer_with(answer, Vec::new());
        }

        let question = match &event.custom_question {
            Some(custom) => custom.clone(),
            None => {
                let prior: Vec<_> = interactions
                    .iter()
                    .filter(|i| i.status == InteractionStatus::Answered)
                    .filter_map(|i| {
                        i.answer_text().map(|a| noesis_model::InteractionEvent {
                            question: i.question_text().to_string(),
                            answer: a.to_string(),
                        })
                    })
                    .collect();
                self.oracle
                    .generate_question(&belief_system.belief_summary(), &prior)
                    .await
                    .map_err(|e| e.into_model("generate_question"))?
            }
        };

        let new_interaction = DialecticalInteraction::pending(ids::new_interaction_id(), question);
        Ok(EpistemicResponse::Turn(DialecticResponse {
            previous_interactions: interactions,
            new_interaction,
        }))
    }
}
