//! The perspective-taking strategy: reconcile an external resource with the
//! target self-model, and voice another model's view of an exchange.

use std::sync::Arc;

use async_trait::async_trait;
use noesis_beliefs::BeliefService;
use noesis_model::{Belief, BeliefSystem, BeliefType, DialecticEvent, Error, InteractionEvent, Result};
use noesis_oracle::Oracle;
use tracing::{debug, info};

use super::{EpistemicResponse, Epistemology};

pub struct PerspectiveTakingEpistemology {
    oracle: Arc<dyn Oracle>,
    beliefs: BeliefService,
}

impl PerspectiveTakingEpistemology {
    pub fn new(oracle: Arc<dyn Oracle>, beliefs: BeliefService) -> Self {
        Self { oracle, beliefs }
    }
}

#[async_trait]
impl Epistemology for PerspectiveTakingEpistemology {
    /// Treat the incoming resource as another self-model's perspective:
    /// extract its beliefs onto the target model, then tombstone whichever
    /// existing beliefs the oracle judges invalidated.
    async fn process(
        &self,
        event: &DialecticEvent,
        dry_run: bool,
        self_model_id: &str,
    ) -> Result<BeliefSystem> {
        let resource = event
            .resource
            .as_deref()
            .ok_or_else(|| Error::InvalidValue("perspective event carries no resource".into()))?;

        let texts = self
            .oracle
            .extract_beliefs_from_resource(resource)
            .await
            .map_err(|e| e.into_model("extract_beliefs_from_resource"))?;

        let existing = self.beliefs.list_beliefs(self_model_id, None)?;

        let mut incoming: Vec<Belief> = Vec::with_capacity(texts.len());
        for text in texts {
            if text.trim().is_empty() {
                continue;
            }
            incoming.push(self.beliefs.create_belief(
                self_model_id,
                &text,
                BeliefType::Statement,
                dry_run,
            )?);
        }

        let verdict = self
            .oracle
            .determine_belief_validity(&existing, &incoming)
            .await
            .map_err(|e| e.into_model("determine_belief_validity"))?;
        for belief_id in &verdict.invalidated_ids {
            self.beliefs.delete_belief(self_model_id, belief_id, dry_run)?;
        }
        info!(
            self_model_id,
            absorbed = incoming.len(),
            invalidated = verdict.invalidated_ids.len(),
            dry_run,
            "perspective reconciled"
        );

        self.beliefs.get_belief_system(self_model_id)
    }

    /// Voice how the holder of `belief_system` would respond to the exchange
    /// carried by the event.
    async fn respond(
        &self,
        belief_system: &BeliefSystem,
        event: &DialecticEvent,
        answer: Option<&str>,
    ) -> Result<EpistemicResponse> {
        let belief_texts: Vec<String> =
            belief_system.active_beliefs().map(Belief::content_text).collect();
        let summary = self
            .oracle
            .summarize_belief_system(&belief_texts)
            .await
            .map_err(|e| e.into_model("summarize_belief_system"))?;

        let exchange = match event.last_answered() {
            Some(answered) => answered,
            None => {
                let question = event
                    .previous_interactions
                    .last()
                    .map(|i| i.question_text().to_string())
                    .unwrap_or_default();
                InteractionEvent {
                    question,
                    answer: answer.unwrap_or_default().to_string(),
                }
            }
        };

        let perspective = self
            .oracle
            .generate_perspective(&summary, &exchange)
            .await
            .map_err(|e| e.into_model("generate_perspective"))?;
        debug!(chars = perspective.len(), "perspective generated");
        Ok(EpistemicResponse::Perspective(perspective))
    }
}

#[cfg(test)]
mod tests {
    use noesis_kv::KvStore;
    use noesis_model::DialecticalInteraction;
    use noesis_oracle::ScriptedOracle;

    use super::*;

    fn setup() -> (Arc<ScriptedOracle>, BeliefService, PerspectiveTakingEpistemology) {
        let kv = Arc::new(KvStore::in_memory());
        let oracle = Arc::new(ScriptedOracle::new());
        let beliefs = BeliefService::new(kv);
        let epistemology = PerspectiveTakingEpistemology::new(oracle.clone(), beliefs.clone());
        (oracle, beliefs, epistemology)
    }

    #[tokio::test]
    async fn resource_beliefs_land_on_the_target_model() {
        let (_oracle, beliefs, epistemology) = setup();
        let event = DialecticEvent {
            resource: Some("Exercise builds resilience. Sleep repairs the mind.".into()),
            ..Default::default()
        };

        let bs = epistemology.process(&event, false, "sm1").await.unwrap();
        assert_eq!(bs.beliefs.len(), 2);
        assert_eq!(beliefs.list_beliefs("sm1", None).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn invalidated_beliefs_are_tombstoned() {
        let (oracle, beliefs, epistemology) = setup();
        let stale = beliefs
            .create_belief("sm1", "I never exercise", BeliefType::Statement, false)
            .unwrap();
        oracle.script_invalidated(vec![stale.id.clone()]);

        let event = DialecticEvent {
            resource: Some("Daily exercise is essential.".into()),
            ..Default::default()
        };
        let bs = epistemology.process(&event, false, "sm1").await.unwrap();

        assert!(bs.beliefs.iter().all(|b| b.id != stale.id));
        let history = beliefs.belief_history("sm1", &stale.id).unwrap();
        assert!(!history.last().unwrap().active);
    }

    #[tokio::test]
    async fn missing_resource_is_invalid() {
        let (_oracle, _beliefs, epistemology) = setup();
        let err = epistemology
            .process(&DialecticEvent::default(), false, "sm1")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidValue(_)));
    }

    #[tokio::test]
    async fn respond_voices_a_perspective_over_the_exchange() {
        let (_oracle, beliefs, epistemology) = setup();
        beliefs
            .create_belief("sm2", "Rest is productive", BeliefType::Statement, false)
            .unwrap();
        let bs = beliefs.get_belief_system("sm2").unwrap();

        let mut turn = DialecticalInteraction::pending("din_1".into(), "How do you sleep?");
        turn.answer_with("I sleep 8 hours", Vec::new());
        let event = DialecticEvent {
            previous_interactions: vec![turn],
            ..Default::default()
        };

        let EpistemicResponse::Perspective(text) =
            epistemology.respond(&bs, &event, None).await.unwrap()
        else {
            panic!("perspective respond must produce text");
        };
        assert!(text.contains("Rest is productive"));
        assert!(text.contains("How do you sleep?"));
    }
}
