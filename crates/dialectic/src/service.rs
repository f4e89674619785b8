//! Dialectic lifecycle and turn orchestration.
//!
//! Owns the per-dialectic state machine: a trailing `PendingAnswer`
//! interaction advances to `Answered`, belief extraction runs against the
//! answer, and the chosen strategy synthesizes the next question. Blob-based
//! flows may hold several pending interactions at once; the single-trailing
//! invariant applies to the plain answer path.

use std::collections::HashMap;
use std::sync::Arc;

use noesis_beliefs::{BeliefService, ppc};
use noesis_config::DialecticConfig;
use noesis_kv::{KvStore, StoreError, StoredValue};
use noesis_model::{
    Agent, BeliefSystem, BeliefType, Dialectic, DialecticEvent, DialecticType,
    DialecticalInteraction, Error, InteractionEvent, LearningObjective, Result, ids,
};
use noesis_oracle::Oracle;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::epistemology::{
    DialecticalEpistemology, EpistemicResponse, Epistemology, PerspectiveTakingEpistemology,
    find_equivalent,
};

#[derive(Debug, Clone, Default)]
pub struct UpdateDialecticInput {
    pub dialectic_id: String,
    pub self_model_id: String,
    pub answer: Option<String>,
    pub custom_question: Option<String>,
    pub question_blob: Option<String>,
    pub answer_blob: Option<String>,
    pub dry_run: bool,
}

impl UpdateDialecticInput {
    fn is_empty(&self) -> bool {
        self.answer.is_none()
            && self.custom_question.is_none()
            && self.question_blob.is_none()
            && self.answer_blob.is_none()
    }
}

pub struct DialecticService {
    kv: Arc<KvStore>,
    oracle: Arc<dyn Oracle>,
    beliefs: BeliefService,
    dialectical: DialecticalEpistemology,
    perspective: PerspectiveTakingEpistemology,
    completion_threshold: f64,
    analysis_enabled: bool,
    /// One mutex per dialectic so concurrent updates serialize and the
    /// trailing-interaction invariant holds under races.
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl DialecticService {
    pub fn new(
        kv: Arc<KvStore>,
        oracle: Arc<dyn Oracle>,
        beliefs: BeliefService,
        config: &DialecticConfig,
    ) -> Self {
        let dialectical = DialecticalEpistemology::new(
            oracle.clone(),
            beliefs.clone(),
            config.predictive_processing,
        );
        let perspective = PerspectiveTakingEpistemology::new(oracle.clone(), beliefs.clone());
        Self {
            kv,
            oracle,
            beliefs,
            dialectical,
            perspective,
            completion_threshold: config.completion_threshold,
            analysis_enabled: config.analysis_enabled,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Start a dialectic with exactly one pending interaction. The opening
    /// question comes from the learning objective when one is supplied,
    /// otherwise from the dialectical strategy over an empty history.
    pub async fn create_dialectic(
        &self,
        self_model_id: &str,
        dialectic_type: DialecticType,
        learning_objective: Option<LearningObjective>,
        perspective_model_ids: Vec<String>,
    ) -> Result<Dialectic> {
        let question = match &learning_objective {
            Some(objective) => self
                .oracle
                .generate_question_for_objective(objective, &[])
                .await
                .map_err(|e| e.into_model("generate_question_for_objective"))?,
            None => {
                let belief_system = self.beliefs.get_belief_system(self_model_id)?;
                let response = self
                    .dialectical
                    .respond(&belief_system, &DialecticEvent::default(), None)
                    .await?;
                match response {
                    EpistemicResponse::Turn(turn) => turn.new_interaction.question_text().to_string(),
                    EpistemicResponse::Perspective(_) => {
                        return Err(Error::invariant("dialectical strategy produced a perspective"));
                    }
                }
            }
        };

        let dialectic = Dialectic {
            id: ids::new_dialectic_id(),
            self_model_id: self_model_id.to_string(),
            agent: Agent {
                agent_type: Default::default(),
                dialectic_type,
            },
            user_interactions: vec![DialecticalInteraction::pending(
                ids::new_interaction_id(),
                question,
            )],
            learning_objective,
            perspective_model_ids,
            analysis: None,
        };
        self.store_dialectic(&dialectic)?;
        info!(self_model_id, dialectic_id = %dialectic.id, "dialectic created");
        Ok(dialectic)
    }

    /// All dialectics owned by a self-model. An unknown namespace yields an
    /// empty list.
    pub fn list_dialectics(&self, self_model_id: &str) -> Result<Vec<Dialectic>> {
        let values = match self.kv.list_by_type(self_model_id, "Dialectic") {
            Ok(values) => values,
            Err(StoreError::NotFound { .. }) => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };
        Ok(values.into_iter().filter_map(StoredValue::into_dialectic).collect())
    }

    pub fn get_dialectic(&self, self_model_id: &str, dialectic_id: &str) -> Result<Dialectic> {
        match self.kv.retrieve(self_model_id, dialectic_id) {
            Ok(value) => value
                .into_dialectic()
                .ok_or_else(|| Error::InvalidValue(format!("`{dialectic_id}` is not a dialectic"))),
            Err(StoreError::NotFound { .. }) => Err(Error::not_found("dialectic", dialectic_id)),
            Err(err) => Err(err.into()),
        }
    }

    /// Advance a dialectic by one turn. See the module docs for the shape of
    /// each input; an input carrying none of them returns the dialectic
    /// unchanged without touching the oracle or the store.
    pub async fn update_dialectic(&self, input: UpdateDialecticInput) -> Result<Dialectic> {
        let lock = self.lock_for(&input.dialectic_id).await;
        let _guard = lock.lock().await;

        let mut dialectic = self.get_dialectic(&input.self_model_id, &input.dialectic_id)?;
        if input.is_empty() {
            debug!(dialectic_id = %dialectic.id, "empty update, returning unchanged");
            return Ok(dialectic);
        }

        if let Some(answer) = &input.answer {
            self.apply_answer(&mut dialectic, answer, &input).await?;
        } else if let Some(custom) = &input.custom_question {
            dialectic
                .user_interactions
                .push(DialecticalInteraction::pending(ids::new_interaction_id(), custom));
        }

        if let Some(blob) = &input.question_blob {
            self.apply_question_blob(&mut dialectic, blob).await?;
        }

        if let Some(blob) = &input.answer_blob {
            self.apply_answer_blob(&mut dialectic, blob, &input).await?;
        }

        if !input.dry_run {
            self.store_dialectic(&dialectic)?;
        }
        Ok(dialectic)
    }

    /// The plain answer path: answer the trailing pending interaction, absorb
    /// it into the belief system, then either progress the learning objective
    /// or ask the next open question.
    async fn apply_answer(
        &self,
        dialectic: &mut Dialectic,
        answer: &str,
        input: &UpdateDialecticInput,
    ) -> Result<()> {
        let trailing_pending = dialectic.latest_interaction().is_some_and(|i| i.is_pending());
        if !trailing_pending {
            return Err(Error::invariant(format!(
                "dialectic `{}` has no pending interaction to answer",
                dialectic.id
            )));
        }

        let idx = dialectic.user_interactions.len() - 1;
        let exchange = InteractionEvent {
            question: dialectic.user_interactions[idx].question_text().to_string(),
            answer: answer.to_string(),
        };
        let belief_system = self
            .absorb_answer(dialectic, idx, answer, input.custom_question.as_deref(), input.dry_run)
            .await?;

        if dialectic.learning_objective.is_some() {
            self.progress_objective(dialectic).await?;
        } else {
            self.append_next_question(
                dialectic,
                &belief_system,
                input.custom_question.as_deref(),
            )
            .await?;
        }

        if self.analysis_enabled {
            match self
                .oracle
                .generate_analysis("dialectical", &belief_system, &dialectic.user_interactions, &exchange)
                .await
            {
                Ok(analysis) => dialectic.analysis = Some(analysis),
                Err(err) => warn!(error = %err, "analysis generation failed"),
            }
        }
        Ok(())
    }

    /// Extract questions from free text; each non-empty one becomes a new
    /// pending interaction.
    async fn apply_question_blob(&self, dialectic: &mut Dialectic, blob: &str) -> Result<()> {
        let questions = self
            .oracle
            .extract_questions_from_text(blob)
            .await
            .map_err(|e| e.into_model("extract_questions_from_text"))?;
        let mut appended = 0usize;
        for question in questions {
            if question.trim().is_empty() {
                continue;
            }
            dialectic
                .user_interactions
                .push(DialecticalInteraction::pending(ids::new_interaction_id(), question));
            appended += 1;
        }
        debug!(dialectic_id = %dialectic.id, appended, "questions extracted from blob");
        Ok(())
    }

    /// Match a free-form answer blob against every still-pending interaction
    /// positionally. Matched ones are answered and absorbed; empty matches
    /// stay pending. One fresh question is appended at the tail.
    async fn apply_answer_blob(
        &self,
        dialectic: &mut Dialectic,
        blob: &str,
        input: &UpdateDialecticInput,
    ) -> Result<()> {
        let pending = dialectic.pending_indices();
        if !pending.is_empty() {
            let questions: Vec<String> = pending
                .iter()
                .map(|&i| dialectic.user_interactions[i].question_text().to_string())
                .collect();
            let answers = self
                .oracle
                .match_answers_to_questions(blob, &questions)
                .await
                .map_err(|e| e.into_model("match_answers_to_questions"))?;

            for (&idx, answer) in pending.iter().zip(answers.iter()) {
                if answer.trim().is_empty() {
                    continue;
                }
                self.absorb_answer(dialectic, idx, answer, None, input.dry_run).await?;
                self.attach_perspectives(dialectic, idx, answer).await?;
            }
        }

        let belief_system = self.beliefs.get_belief_system(&input.self_model_id)?;
        self.append_next_question(dialectic, &belief_system, None).await
    }

    /// Answer interaction `idx` and fold the exchange into the belief system:
    /// strategy processing, belief extraction with substring de-duplication,
    /// observation-graph growth, and persistence of the system.
    async fn absorb_answer(
        &self,
        dialectic: &mut Dialectic,
        idx: usize,
        answer: &str,
        custom_question: Option<&str>,
        dry_run: bool,
    ) -> Result<BeliefSystem> {
        let self_model_id = dialectic.self_model_id.clone();
        let question = dialectic.user_interactions[idx].question_text().to_string();
        let interaction_id = dialectic.user_interactions[idx].id.clone();

        // Splice the answer in-memory so the strategy sees an answered turn.
        dialectic.user_interactions[idx].answer_with(answer, Vec::new());

        let event = DialecticEvent {
            previous_interactions: dialectic.user_interactions.clone(),
            custom_question: custom_question.map(ToString::to_string),
            resource: Some(answer.to_string()),
        };
        let mut belief_system = self
            .epistemology_for(dialectic.agent.dialectic_type)
            .process(&event, dry_run, &self_model_id)
            .await?;

        let exchange = InteractionEvent {
            question: question.clone(),
            answer: answer.to_string(),
        };
        let texts = self
            .oracle
            .interaction_event_as_beliefs(&exchange)
            .await
            .map_err(|e| e.into_model("interaction_event_as_beliefs"))?;

        let mut extracted = Vec::new();
        for text in texts {
            if text.trim().is_empty() {
                continue;
            }
            // Substring-equivalent beliefs are never recreated; the existing
            // one is attributed to this interaction instead.
            if let Some(existing) = find_equivalent(&belief_system.beliefs, &text) {
                extracted.push(existing.clone());
                continue;
            }
            let created =
                self.beliefs
                    .create_belief(&self_model_id, &text, BeliefType::Statement, dry_run)?;
            belief_system.beliefs.push(created.clone());
            extracted.push(created);
        }

        if !belief_system.epistemic_contexts.is_empty() && !extracted.is_empty() {
            let belief_ids: Vec<String> = extracted.iter().map(|b| b.id.clone()).collect();
            ppc::attach_interaction(&mut belief_system, &interaction_id, &question, &belief_ids)?;
        }

        // Oracle-derived artifacts are written above; the aggregate comes last
        // so a failure leaves state unchanged or monotonically extended.
        if !dry_run {
            self.beliefs.store_belief_system(&self_model_id, &belief_system)?;
        }

        dialectic.user_interactions[idx].answer_with(answer, extracted);
        Ok(belief_system)
    }

    /// Ask each attached perspective model for its view of the exchange.
    /// Failures degrade to a missing perspective, never a failed turn.
    async fn attach_perspectives(
        &self,
        dialectic: &mut Dialectic,
        idx: usize,
        answer: &str,
    ) -> Result<()> {
        for model_id in dialectic.perspective_model_ids.clone() {
            let perspective_system = self.beliefs.get_belief_system(&model_id)?;
            let event = DialecticEvent {
                previous_interactions: vec![dialectic.user_interactions[idx].clone()],
                ..Default::default()
            };
            match self.perspective.respond(&perspective_system, &event, Some(answer)).await {
                Ok(EpistemicResponse::Perspective(text)) => {
                    dialectic.user_interactions[idx].perspectives.push(text);
                }
                Ok(EpistemicResponse::Turn(_)) => {}
                Err(err) => warn!(model_id = %model_id, error = %err, "perspective generation failed"),
            }
        }
        Ok(())
    }

    /// Re-score the learning objective; append the next objective question
    /// while below the completion threshold, otherwise mark it complete.
    async fn progress_objective(&self, dialectic: &mut Dialectic) -> Result<()> {
        let prior = dialectic.answered_events();
        let held = self.beliefs.list_beliefs(&dialectic.self_model_id, None)?;

        let mut next_question = None;
        if let Some(objective) = dialectic.learning_objective.as_mut() {
            let percentage = self
                .oracle
                .check_objective_completion(objective, &held)
                .await
                .map_err(|e| e.into_model("check_objective_completion"))?;
            objective.completion_percentage = percentage.clamp(0.0, 100.0);

            if objective.completion_percentage < self.completion_threshold {
                next_question = Some(
                    self.oracle
                        .generate_question_for_objective(objective, &prior)
                        .await
                        .map_err(|e| e.into_model("generate_question_for_objective"))?,
                );
            } else {
                objective.is_complete = true;
                info!(
                    dialectic_id = %dialectic.id,
                    completion = objective.completion_percentage,
                    "learning objective complete"
                );
            }
        }

        if let Some(question) = next_question {
            dialectic
                .user_interactions
                .push(DialecticalInteraction::pending(ids::new_interaction_id(), question));
        }
        Ok(())
    }

    async fn append_next_question(
        &self,
        dialectic: &mut Dialectic,
        belief_system: &BeliefSystem,
        custom_question: Option<&str>,
    ) -> Result<()> {
        let event = DialecticEvent {
            previous_interactions: dialectic.user_interactions.clone(),
            custom_question: custom_question.map(ToString::to_string),
            resource: None,
        };
        match self.dialectical.respond(belief_system, &event, None).await? {
            EpistemicResponse::Turn(turn) => {
                dialectic.user_interactions.push(turn.new_interaction);
                Ok(())
            }
            EpistemicResponse::Perspective(_) => {
                Err(Error::invariant("dialectical strategy produced a perspective"))
            }
        }
    }

    fn epistemology_for(&self, dialectic_type: DialecticType) -> &dyn Epistemology {
        match dialectic_type {
            DialecticType::Default => &self.dialectical,
            DialecticType::PerspectiveTaking => &self.perspective,
        }
    }

    /// Dialectic version is its interaction count.
    fn store_dialectic(&self, dialectic: &Dialectic) -> Result<()> {
        let version = dialectic.user_interactions.len() as i64;
        self.kv.store(
            &dialectic.self_model_id,
            &dialectic.id,
            StoredValue::Dialectic(dialectic.clone()),
            version,
        )?;
        Ok(())
    }

    async fn lock_for(&self, dialectic_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(dialectic_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}
