//! Deterministic oracle for tests and offline runs.
//!
//! Text-transform defaults cover every capability; individual answers can be
//! scripted per test through the setter methods.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use noesis_model::{Belief, BeliefSystem, DialecticalInteraction, InteractionEvent, LearningObjective};

use crate::{BeliefUpdateDecision, Oracle, OracleResult, ValidityVerdict};

#[derive(Debug, Default)]
pub struct ScriptedOracle {
    question_counter: AtomicUsize,
    queued_questions: Mutex<VecDeque<String>>,
    /// Existing belief text → replacement text for update decisions.
    update_rules: Mutex<HashMap<String, String>>,
    /// Overrides the positional answer matching when set.
    matched_answers: Mutex<Option<Vec<String>>>,
    /// Overrides belief extraction from events when set.
    extracted_beliefs: Mutex<Option<Vec<String>>>,
    invalidated_ids: Mutex<Vec<String>>,
    completion: Mutex<f64>,
}

impl ScriptedOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the next generated question; later calls fall back to counting.
    pub fn queue_question(&self, question: impl Into<String>) {
        self.queued_questions
            .lock()
            .expect("scripted oracle lock")
            .push_back(question.into());
    }

    /// When an update decision is requested for `existing`, answer
    /// "yes, replace with `updated`".
    pub fn rule_update(&self, existing: impl Into<String>, updated: impl Into<String>) {
        self.update_rules
            .lock()
            .expect("scripted oracle lock")
            .insert(existing.into(), updated.into());
    }

    pub fn script_matched_answers(&self, answers: Vec<String>) {
        *self.matched_answers.lock().expect("scripted oracle lock") = Some(answers);
    }

    pub fn script_extracted_beliefs(&self, beliefs: Vec<String>) {
        *self.extracted_beliefs.lock().expect("scripted oracle lock") = Some(beliefs);
    }

    pub fn script_invalidated(&self, ids: Vec<String>) {
        *self.invalidated_ids.lock().expect("scripted oracle lock") = ids;
    }

    pub fn set_completion(&self, percentage: f64) {
        *self.completion.lock().expect("scripted oracle lock") = percentage;
    }

    fn next_question(&self) -> String {
        if let Some(queued) = self
            .queued_questions
            .lock()
            .expect("scripted oracle lock")
            .pop_front()
        {
            return queued;
        }
        let n = self.question_counter.fetch_add(1, Ordering::Relaxed) + 1;
        format!("What else shapes your view? ({n})")
    }
}

#[async_trait]
impl Oracle for ScriptedOracle {
    async fn generate_question(
        &self,
        _belief_summary: &str,
        _prior: &[InteractionEvent],
    ) -> OracleResult<String> {
        Ok(self.next_question())
    }

    async fn generate_question_for_objective(
        &self,
        objective: &LearningObjective,
        _prior: &[InteractionEvent],
    ) -> OracleResult<String> {
        if let Some(queued) = self
            .queued_questions
            .lock()
            .expect("scripted oracle lock")
            .pop_front()
        {
            return Ok(queued);
        }
        Ok(format!("Tell me more about {}", objective.topics.join(", ")))
    }

    async fn interaction_event_as_beliefs(
        &self,
        event: &InteractionEvent,
    ) -> OracleResult<Vec<String>> {
        if let Some(scripted) = self.extracted_beliefs.lock().expect("scripted oracle lock").clone() {
            return Ok(scripted);
        }
        if event.answer.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(vec![event.answer.trim().to_string()])
    }

    async fn update_belief_with_event(
        &self,
        _event: &InteractionEvent,
        existing_belief: &str,
    ) -> OracleResult<BeliefUpdateDecision> {
        let rules = self.update_rules.lock().expect("scripted oracle lock");
        match rules.get(existing_belief) {
            Some(updated) => Ok(BeliefUpdateDecision {
                should_update: true,
                updated_text: updated.clone(),
            }),
            None => Ok(BeliefUpdateDecision::default()),
        }
    }

    async fn extract_questions_from_text(&self, text: &str) -> OracleResult<Vec<String>> {
        Ok(text
            .lines()
            .map(str::trim)
            .filter(|line| line.ends_with('?'))
            .map(ToString::to_string)
            .collect())
    }

    async fn match_answers_to_questions(
        &self,
        answer_blob: &str,
        questions: &[String],
    ) -> OracleResult<Vec<String>> {
        if let Some(scripted) = self.matched_answers.lock().expect("scripted oracle lock").clone() {
            let mut answers = scripted;
            answers.resize(questions.len(), String::new());
            return Ok(answers);
        }
        let mut answers: Vec<String> = answer_blob
            .split("\n\n")
            .map(|segment| segment.trim().to_string())
            .collect();
        answers.resize(questions.len(), String::new());
        Ok(answers)
    }

    async fn predict_answer(&self, question: &str) -> OracleResult<String> {
        Ok(format!("Predicted answer to: {question}"))
    }

    async fn extract_beliefs_from_resource(&self, resource: &str) -> OracleResult<Vec<String>> {
        Ok(resource
            .split('.')
            .map(str::trim)
            .filter(|sentence| !sentence.is_empty())
            .map(ToString::to_string)
            .collect())
    }

    async fn determine_belief_validity(
        &self,
        _existing: &[Belief],
        incoming: &[Belief],
    ) -> OracleResult<ValidityVerdict> {
        Ok(ValidityVerdict {
            kept_ids: incoming.iter().map(|b| b.id.clone()).collect(),
            invalidated_ids: self.invalidated_ids.lock().expect("scripted oracle lock").clone(),
        })
    }

    async fn check_objective_completion(
        &self,
        _objective: &LearningObjective,
        _beliefs: &[Belief],
    ) -> OracleResult<f64> {
        Ok(*self.completion.lock().expect("scripted oracle lock"))
    }

    async fn generate_analysis(
        &self,
        strategy: &str,
        _belief_system: &BeliefSystem,
        interactions: &[DialecticalInteraction],
        _event: &InteractionEvent,
    ) -> OracleResult<String> {
        Ok(format!(
            "{strategy} analysis over {} interactions",
            interactions.len()
        ))
    }

    async fn is_answer_to_question(&self, _question: &str, answer: &str) -> OracleResult<bool> {
        Ok(!answer.trim().is_empty())
    }

    async fn summarize_belief_system(&self, belief_texts: &[String]) -> OracleResult<String> {
        Ok(belief_texts.join("; "))
    }

    async fn generate_perspective(
        &self,
        belief_summary: &str,
        event: &InteractionEvent,
    ) -> OracleResult<String> {
        Ok(format!(
            "Holding '{belief_summary}', one would say about '{}': {}",
            event.question, event.answer
        ))
    }
}
