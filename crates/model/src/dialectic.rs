use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::belief::{Belief, BeliefType};

/// Milliseconds since the Unix epoch, UTC.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InteractionStatus {
    Invalid,
    PendingAnswer,
    Answered,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub question: String,
    pub created_at_millis_utc: i64,
}

impl Question {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            created_at_millis_utc: now_millis(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserAnswer {
    pub user_answer: String,
    pub created_at_millis_utc: i64,
}

impl UserAnswer {
    pub fn new(user_answer: impl Into<String>) -> Self {
        Self {
            user_answer: user_answer.into(),
            created_at_millis_utc: now_millis(),
        }
    }
}

/// Payload of one interaction, discriminated by kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InteractionData {
    QuestionAnswer {
        question: Question,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        answer: Option<UserAnswer>,
        /// Beliefs extracted from the answer at the time it was processed.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        extracted_beliefs: Vec<Belief>,
    },
}

/// One turn of a dialectic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialecticalInteraction {
    pub id: String,
    pub status: InteractionStatus,
    pub interaction: InteractionData,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub perspectives: Vec<String>,
    pub updated_at_millis_utc: i64,
}

impl DialecticalInteraction {
    /// A fresh pending question turn.
    pub fn pending(id: String, question: impl Into<String>) -> Self {
        Self {
            id,
            status: InteractionStatus::PendingAnswer,
            interaction: InteractionData::QuestionAnswer {
                question: Question::new(question),
                answer: None,
                extracted_beliefs: Vec::new(),
            },
            perspectives: Vec::new(),
            updated_at_millis_utc: now_millis(),
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == InteractionStatus::PendingAnswer
    }

    pub fn question_text(&self) -> &str {
        match &self.interaction {
            InteractionData::QuestionAnswer { question, .. } => &question.question,
        }
    }

    pub fn answer_text(&self) -> Option<&str> {
        match &self.interaction {
            InteractionData::QuestionAnswer { answer, .. } => {
                answer.as_ref().map(|a| a.user_answer.as_str())
            }
        }
    }

    /// Attach an answer, record extracted beliefs, and mark the turn answered.
    pub fn answer_with(&mut self, user_answer: impl Into<String>, beliefs: Vec<Belief>) {
        match &mut self.interaction {
            InteractionData::QuestionAnswer {
                answer,
                extracted_beliefs,
                ..
            } => {
                *answer = Some(UserAnswer::new(user_answer));
                *extracted_beliefs = beliefs;
            }
        }
        self.status = InteractionStatus::Answered;
        self.updated_at_millis_utc = now_millis();
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgentType {
    #[default]
    Llm,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DialecticType {
    #[default]
    Default,
    PerspectiveTaking,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    pub agent_type: AgentType,
    pub dialectic_type: DialecticType,
}

/// A declarative goal steering question generation and defining completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningObjective {
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub topics: Vec<String>,
    pub target_belief_type: BeliefType,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub target_belief_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub observation_context_ids: Vec<String>,
    /// In [0, 100].
    pub completion_percentage: f64,
    pub is_complete: bool,
}

impl LearningObjective {
    pub fn new(description: impl Into<String>, topics: Vec<String>) -> Self {
        Self {
            description: description.into(),
            topics,
            target_belief_type: BeliefType::Statement,
            target_belief_ids: Vec::new(),
            observation_context_ids: Vec::new(),
            completion_percentage: 0.0,
            is_complete: false,
        }
    }
}

/// A multi-turn Q&A session evolving a belief system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dialectic {
    pub id: String,
    pub self_model_id: String,
    pub agent: Agent,
    pub user_interactions: Vec<DialecticalInteraction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub learning_objective: Option<LearningObjective>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub perspective_model_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<String>,
}

impl Dialectic {
    pub fn latest_interaction(&self) -> Option<&DialecticalInteraction> {
        self.user_interactions.last()
    }

    /// Indices of every interaction still awaiting an answer, in order.
    pub fn pending_indices(&self) -> Vec<usize> {
        self.user_interactions
            .iter()
            .enumerate()
            .filter(|(_, i)| i.is_pending())
            .map(|(idx, _)| idx)
            .collect()
    }

    /// Answered question/answer pairs in chronological order.
    pub fn answered_events(&self) -> Vec<InteractionEvent> {
        self.user_interactions
            .iter()
            .filter(|i| i.status == InteractionStatus::Answered)
            .filter_map(|i| {
                i.answer_text().map(|a| InteractionEvent {
                    question: i.question_text().to_string(),
                    answer: a.to_string(),
                })
            })
            .collect()
    }
}

/// One answered question/answer pair, the unit the oracle reasons over.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InteractionEvent {
    pub question: String,
    pub answer: String,
}

/// Everything an epistemology needs to process one turn: the full interaction
/// history plus optional steering inputs.
#[derive(Debug, Clone, Default)]
pub struct DialecticEvent {
    pub previous_interactions: Vec<DialecticalInteraction>,
    /// Used verbatim as the next question instead of asking the oracle.
    pub custom_question: Option<String>,
    /// External resource consumed by the perspective-taking strategy.
    pub resource: Option<String>,
}

impl DialecticEvent {
    /// The last answered turn, if any, as an oracle event.
    pub fn last_answered(&self) -> Option<InteractionEvent> {
        self.previous_interactions
            .iter()
            .rev()
            .find(|i| i.status == InteractionStatus::Answered)
            .and_then(|i| {
                i.answer_text().map(|a| InteractionEvent {
                    question: i.question_text().to_string(),
                    answer: a.to_string(),
                })
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_interaction_becomes_answered() {
        let mut turn = DialecticalInteraction::pending("din_1".into(), "How do you sleep?");
        assert!(turn.is_pending());
        turn.answer_with("Eight hours", Vec::new());
        assert_eq!(turn.status, InteractionStatus::Answered);
        assert_eq!(turn.answer_text(), Some("Eight hours"));
    }

    #[test]
    fn pending_indices_tracks_unanswered_turns() {
        let mut d = Dialectic {
            id: "di_1".into(),
            self_model_id: "sm_1".into(),
            agent: Agent::default(),
            user_interactions: vec![
                DialecticalInteraction::pending("din_1".into(), "Q1"),
                DialecticalInteraction::pending("din_2".into(), "Q2"),
            ],
            learning_objective: None,
            perspective_model_ids: Vec::new(),
            analysis: None,
        };
        d.user_interactions[0].answer_with("A1", Vec::new());
        assert_eq!(d.pending_indices(), vec![1]);
    }

    #[test]
    fn interaction_serde_roundtrip_keeps_tag() {
        let turn = DialecticalInteraction::pending("din_1".into(), "Q");
        let json = serde_json::to_string(&turn).unwrap();
        assert!(json.contains("\"type\":\"question_answer\""));
        let back: DialecticalInteraction = serde_json::from_str(&json).unwrap();
        assert_eq!(back, turn);
    }

    #[test]
    fn last_answered_skips_pending_turns() {
        let mut first = DialecticalInteraction::pending("din_1".into(), "Q1");
        first.answer_with("A1", Vec::new());
        let event = DialecticEvent {
            previous_interactions: vec![first, DialecticalInteraction::pending("din_2".into(), "Q2")],
            ..Default::default()
        };
        let last = event.last_answered().unwrap();
        assert_eq!(last.question, "Q1");
        assert_eq!(last.answer, "A1");
    }
}
