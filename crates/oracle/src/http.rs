//! OpenAI-compatible chat-completions adapter.
//!
//! One blocking-from-the-caller's-viewpoint round trip per capability call.
//! List-valued capabilities ask the model for a JSON array and fall back to
//! line splitting when the model ignores the instruction.

use std::time::Duration;

use async_trait::async_trait;
use noesis_model::{Belief, BeliefSystem, DialecticalInteraction, InteractionEvent, LearningObjective};
use serde_json::json;
use tracing::{debug, warn};

use crate::{BeliefUpdateDecision, Oracle, OracleError, OracleResult, ValidityVerdict};

#[derive(Debug, Clone)]
pub struct HttpOracle {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl HttpOracle {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> OracleResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| OracleError::Unavailable(err.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            model: model.into(),
            api_key,
        })
    }

    async fn complete(&self, system: &str, user: &str) -> OracleResult<String> {
        let endpoint = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let payload = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user}
            ],
            "stream": false
        });

        let mut request = self.client.post(&endpoint).json(&payload);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        let body: serde_json::Value = response.json().await?;
        if !status.is_success() {
            return Err(OracleError::Transport(format!(
                "provider error ({status}): {body}"
            )));
        }

        let content = body
            .get("choices")
            .and_then(|choices| choices.get(0))
            .and_then(|choice| choice.get("message"))
            .and_then(|message| message.get("content"))
            .and_then(|content| content.as_str())
            .ok_or_else(|| OracleError::Malformed(format!("response missing content: {body}")))?;

        debug!(endpoint = %endpoint, chars = content.len(), "oracle completion");
        Ok(content.trim().to_string())
    }

    async fn complete_list(&self, system: &str, user: &str) -> OracleResult<Vec<String>> {
        let content = self.complete(system, user).await?;
        Ok(parse_string_list(&content))
    }
}

/// Parse model output as a JSON string array, tolerating surrounding prose
/// and falling back to one-item-per-line.
fn parse_string_list(content: &str) -> Vec<String> {
    let trimmed = content.trim();
    if let Some(start) = trimmed.find('[')
        && let Some(end) = trimmed.rfind(']')
        && start < end
        && let Ok(items) = serde_json::from_str::<Vec<String>>(&trimmed[start..=end])
    {
        return items;
    }
    trimmed
        .lines()
        .map(|line| line.trim().trim_start_matches(['-', '*']).trim())
        .filter(|line| !line.is_empty())
        .map(ToString::to_string)
        .collect()
}

fn parse_percentage(content: &str) -> OracleResult<f64> {
    let cleaned = content.trim().trim_end_matches('%').trim();
    let first_token = cleaned.split_whitespace().next().unwrap_or_default();
    first_token
        .parse::<f64>()
        .map(|p| p.clamp(0.0, 100.0))
        .map_err(|_| OracleError::Malformed(format!("expected a percentage, got: {content}")))
}

fn render_prior(prior: &[InteractionEvent]) -> String {
    prior
        .iter()
        .map(|e| format!("Q: {}\nA: {}", e.question, e.answer))
        .collect::<Vec<_>>()
        .join("\n")
}

#[async_trait]
impl Oracle for HttpOracle {
    async fn generate_question(
        &self,
        belief_summary: &str,
        prior: &[InteractionEvent],
    ) -> OracleResult<String> {
        self.complete(
            "You elicit a person's beliefs one question at a time. \
             Produce exactly one short open question that has not been asked before. \
             Reply with the question only.",
            &format!(
                "Known beliefs:\n{belief_summary}\n\nPrior turns:\n{}",
                render_prior(prior)
            ),
        )
        .await
    }

    async fn generate_question_for_objective(
        &self,
        objective: &LearningObjective,
        prior: &[InteractionEvent],
    ) -> OracleResult<String> {
        self.complete(
            "You elicit beliefs toward a learning objective. \
             Produce exactly one short open question advancing the objective. \
             Reply with the question only.",
            &format!(
                "Objective: {}\nTopics: {}\n\nPrior turns:\n{}",
                objective.description,
                objective.topics.join(", "),
                render_prior(prior)
            ),
        )
        .await
    }

    async fn interaction_event_as_beliefs(
        &self,
        event: &InteractionEvent,
    ) -> OracleResult<Vec<String>> {
        self.complete_list(
            "Extract the factual belief statements a person expressed in their answer. \
             Reply with a JSON array of strings; an empty array if there are none.",
            &format!("Q: {}\nA: {}", event.question, event.answer),
        )
        .await
    }

    async fn update_belief_with_event(
        &self,
        event: &InteractionEvent,
        existing_belief: &str,
    ) -> OracleResult<BeliefUpdateDecision> {
        let content = self
            .complete(
                "Decide whether the new answer refines the existing belief. \
                 Reply with JSON: {\"should_update\": bool, \"updated_text\": string}.",
                &format!(
                    "Existing belief: {existing_belief}\nQ: {}\nA: {}",
                    event.question, event.answer
                ),
            )
            .await?;

        let value: serde_json::Value = serde_json::from_str(content.trim()).map_err(|err| {
            OracleError::Malformed(format!("update decision not JSON ({err}): {content}"))
        })?;
        Ok(BeliefUpdateDecision {
            should_update: value
                .get("should_update")
                .and_then(|v| v.as_bool())
                .unwrap_or(false),
            updated_text: value
                .get("updated_text")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
        })
    }

    async fn extract_questions_from_text(&self, text: &str) -> OracleResult<Vec<String>> {
        self.complete_list(
            "List every distinct question contained in the text. \
             Reply with a JSON array of strings.",
            text,
        )
        .await
    }

    async fn match_answers_to_questions(
        &self,
        answer_blob: &str,
        questions: &[String],
    ) -> OracleResult<Vec<String>> {
        let numbered = questions
            .iter()
            .enumerate()
            .map(|(i, q)| format!("{}. {q}", i + 1))
            .collect::<Vec<_>>()
            .join("\n");
        let mut answers = self
            .complete_list(
                "Match passages of the answer text to the numbered questions. \
                 Reply with a JSON array the same length as the question list, \
                 in question order; use \"\" where the text answers nothing.",
                &format!("Questions:\n{numbered}\n\nAnswer text:\n{answer_blob}"),
            )
            .await?;
        // Positional contract: exactly one slot per question.
        answers.resize(questions.len(), String::new());
        Ok(answers)
    }

    async fn predict_answer(&self, question: &str) -> OracleResult<String> {
        self.complete(
            "Predict the most likely answer the person would give. Reply with the answer only.",
            question,
        )
        .await
    }

    async fn extract_beliefs_from_resource(&self, resource: &str) -> OracleResult<Vec<String>> {
        self.complete_list(
            "Extract the belief statements expressed in this resource. \
             Reply with a JSON array of strings.",
            resource,
        )
        .await
    }

    async fn determine_belief_validity(
        &self,
        existing: &[Belief],
        incoming: &[Belief],
    ) -> OracleResult<ValidityVerdict> {
        let render = |beliefs: &[Belief]| {
            beliefs
                .iter()
                .map(|b| format!("{}: {}", b.id, b.content_text()))
                .collect::<Vec<_>>()
                .join("\n")
        };
        let content = self
            .complete(
                "Compare existing beliefs with incoming ones and decide which existing \
                 beliefs the incoming set contradicts. Reply with JSON: \
                 {\"kept_ids\": [..], \"invalidated_ids\": [..]}.",
                &format!(
                    "Existing:\n{}\n\nIncoming:\n{}",
                    render(existing),
                    render(incoming)
                ),
            )
            .await?;

        let value: serde_json::Value = serde_json::from_str(content.trim()).map_err(|err| {
            OracleError::Malformed(format!("validity verdict not JSON ({err}): {content}"))
        })?;
        let ids = |field: &str| {
            value
                .get(field)
                .and_then(|v| v.as_array())
                .map(|items| {
                    items
                        .iter()
                        .filter_map(|item| item.as_str())
                        .map(ToString::to_string)
                        .collect()
                })
                .unwrap_or_default()
        };
        Ok(ValidityVerdict {
            kept_ids: ids("kept_ids"),
            invalidated_ids: ids("invalidated_ids"),
        })
    }

    async fn check_objective_completion(
        &self,
        objective: &LearningObjective,
        beliefs: &[Belief],
    ) -> OracleResult<f64> {
        let held = beliefs
            .iter()
            .map(Belief::content_text)
            .collect::<Vec<_>>()
            .join("\n");
        let content = self
            .complete(
                "Estimate how complete the learning objective is given the beliefs \
                 gathered so far. Reply with a single number from 0 to 100.",
                &format!(
                    "Objective: {}\nTopics: {}\n\nBeliefs:\n{held}",
                    objective.description,
                    objective.topics.join(", ")
                ),
            )
            .await?;
        parse_percentage(&content)
    }

    async fn generate_analysis(
        &self,
        strategy: &str,
        belief_system: &BeliefSystem,
        interactions: &[DialecticalInteraction],
        event: &InteractionEvent,
    ) -> OracleResult<String> {
        self.complete(
            "Write a short analysis of how the latest exchange moved the belief system.",
            &format!(
                "Strategy: {strategy}\nBeliefs:\n{}\nTurns so far: {}\nLatest — Q: {} A: {}",
                belief_system.belief_summary(),
                interactions.len(),
                event.question,
                event.answer
            ),
        )
        .await
    }

    async fn is_answer_to_question(&self, question: &str, answer: &str) -> OracleResult<bool> {
        let content = self
            .complete(
                "Does the answer actually address the question? Reply with yes or no.",
                &format!("Q: {question}\nA: {answer}"),
            )
            .await?;
        Ok(content.to_lowercase().starts_with("yes"))
    }

    async fn summarize_belief_system(&self, belief_texts: &[String]) -> OracleResult<String> {
        self.complete(
            "Summarize this belief system in two or three sentences.",
            &belief_texts.join("\n"),
        )
        .await
    }

    async fn generate_perspective(
        &self,
        belief_summary: &str,
        event: &InteractionEvent,
    ) -> OracleResult<String> {
        let result = self
            .complete(
                "Given this belief system, write how its holder would respond to the exchange.",
                &format!(
                    "Belief system: {belief_summary}\nQ: {}\nA: {}",
                    event.question, event.answer
                ),
            )
            .await;
        if let Err(err) = &result {
            warn!(error = %err, "perspective generation failed");
        }
        result
    }
}
