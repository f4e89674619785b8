//! The outermost library layer: wires config, store, oracle, and services
//! together and exposes the operations an RPC handler would call.

mod telemetry;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use noesis_beliefs::{BeliefService, BeliefSystemMetrics, ppc};
use noesis_config::AppConfig;
use noesis_dialectic::{DialecticService, UpdateDialecticInput};
use noesis_kv::{KvStore, StoredValue};
use noesis_model::{
    Belief, BeliefSystem, BeliefType, Developer, Dialectic, DialecticType, Error,
    InteractionEvent, LearningObjective, ObservationContext, Philosophy, Result, SelfModel, ids,
};
use noesis_oracle::{HttpOracle, Oracle};
use noesis_selfmodel::SelfModelService;
use serde::Serialize;
use tracing::info;

pub use telemetry::init_tracing;

/// Filler for a question the answer blob did not address.
const NO_ANSWER: &str = "No answer provided";

/// Key under which a developer record lives in its own namespace.
const DEVELOPER_KEY: &str = "developer";

/// A belief system plus its optional derived annotations.
#[derive(Debug, Clone, Serialize)]
pub struct BeliefSystemView {
    pub belief_system: BeliefSystem,
    pub metrics: Option<BeliefSystemMetrics>,
    /// Oracle-derived summary; requested, never stored.
    pub summary: Option<String>,
}

pub struct Runtime {
    pub config: AppConfig,
    kv: Arc<KvStore>,
    oracle: Arc<dyn Oracle>,
    beliefs: BeliefService,
    dialectics: DialecticService,
    self_models: SelfModelService,
}

impl Runtime {
    /// Build the full stack from config: snapshot-backed store when a path is
    /// configured, in-memory otherwise.
    pub fn new(config: AppConfig, oracle: Arc<dyn Oracle>) -> Result<Self> {
        let kv = match &config.store.snapshot_path {
            Some(path) => Arc::new(KvStore::with_snapshot(path).map_err(Error::from)?),
            None => Arc::new(KvStore::in_memory()),
        };
        Ok(Self::with_store(config, oracle, kv))
    }

    /// Build against a caller-supplied store (shared across runtimes in
    /// tests and embeddings).
    pub fn with_store(config: AppConfig, oracle: Arc<dyn Oracle>, kv: Arc<KvStore>) -> Self {
        let beliefs = BeliefService::new(kv.clone());
        let dialectics = DialecticService::new(
            kv.clone(),
            oracle.clone(),
            beliefs.clone(),
            &config.dialectic,
        );
        let self_models = SelfModelService::new(kv.clone());
        Self {
            config,
            kv,
            oracle,
            beliefs,
            dialectics,
            self_models,
        }
    }

    /// Build with the HTTP oracle described by the config. Reads the provider
    /// key from the environment variable the config names.
    pub fn from_config(config: AppConfig) -> Result<Self> {
        let api_key = std::env::var(&config.oracle.api_key_env).ok();
        let oracle = HttpOracle::new(
            config.oracle.base_url.clone(),
            config.oracle.model.clone(),
            api_key,
            Duration::from_secs(config.oracle.timeout_secs),
        )
        .map_err(|e| e.into_model("oracle construction"))?;
        Self::new(config, Arc::new(oracle))
    }

    pub fn kv(&self) -> &Arc<KvStore> {
        &self.kv
    }

    pub fn beliefs(&self) -> &BeliefService {
        &self.beliefs
    }

    pub fn dialectics(&self) -> &DialecticService {
        &self.dialectics
    }

    pub fn self_models(&self) -> &SelfModelService {
        &self.self_models
    }

    // ── Authentication ─────────────────────────────────────────────────────

    /// Resolve an API key to its developer. Unknown or malformed keys are
    /// rejected before any other work happens.
    pub fn authenticate(&self, api_key: &str) -> Result<Developer> {
        if api_key.trim().is_empty() {
            return Err(Error::Unauthenticated("empty api key".into()));
        }
        let developers = self.kv.list_all_by_type("Developer").map_err(Error::from)?;
        developers
            .into_iter()
            .filter_map(StoredValue::into_developer)
            .find(|dev| dev.api_keys.iter().any(|key| key == api_key))
            .ok_or_else(|| Error::Unauthenticated("unknown api key".into()))
    }

    /// Seed a developer record. Full developer CRUD lives outside this core;
    /// this exists so embeddings and tests can provision keys.
    pub fn register_developer(&self, name: &str, api_keys: Vec<String>) -> Result<Developer> {
        let developer = Developer::new(ids::new_developer_id(), name, api_keys);
        self.kv.store(
            &developer.id,
            DEVELOPER_KEY,
            StoredValue::Developer(developer.clone()),
            1,
        )?;
        info!(developer_id = %developer.id, "developer registered");
        Ok(developer)
    }

    // ── Deadlines ──────────────────────────────────────────────────────────

    /// Run `operation` under an optional deadline. Expiry surfaces as
    /// `DeadlineExceeded`; because every operation defers its final aggregate
    /// store to the end, a timed-out call leaves state unchanged or
    /// monotonically extended.
    pub async fn with_deadline<T, F>(&self, deadline: Option<Duration>, operation: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match deadline {
            None => operation.await,
            Some(limit) => tokio::time::timeout(limit, operation)
                .await
                .map_err(|_| Error::DeadlineExceeded(limit))?,
        }
    }

    // ── Beliefs ────────────────────────────────────────────────────────────

    pub fn create_belief(
        &self,
        self_model_id: &str,
        content: &str,
        belief_type: BeliefType,
    ) -> Result<(Belief, BeliefSystem)> {
        let belief = self
            .beliefs
            .create_belief(self_model_id, content, belief_type, false)?;
        let belief_system = self.beliefs.get_belief_system(self_model_id)?;
        Ok((belief, belief_system))
    }

    pub fn list_beliefs(
        &self,
        self_model_id: &str,
        belief_ids: Option<&[String]>,
    ) -> Result<(Vec<Belief>, BeliefSystem)> {
        let beliefs = self.beliefs.list_beliefs(self_model_id, belief_ids)?;
        let belief_system = self.beliefs.get_belief_system(self_model_id)?;
        Ok((beliefs, belief_system))
    }

    pub async fn get_belief_system(
        &self,
        self_model_id: &str,
        include_metrics: bool,
        conceptualize: bool,
    ) -> Result<BeliefSystemView> {
        let belief_system = self.beliefs.get_belief_system(self_model_id)?;
        let metrics = include_metrics.then(|| ppc::metrics(&belief_system));
        let summary = if conceptualize {
            let texts: Vec<String> = belief_system
                .active_beliefs()
                .map(Belief::content_text)
                .collect();
            Some(
                self.oracle
                    .summarize_belief_system(&texts)
                    .await
                    .map_err(|e| e.into_model("summarize_belief_system"))?,
            )
        } else {
            None
        };
        Ok(BeliefSystemView {
            belief_system,
            metrics,
            summary,
        })
    }

    // ── Dialectics ─────────────────────────────────────────────────────────

    pub async fn create_dialectic(
        &self,
        self_model_id: &str,
        dialectic_type: DialecticType,
        learning_objective: Option<LearningObjective>,
        perspective_model_ids: Vec<String>,
    ) -> Result<Dialectic> {
        self.dialectics
            .create_dialectic(self_model_id, dialectic_type, learning_objective, perspective_model_ids)
            .await
    }

    pub fn list_dialectics(&self, self_model_id: &str) -> Result<Vec<Dialectic>> {
        self.dialectics.list_dialectics(self_model_id)
    }

    pub async fn update_dialectic(&self, input: UpdateDialecticInput) -> Result<Dialectic> {
        self.dialectics.update_dialectic(input).await
    }

    // ── Self-models & philosophies ─────────────────────────────────────────

    pub fn create_self_model(&self, id: &str, philosophy_ids: Vec<String>) -> Result<SelfModel> {
        self.self_models.create_self_model(id, philosophy_ids)
    }

    pub fn get_self_model(&self, id: &str) -> Result<(SelfModel, Vec<Dialectic>)> {
        self.self_models.get_self_model(id)
    }

    pub fn add_philosophy(&self, self_model_id: &str, philosophy_id: &str) -> Result<SelfModel> {
        self.self_models.add_philosophy(self_model_id, philosophy_id)
    }

    pub fn create_philosophy(
        &self,
        description: &str,
        extrapolate_contexts: bool,
    ) -> Result<(Philosophy, Vec<ObservationContext>)> {
        self.self_models.create_philosophy(description, extrapolate_contexts)
    }

    pub fn update_philosophy(
        &self,
        philosophy_id: &str,
        description: &str,
        extrapolate_contexts: bool,
    ) -> Result<(Philosophy, Vec<ObservationContext>)> {
        self.self_models
            .update_philosophy(philosophy_id, description, extrapolate_contexts)
    }

    // ── Q&A preprocessing ──────────────────────────────────────────────────

    /// Pair questions found in the question blobs with answers matched from
    /// the answer blobs. Unanswered questions get the literal
    /// "No answer provided"; surplus answers are discarded.
    pub async fn preprocess_question_answer(
        &self,
        question_blobs: &[String],
        answer_blobs: &[String],
    ) -> Result<Vec<InteractionEvent>> {
        let mut questions = Vec::new();
        for blob in question_blobs {
            let extracted = self
                .oracle
                .extract_questions_from_text(blob)
                .await
                .map_err(|e| e.into_model("extract_questions_from_text"))?;
            questions.extend(extracted.into_iter().filter(|q| !q.trim().is_empty()));
        }
        if questions.is_empty() {
            return Ok(Vec::new());
        }

        // First non-empty match per position wins across blobs.
        let mut merged: Vec<String> = vec![String::new(); questions.len()];
        for blob in answer_blobs {
            let matched = self
                .oracle
                .match_answers_to_questions(blob, &questions)
                .await
                .map_err(|e| e.into_model("match_answers_to_questions"))?;
            for (slot, answer) in merged.iter_mut().zip(matched) {
                if slot.is_empty() && !answer.trim().is_empty() {
                    *slot = answer;
                }
            }
        }

        Ok(questions
            .into_iter()
            .zip(merged)
            .map(|(question, answer)| InteractionEvent {
                question,
                answer: if answer.is_empty() {
                    NO_ANSWER.to_string()
                } else {
                    answer
                },
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use noesis_oracle::ScriptedOracle;

    use super::*;

    fn runtime() -> (Arc<ScriptedOracle>, Runtime) {
        let oracle = Arc::new(ScriptedOracle::new());
        let runtime = Runtime::with_store(
            AppConfig::default(),
            oracle.clone(),
            Arc::new(KvStore::in_memory()),
        );
        (oracle, runtime)
    }

    #[tokio::test]
    async fn create_belief_returns_belief_and_system() {
        let (_oracle, rt) = runtime();
        let (belief, system) = rt
            .create_belief("sm1", "Quality sleep improves energy", BeliefType::Statement)
            .unwrap();
        assert!(belief.id.starts_with("bi_"));
        assert_eq!(belief.version, 1);
        assert!(belief.active);
        assert_eq!(system.beliefs, vec![belief]);
    }

    #[tokio::test]
    async fn belief_system_view_carries_requested_annotations() {
        let (_oracle, rt) = runtime();
        rt.create_belief("sm1", "Rest is productive", BeliefType::Statement)
            .unwrap();

        let plain = rt.get_belief_system("sm1", false, false).await.unwrap();
        assert!(plain.metrics.is_none());
        assert!(plain.summary.is_none());

        let annotated = rt.get_belief_system("sm1", true, true).await.unwrap();
        assert_eq!(annotated.metrics.unwrap().total_beliefs, 1);
        assert_eq!(annotated.summary.as_deref(), Some("Rest is productive"));
    }

    #[tokio::test]
    async fn authentication_resolves_registered_keys_only() {
        let (_oracle, rt) = runtime();
        let developer = rt
            .register_developer("ada", vec!["key-123".to_string()])
            .unwrap();
        assert!(developer.id.starts_with("dev_"));

        let resolved = rt.authenticate("key-123").unwrap();
        assert_eq!(resolved.id, developer.id);

        assert!(matches!(rt.authenticate(""), Err(Error::Unauthenticated(_))));
        assert!(matches!(
            rt.authenticate("key-999"),
            Err(Error::Unauthenticated(_))
        ));
    }

    #[tokio::test]
    async fn preprocess_pads_missing_answers_and_drops_surplus() {
        let (oracle, rt) = runtime();
        oracle.script_matched_answers(vec![
            "eight hours".to_string(),
            String::new(),
        ]);

        let pairs = rt
            .preprocess_question_answer(
                &["How do you sleep?\nHow do you eat?".to_string()],
                &["eight hours\n\nsurplus answer\n\nanother surplus".to_string()],
            )
            .await
            .unwrap();

        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].answer, "eight hours");
        assert_eq!(pairs[1].answer, NO_ANSWER);
    }

    #[tokio::test]
    async fn preprocess_without_questions_is_empty() {
        let (_oracle, rt) = runtime();
        let pairs = rt
            .preprocess_question_answer(&["no questions here".to_string()], &[])
            .await
            .unwrap();
        assert!(pairs.is_empty());
    }

    #[tokio::test]
    async fn deadline_expiry_maps_to_deadline_exceeded() {
        let (_oracle, rt) = runtime();
        let limit = Duration::from_millis(10);
        let err = rt
            .with_deadline(Some(limit), async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DeadlineExceeded(d) if d == limit));
    }

    #[tokio::test]
    async fn full_turn_through_the_facade() {
        let (_oracle, rt) = runtime();
        rt.create_self_model("sm1", vec![]).unwrap();
        let dialectic = rt
            .create_dialectic("sm1", DialecticType::Default, None, Vec::new())
            .await
            .unwrap();

        let updated = rt
            .update_dialectic(UpdateDialecticInput {
                dialectic_id: dialectic.id.clone(),
                self_model_id: "sm1".into(),
                answer: Some("I sleep 8 hours".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(updated.user_interactions.len(), 2);

        // The self-model's dialectic index sees it.
        let (_, dialectics) = rt.get_self_model("sm1").unwrap();
        assert_eq!(dialectics.len(), 1);
        assert_eq!(dialectics[0].user_interactions.len(), 2);
    }

    #[tokio::test]
    async fn snapshot_survives_a_runtime_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let mut config = AppConfig::default();
        config.store.snapshot_path = Some(path.to_string_lossy().into_owned());

        let oracle = Arc::new(ScriptedOracle::new());
        let rt = Runtime::new(config.clone(), oracle.clone()).unwrap();
        rt.create_belief("sm1", "persisted belief", BeliefType::Statement)
            .unwrap();
        rt.create_belief("sm2", "another model's belief", BeliefType::Statement)
            .unwrap();

        let reopened = Runtime::new(config, oracle).unwrap();
        let (beliefs, _) = reopened.list_beliefs("sm1", None).unwrap();
        assert_eq!(beliefs.len(), 1);
        assert_eq!(beliefs[0].content_text(), "persisted belief");
        let (beliefs, _) = reopened.list_beliefs("sm2", None).unwrap();
        assert_eq!(beliefs.len(), 1);
    }
}
