//! Self-model and philosophy ownership.
//!
//! A self-model's ID is its KV namespace; dialectics are indexed per model at
//! read time rather than stored inline. Philosophy extrapolations are cached
//! per philosophy ID so repeated reads return stable context IDs within a
//! process run.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use noesis_kv::{KvStore, StoreError, StoredValue};
use noesis_model::{Dialectic, Error, ObservationContext, Philosophy, Result, SelfModel, ids};
use tracing::{debug, info};

use crate::extrapolate::extrapolate_observation_contexts;

pub const SELF_MODEL_KEY: &str = "SelfModel";
pub const PHILOSOPHY_KEY: &str = "Philosophy";

pub struct SelfModelService {
    kv: Arc<KvStore>,
    /// Philosophy ID → extrapolated contexts. Read-mostly; invalidated on
    /// philosophy update.
    extrapolations: RwLock<HashMap<String, Vec<ObservationContext>>>,
}

impl SelfModelService {
    pub fn new(kv: Arc<KvStore>) -> Self {
        Self {
            kv,
            extrapolations: RwLock::new(HashMap::new()),
        }
    }

    /// Register a self-model under a caller-chosen ID. The ID doubles as the
    /// KV namespace for everything the model owns.
    pub fn create_self_model(&self, id: &str, philosophy_ids: Vec<String>) -> Result<SelfModel> {
        if id.trim().is_empty() {
            return Err(Error::InvalidValue("self-model id must not be empty".into()));
        }
        if self.kv.retrieve(id, SELF_MODEL_KEY).is_ok() {
            return Err(Error::invariant(format!("self model `{id}` already exists")));
        }

        let model = SelfModel {
            id: id.to_string(),
            philosophy_ids,
        };
        self.kv
            .store(id, SELF_MODEL_KEY, StoredValue::SelfModel(model.clone()), 1)?;
        info!(self_model_id = id, "self model created");
        Ok(model)
    }

    /// The self-model plus its derived dialectic index.
    pub fn get_self_model(&self, id: &str) -> Result<(SelfModel, Vec<Dialectic>)> {
        let model = match self.kv.retrieve(id, SELF_MODEL_KEY) {
            Ok(value) => value
                .into_self_model()
                .ok_or_else(|| Error::InvalidValue(format!("`{id}` does not hold a self model")))?,
            Err(StoreError::NotFound { .. }) => return Err(Error::not_found("self model", id)),
            Err(err) => return Err(err.into()),
        };

        let dialectics = match self.kv.list_by_type(id, "Dialectic") {
            Ok(values) => values.into_iter().filter_map(StoredValue::into_dialectic).collect(),
            Err(StoreError::NotFound { .. }) => Vec::new(),
            Err(err) => return Err(err.into()),
        };
        Ok((model, dialectics))
    }

    /// Attach an existing philosophy to a self-model.
    pub fn add_philosophy(&self, self_model_id: &str, philosophy_id: &str) -> Result<SelfModel> {
        // The philosophy must exist before it can be referenced.
        self.get_philosophy(philosophy_id)?;

        let (mut model, _) = self.get_self_model(self_model_id)?;
        if !model.philosophy_ids.iter().any(|id| id == philosophy_id) {
            model.philosophy_ids.push(philosophy_id.to_string());
            let next = self
                .kv
                .latest_version(self_model_id, SELF_MODEL_KEY)
                .map_err(Error::from)?
                .unwrap_or(0)
                + 1;
            self.kv.store(
                self_model_id,
                SELF_MODEL_KEY,
                StoredValue::SelfModel(model.clone()),
                next,
            )?;
            info!(self_model_id, philosophy_id, "philosophy attached");
        }
        Ok(model)
    }

    pub fn create_philosophy(
        &self,
        description: &str,
        extrapolate_contexts: bool,
    ) -> Result<(Philosophy, Vec<ObservationContext>)> {
        let philosophy = Philosophy {
            id: ids::new_philosophy_id(),
            description: description.to_string(),
            extrapolate_contexts,
        };
        self.kv.store(
            &philosophy.id,
            PHILOSOPHY_KEY,
            StoredValue::Philosophy(philosophy.clone()),
            1,
        )?;
        info!(philosophy_id = %philosophy.id, extrapolate_contexts, "philosophy created");

        let contexts = if extrapolate_contexts {
            self.cached_extrapolation(&philosophy.id, description)
        } else {
            Vec::new()
        };
        Ok((philosophy, contexts))
    }

    /// Replace a philosophy's description. The extrapolation cache entry is
    /// invalidated so the next read reflects the new markers.
    pub fn update_philosophy(
        &self,
        philosophy_id: &str,
        description: &str,
        extrapolate_contexts: bool,
    ) -> Result<(Philosophy, Vec<ObservationContext>)> {
        let mut philosophy = self.get_philosophy(philosophy_id)?;
        philosophy.description = description.to_string();
        philosophy.extrapolate_contexts = extrapolate_contexts;

        let next = self
            .kv
            .latest_version(philosophy_id, PHILOSOPHY_KEY)
            .map_err(Error::from)?
            .unwrap_or(0)
            + 1;
        self.kv.store(
            philosophy_id,
            PHILOSOPHY_KEY,
            StoredValue::Philosophy(philosophy.clone()),
            next,
        )?;

        self.extrapolations
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(philosophy_id);
        debug!(philosophy_id, "extrapolation cache invalidated");

        let contexts = if extrapolate_contexts {
            self.cached_extrapolation(philosophy_id, description)
        } else {
            Vec::new()
        };
        Ok((philosophy, contexts))
    }

    pub fn get_philosophy(&self, philosophy_id: &str) -> Result<Philosophy> {
        match self.kv.retrieve(philosophy_id, PHILOSOPHY_KEY) {
            Ok(value) => value.into_philosophy().ok_or_else(|| {
                Error::InvalidValue(format!("`{philosophy_id}` does not hold a philosophy"))
            }),
            Err(StoreError::NotFound { .. }) => Err(Error::not_found("philosophy", philosophy_id)),
            Err(err) => Err(err.into()),
        }
    }

    /// Extrapolated contexts for a philosophy, stable per ID within this
    /// process. Computed once, then served from the cache until invalidated.
    pub fn extrapolated_contexts(&self, philosophy_id: &str) -> Result<Vec<ObservationContext>> {
        let philosophy = self.get_philosophy(philosophy_id)?;
        if !philosophy.extrapolate_contexts {
            return Ok(Vec::new());
        }
        Ok(self.cached_extrapolation(philosophy_id, &philosophy.description))
    }

    fn cached_extrapolation(
        &self,
        philosophy_id: &str,
        description: &str,
    ) -> Vec<ObservationContext> {
        {
            let cache = self
                .extrapolations
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            if let Some(contexts) = cache.get(philosophy_id) {
                return contexts.clone();
            }
        }

        let contexts = extrapolate_observation_contexts(description);
        self.extrapolations
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(philosophy_id.to_string(), contexts.clone());
        contexts
    }
}

#[cfg(test)]
mod tests {
    use noesis_model::{Agent, DialecticalInteraction};

    use super::*;

    fn service() -> SelfModelService {
        SelfModelService::new(Arc::new(KvStore::in_memory()))
    }

    #[test]
    fn create_then_get_roundtrips() {
        let svc = service();
        let created = svc.create_self_model("sm1", vec![]).unwrap();
        let (fetched, dialectics) = svc.get_self_model("sm1").unwrap();
        assert_eq!(fetched, created);
        assert!(dialectics.is_empty());
    }

    #[test]
    fn duplicate_create_is_an_invariant_violation() {
        let svc = service();
        svc.create_self_model("sm1", vec![]).unwrap();
        let err = svc.create_self_model("sm1", vec![]).unwrap_err();
        assert!(matches!(err, Error::InvariantViolation(_)));
    }

    #[test]
    fn get_indexes_dialectics_in_the_namespace() {
        let svc = service();
        svc.create_self_model("sm1", vec![]).unwrap();
        let dialectic = Dialectic {
            id: "di_1".into(),
            self_model_id: "sm1".into(),
            agent: Agent::default(),
            user_interactions: vec![DialecticalInteraction::pending("din_1".into(), "Q")],
            learning_objective: None,
            perspective_model_ids: Vec::new(),
            analysis: None,
        };
        svc.kv
            .store("sm1", "di_1", StoredValue::Dialectic(dialectic), 1)
            .unwrap();

        let (_, dialectics) = svc.get_self_model("sm1").unwrap();
        assert_eq!(dialectics.len(), 1);
        assert_eq!(dialectics[0].id, "di_1");
    }

    #[test]
    fn add_philosophy_requires_an_existing_one() {
        let svc = service();
        svc.create_self_model("sm1", vec![]).unwrap();
        let err = svc.add_philosophy("sm1", "ph_ghost").unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));

        let (philosophy, _) = svc.create_philosophy("live deliberately", false).unwrap();
        let model = svc.add_philosophy("sm1", &philosophy.id).unwrap();
        assert_eq!(model.philosophy_ids, vec![philosophy.id.clone()]);

        // Attaching again is idempotent.
        let model = svc.add_philosophy("sm1", &philosophy.id).unwrap();
        assert_eq!(model.philosophy_ids.len(), 1);
    }

    #[test]
    fn extrapolation_is_cached_and_stable() {
        let svc = service();
        let (philosophy, first) = svc
            .create_philosophy("[[C: Sleep]] and [[S: Deep Sleep]]", true)
            .unwrap();
        assert_eq!(first.len(), 2);

        let second = svc.extrapolated_contexts(&philosophy.id).unwrap();
        // Same IDs, not merely same names: the cache stabilizes them.
        let ids = |cs: &[ObservationContext]| cs.iter().map(|c| c.id.clone()).collect::<Vec<_>>();
        assert_eq!(ids(&first), ids(&second));
    }

    #[test]
    fn update_invalidates_the_cache() {
        let svc = service();
        let (philosophy, first) = svc.create_philosophy("[[C: Sleep]]", true).unwrap();
        assert_eq!(first[0].name, "Sleep");

        let (_, updated) = svc
            .update_philosophy(&philosophy.id, "[[C: Diet]]", true)
            .unwrap();
        assert_eq!(updated.len(), 1);
        assert_eq!(updated[0].name, "Diet");

        let cached = svc.extrapolated_contexts(&philosophy.id).unwrap();
        assert_eq!(cached[0].id, updated[0].id);
    }

    #[test]
    fn extrapolation_disabled_yields_nothing() {
        let svc = service();
        let (philosophy, contexts) = svc.create_philosophy("[[C: Sleep]]", false).unwrap();
        assert!(contexts.is_empty());
        assert!(svc.extrapolated_contexts(&philosophy.id).unwrap().is_empty());
    }

    #[test]
    fn missing_self_model_is_not_found() {
        let svc = service();
        let err = svc.get_self_model("sm_ghost").unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }
}
