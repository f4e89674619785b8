//! Belief CRUD and belief-system assembly.
//!
//! All history stays in the store: updates bump the version, deletes
//! tombstone. Listings only surface the latest active version of each belief.

use std::sync::Arc;

use noesis_kv::{KvStore, StoreError, StoredValue};
use noesis_model::{Belief, BeliefSystem, BeliefType, EpistemicContext, Error, Result, ids};
use tracing::{debug, info};

/// Well-known key holding the materialized belief system of a namespace.
pub const BELIEF_SYSTEM_KEY: &str = "BeliefSystem";

#[derive(Clone)]
pub struct BeliefService {
    kv: Arc<KvStore>,
}

impl BeliefService {
    pub fn new(kv: Arc<KvStore>) -> Self {
        Self { kv }
    }

    /// Create a version-1 belief. The namespace's belief system is lazily
    /// initialized first so a fresh self-model is immediately coherent.
    pub fn create_belief(
        &self,
        self_model_id: &str,
        content: &str,
        belief_type: BeliefType,
        dry_run: bool,
    ) -> Result<Belief> {
        if content.trim().is_empty() {
            return Err(Error::InvalidValue("belief content must not be empty".into()));
        }

        let belief = Belief::new(
            ids::new_belief_id(),
            self_model_id.to_string(),
            content.to_string(),
            belief_type,
        );
        if !dry_run {
            self.ensure_belief_system(self_model_id)?;
            self.kv.store(
                self_model_id,
                &belief.id,
                StoredValue::Belief(belief.clone()),
                belief.version,
            )?;
        }
        info!(self_model_id, belief_id = %belief.id, dry_run, "belief created");
        Ok(belief)
    }

    /// Replace a belief's content at `current_version`. Fails with
    /// `InvariantViolation` when the stored version has moved on.
    pub fn update_belief(
        &self,
        self_model_id: &str,
        belief_id: &str,
        current_version: i64,
        content: &str,
        belief_type: BeliefType,
        dry_run: bool,
    ) -> Result<Belief> {
        let existing = self.fetch_belief(self_model_id, belief_id)?;
        if existing.version != current_version {
            return Err(Error::invariant(format!(
                "belief `{belief_id}` is at version {}, caller expected {current_version}",
                existing.version
            )));
        }

        let mut updated = existing;
        updated.version += 1;
        updated.content = vec![content.to_string()];
        updated.belief_type = belief_type;
        if !dry_run {
            self.kv.store(
                self_model_id,
                belief_id,
                StoredValue::Belief(updated.clone()),
                updated.version,
            )?;
        }
        info!(self_model_id, belief_id, version = updated.version, dry_run, "belief updated");
        Ok(updated)
    }

    /// Tombstone a belief: `active = false`, version bumped. Storage history
    /// is never removed.
    pub fn delete_belief(
        &self,
        self_model_id: &str,
        belief_id: &str,
        dry_run: bool,
    ) -> Result<Belief> {
        let mut belief = self.fetch_belief(self_model_id, belief_id)?;
        belief.active = false;
        belief.version += 1;
        if !dry_run {
            self.kv.store(
                self_model_id,
                belief_id,
                StoredValue::Belief(belief.clone()),
                belief.version,
            )?;
        }
        info!(self_model_id, belief_id, version = belief.version, dry_run, "belief tombstoned");
        Ok(belief)
    }

    /// Latest active version of every belief in the namespace, optionally
    /// filtered by ID. Tombstones are excluded; an unknown namespace yields
    /// an empty list rather than an error.
    pub fn list_beliefs(
        &self,
        self_model_id: &str,
        belief_ids: Option<&[String]>,
    ) -> Result<Vec<Belief>> {
        let values = match self.kv.list_by_type(self_model_id, "Belief") {
            Ok(values) => values,
            Err(StoreError::NotFound { .. }) => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };
        Ok(values
            .into_iter()
            .filter_map(StoredValue::into_belief)
            .filter(|b| b.active)
            .filter(|b| match belief_ids {
                Some(wanted) => wanted.iter().any(|id| id == &b.id),
                None => true,
            })
            .collect())
    }

    /// Every stored version of one belief, ascending.
    pub fn belief_history(&self, self_model_id: &str, belief_id: &str) -> Result<Vec<Belief>> {
        let versions = self
            .kv
            .retrieve_all_versions(self_model_id, belief_id)
            .map_err(Error::from)?;
        Ok(versions
            .into_iter()
            .filter_map(StoredValue::into_belief)
            .collect())
    }

    /// The materialized belief system: currently active beliefs plus the
    /// stored predictive-processing contexts. A namespace that has never been
    /// written gets an empty system with one empty PPC, which is persisted so
    /// later reads are stable.
    pub fn get_belief_system(&self, self_model_id: &str) -> Result<BeliefSystem> {
        let beliefs = self.list_beliefs(self_model_id, None)?;
        let epistemic_contexts = match self.kv.retrieve(self_model_id, BELIEF_SYSTEM_KEY) {
            Ok(value) => value
                .into_belief_system()
                .map(|bs| bs.epistemic_contexts)
                .unwrap_or_else(|| vec![EpistemicContext::default()]),
            Err(StoreError::NotFound { .. }) => {
                debug!(self_model_id, "lazily creating belief system");
                let fresh = BeliefSystem::empty();
                self.kv.store(
                    self_model_id,
                    BELIEF_SYSTEM_KEY,
                    StoredValue::BeliefSystem(fresh.clone()),
                    1,
                )?;
                fresh.epistemic_contexts
            }
            Err(err) => return Err(err.into()),
        };
        Ok(BeliefSystem {
            beliefs,
            epistemic_contexts,
        })
    }

    /// Persist a belief system under the well-known key at the next version.
    pub fn store_belief_system(&self, self_model_id: &str, belief_system: &BeliefSystem) -> Result<()> {
        let next = self
            .kv
            .latest_version(self_model_id, BELIEF_SYSTEM_KEY)
            .map_err(Error::from)?
            .unwrap_or(0)
            + 1;
        self.kv.store(
            self_model_id,
            BELIEF_SYSTEM_KEY,
            StoredValue::BeliefSystem(belief_system.clone()),
            next,
        )?;
        Ok(())
    }

    fn ensure_belief_system(&self, self_model_id: &str) -> Result<()> {
        match self.kv.retrieve(self_model_id, BELIEF_SYSTEM_KEY) {
            Ok(_) => Ok(()),
            Err(StoreError::NotFound { .. }) => {
                debug!(self_model_id, "lazily creating belief system");
                self.kv.store(
                    self_model_id,
                    BELIEF_SYSTEM_KEY,
                    StoredValue::BeliefSystem(BeliefSystem::empty()),
                    1,
                )?;
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }

    fn fetch_belief(&self, self_model_id: &str, belief_id: &str) -> Result<Belief> {
        self.kv
            .retrieve(self_model_id, belief_id)
            .map_err(Error::from)?
            .into_belief()
            .ok_or_else(|| Error::InvalidValue(format!("`{belief_id}` does not hold a belief")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> BeliefService {
        BeliefService::new(Arc::new(KvStore::in_memory()))
    }

    #[test]
    fn create_then_list_returns_the_belief() {
        let svc = service();
        let created = svc
            .create_belief("sm1", "Quality sleep improves energy", BeliefType::Statement, false)
            .unwrap();
        assert!(created.id.starts_with("bi_"));
        assert_eq!(created.version, 1);
        assert!(created.active);

        let listed = svc.list_beliefs("sm1", None).unwrap();
        assert_eq!(listed, vec![created]);
    }

    #[test]
    fn create_lazily_initializes_the_belief_system() {
        let svc = service();
        svc.create_belief("sm1", "first belief", BeliefType::Statement, false)
            .unwrap();
        let bs = svc.get_belief_system("sm1").unwrap();
        assert_eq!(bs.beliefs.len(), 1);
        assert_eq!(bs.epistemic_contexts.len(), 1);
    }

    #[test]
    fn versioned_update_conflicts_on_stale_version() {
        let svc = service();
        let created = svc
            .create_belief("sm1", "original", BeliefType::Statement, false)
            .unwrap();

        let updated = svc
            .update_belief("sm1", &created.id, 1, "revised", BeliefType::Clarification, false)
            .unwrap();
        assert_eq!(updated.version, 2);
        assert_eq!(updated.content_text(), "revised");

        let err = svc
            .update_belief("sm1", &created.id, 1, "too late", BeliefType::Clarification, false)
            .unwrap_err();
        assert!(matches!(err, Error::InvariantViolation(_)));

        let history = svc.belief_history("sm1", &created.id).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].content_text(), "original");
        assert_eq!(history[1].content_text(), "revised");
    }

    #[test]
    fn delete_tombstones_and_hides_from_listing() {
        let svc = service();
        let created = svc
            .create_belief("sm1", "to be removed", BeliefType::Statement, false)
            .unwrap();
        let tombstone = svc.delete_belief("sm1", &created.id, false).unwrap();
        assert!(!tombstone.active);
        assert_eq!(tombstone.version, 2);

        assert!(svc.list_beliefs("sm1", None).unwrap().is_empty());
        // History is intact.
        assert_eq!(svc.belief_history("sm1", &created.id).unwrap().len(), 2);
    }

    #[test]
    fn list_filters_by_requested_ids() {
        let svc = service();
        let a = svc.create_belief("sm1", "a", BeliefType::Statement, false).unwrap();
        svc.create_belief("sm1", "b", BeliefType::Statement, false).unwrap();

        let filter = vec![a.id.clone()];
        let listed = svc.list_beliefs("sm1", Some(&filter)).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, a.id);
    }

    #[test]
    fn empty_content_is_rejected() {
        let svc = service();
        let err = svc
            .create_belief("sm1", "   ", BeliefType::Statement, false)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidValue(_)));
    }

    #[test]
    fn dry_run_creates_nothing() {
        let svc = service();
        let belief = svc
            .create_belief("sm1", "ephemeral", BeliefType::Statement, true)
            .unwrap();
        assert!(belief.id.starts_with("bi_"));
        assert!(svc.list_beliefs("sm1", None).unwrap().is_empty());
    }

    #[test]
    fn unwritten_self_model_gets_empty_belief_system() {
        let svc = service();
        let bs = svc.get_belief_system("never-seen").unwrap();
        assert!(bs.beliefs.is_empty());
        assert_eq!(bs.epistemic_contexts.len(), 1);
    }
}
