//! Opaque prefixed identifiers.
//!
//! Every entity ID is a type prefix plus a random suffix (`bi_`, `di_`, ...).
//! IDs are never reused; the suffix alone provides global uniqueness.

use uuid::Uuid;

pub const BELIEF_PREFIX: &str = "bi";
pub const DIALECTIC_PREFIX: &str = "di";
pub const INTERACTION_PREFIX: &str = "din";
pub const OBSERVATION_CONTEXT_PREFIX: &str = "oc";
pub const PHILOSOPHY_PREFIX: &str = "ph";
pub const SELF_MODEL_PREFIX: &str = "sm";
pub const DEVELOPER_PREFIX: &str = "dev";

fn prefixed(prefix: &str) -> String {
    format!("{prefix}_{}", Uuid::new_v4().simple())
}

pub fn new_belief_id() -> String {
    prefixed(BELIEF_PREFIX)
}

pub fn new_dialectic_id() -> String {
    prefixed(DIALECTIC_PREFIX)
}

pub fn new_interaction_id() -> String {
    prefixed(INTERACTION_PREFIX)
}

pub fn new_observation_context_id() -> String {
    prefixed(OBSERVATION_CONTEXT_PREFIX)
}

pub fn new_philosophy_id() -> String {
    prefixed(PHILOSOPHY_PREFIX)
}

pub fn new_self_model_id() -> String {
    prefixed(SELF_MODEL_PREFIX)
}

pub fn new_developer_id() -> String {
    prefixed(DEVELOPER_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_carry_their_type_prefix() {
        assert!(new_belief_id().starts_with("bi_"));
        assert!(new_dialectic_id().starts_with("di_"));
        assert!(new_developer_id().starts_with("dev_"));
    }

    #[test]
    fn ids_are_unique() {
        let a = new_belief_id();
        let b = new_belief_id();
        assert_ne!(a, b);
    }
}
