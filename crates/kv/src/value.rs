//! The closed set of storable record types.
//!
//! Every record is stored alongside a stable type tag; the tag selects the
//! decoder on read, so values come back typed instead of as raw JSON.

use noesis_model::{Belief, BeliefSystem, Developer, Dialectic, Philosophy, SelfModel};
use serde::{Deserialize, Serialize};

use crate::store::StoreError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StoredValue {
    Belief(Belief),
    BeliefSystem(BeliefSystem),
    Dialectic(Dialectic),
    SelfModel(SelfModel),
    Philosophy(Philosophy),
    Developer(Developer),
}

impl StoredValue {
    /// Stable tag persisted in snapshots and matched by `list_by_type`.
    pub fn type_tag(&self) -> &'static str {
        match self {
            Self::Belief(_) => "Belief",
            Self::BeliefSystem(_) => "BeliefSystem",
            Self::Dialectic(_) => "Dialectic",
            Self::SelfModel(_) => "SelfModel",
            Self::Philosophy(_) => "Philosophy",
            Self::Developer(_) => "Developer",
        }
    }

    /// Serialize just the inner record (the tag travels separately).
    pub fn encode(&self) -> Result<String, StoreError> {
        let json = match self {
            Self::Belief(v) => serde_json::to_string(v)?,
            Self::BeliefSystem(v) => serde_json::to_string(v)?,
            Self::Dialectic(v) => serde_json::to_string(v)?,
            Self::SelfModel(v) => serde_json::to_string(v)?,
            Self::Philosophy(v) => serde_json::to_string(v)?,
            Self::Developer(v) => serde_json::to_string(v)?,
        };
        Ok(json)
    }

    /// Reconstruct a typed value from a tag and its serialized body.
    /// Unknown tags are fatal: the snapshot cannot be interpreted.
    pub fn decode(type_tag: &str, json_data: &str) -> Result<Self, StoreError> {
        let value = match type_tag {
            "Belief" => Self::Belief(serde_json::from_str(json_data)?),
            "BeliefSystem" => Self::BeliefSystem(serde_json::from_str(json_data)?),
            "Dialectic" => Self::Dialectic(serde_json::from_str(json_data)?),
            "SelfModel" => Self::SelfModel(serde_json::from_str(json_data)?),
            "Philosophy" => Self::Philosophy(serde_json::from_str(json_data)?),
            "Developer" => Self::Developer(serde_json::from_str(json_data)?),
            other => return Err(StoreError::UnknownTypeTag(other.to_string())),
        };
        Ok(value)
    }

    pub fn as_belief(&self) -> Option<&Belief> {
        match self {
            Self::Belief(b) => Some(b),
            _ => None,
        }
    }

    pub fn into_belief(self) -> Option<Belief> {
        match self {
            Self::Belief(b) => Some(b),
            _ => None,
        }
    }

    pub fn into_belief_system(self) -> Option<BeliefSystem> {
        match self {
            Self::BeliefSystem(bs) => Some(bs),
            _ => None,
        }
    }

    pub fn into_dialectic(self) -> Option<Dialectic> {
        match self {
            Self::Dialectic(d) => Some(d),
            _ => None,
        }
    }

    pub fn into_self_model(self) -> Option<SelfModel> {
        match self {
            Self::SelfModel(sm) => Some(sm),
            _ => None,
        }
    }

    pub fn into_philosophy(self) -> Option<Philosophy> {
        match self {
            Self::Philosophy(p) => Some(p),
            _ => None,
        }
    }

    pub fn into_developer(self) -> Option<Developer> {
        match self {
            Self::Developer(d) => Some(d),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use noesis_model::BeliefType;

    use super::*;

    #[test]
    fn encode_decode_preserves_type() {
        let belief = Belief::new("bi_1".into(), "sm_1".into(), "water is wet".into(), BeliefType::Statement);
        let value = StoredValue::Belief(belief.clone());
        let json = value.encode().unwrap();
        let back = StoredValue::decode(value.type_tag(), &json).unwrap();
        assert_eq!(back, value);
        assert_eq!(back.into_belief().unwrap(), belief);
    }

    #[test]
    fn unknown_tag_is_rejected() {
        let err = StoredValue::decode("Widget", "{}").unwrap_err();
        assert!(matches!(err, StoreError::UnknownTypeTag(tag) if tag == "Widget"));
    }
}
