use serde::{Deserialize, Serialize};

use crate::dialectic::now_millis;

/// A user-scoped container for philosophies, beliefs, and dialectics.
/// Its ID doubles as the KV-store namespace for everything it owns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelfModel {
    pub id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub philosophy_ids: Vec<String>,
}

/// Free-text worldview with embedded `[[C: ...]]` / `[[S: ...]]` context
/// markers that can be extrapolated into observation contexts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Philosophy {
    pub id: String,
    pub description: String,
    pub extrapolate_contexts: bool,
}

/// API consumer identity. CRUD lives outside this core; the record exists so
/// the façade can reject unknown keys before doing any work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Developer {
    pub id: String,
    pub name: String,
    pub api_keys: Vec<String>,
    pub created_at_millis_utc: i64,
}

impl Developer {
    pub fn new(id: String, name: impl Into<String>, api_keys: Vec<String>) -> Self {
        Self {
            id,
            name: name.into(),
            api_keys,
            created_at_millis_utc: now_millis(),
        }
    }
}
