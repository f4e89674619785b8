//! On-disk snapshot format.
//!
//! A single JSON file: `{ namespace: { key: [ {JsonData, Type, Version} ] } }`.
//! `JsonData` is the serialized record; `Type` selects the decoder on load.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotRecord {
    #[serde(rename = "JsonData")]
    pub json_data: String,
    #[serde(rename = "Type")]
    pub type_tag: String,
    #[serde(rename = "Version")]
    pub version: i64,
}

/// BTreeMaps keep snapshot output deterministic across runs.
pub type SnapshotDoc = BTreeMap<String, BTreeMap<String, Vec<SnapshotRecord>>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_uses_wire_field_names() {
        let record = SnapshotRecord {
            json_data: "{}".into(),
            type_tag: "Belief".into(),
            version: 3,
        };
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"JsonData\""));
        assert!(json.contains("\"Type\""));
        assert!(json.contains("\"Version\":3"));
    }
}
