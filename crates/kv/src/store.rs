//! Process-wide versioned object store.
//!
//! Logical model: `namespace → key → ordered versions of a typed value`.
//! A single reader/writer lock protects the in-memory map; a second disk
//! mutex serializes snapshot file I/O. Snapshot writers work from a deep
//! copy, so they never block readers of the map.

use std::collections::{BTreeMap, HashMap};
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::snapshot::{SnapshotDoc, SnapshotRecord};
use crate::value::StoredValue;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("namespace `{namespace}` key `{key}` not found")]
    NotFound { namespace: String, key: String },

    #[error("invalid value: {0}")]
    InvalidValue(String),

    #[error("unknown type tag `{0}`")]
    UnknownTypeTag(String),

    #[error("snapshot io: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot encoding: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("store lock poisoned")]
    Poisoned,
}

impl From<StoreError> for noesis_model::Error {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { namespace, key } => {
                noesis_model::Error::not_found("kv entry", format!("{namespace}/{key}"))
            }
            StoreError::InvalidValue(msg) => noesis_model::Error::InvalidValue(msg),
            other => noesis_model::Error::Persistence(other.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
struct VersionedValue {
    version: i64,
    value: StoredValue,
}

type StoreMap = HashMap<String, HashMap<String, Vec<VersionedValue>>>;

#[derive(Debug)]
pub struct KvStore {
    map: RwLock<StoreMap>,
    /// Serializes snapshot file writes against each other only.
    disk: Mutex<()>,
    snapshot_path: Option<PathBuf>,
}

impl KvStore {
    /// A store with no persistence; snapshots are never written.
    pub fn in_memory() -> Self {
        Self {
            map: RwLock::new(HashMap::new()),
            disk: Mutex::new(()),
            snapshot_path: None,
        }
    }

    /// A store backed by a snapshot file. Loads the file when it already
    /// exists; every subsequent successful `store` rewrites it.
    pub fn with_snapshot(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let store = Self {
            map: RwLock::new(HashMap::new()),
            disk: Mutex::new(()),
            snapshot_path: Some(path.into()),
        };
        store.load_snapshot()?;
        Ok(store)
    }

    pub fn snapshot_path(&self) -> Option<&Path> {
        self.snapshot_path.as_deref()
    }

    /// Insert or replace `(namespace, key, version)`. Versions within a key
    /// stay sorted ascending. When persistence is configured the whole store
    /// is snapshotted after the write.
    pub fn store(
        &self,
        namespace: &str,
        key: &str,
        value: StoredValue,
        version: i64,
    ) -> Result<(), StoreError> {
        if namespace.is_empty() {
            return Err(StoreError::InvalidValue("empty namespace".to_string()));
        }
        if key.is_empty() {
            return Err(StoreError::InvalidValue("empty key".to_string()));
        }

        {
            let mut map = self.map.write().map_err(|_| StoreError::Poisoned)?;
            let versions = map
                .entry(namespace.to_string())
                .or_default()
                .entry(key.to_string())
                .or_default();
            match versions.binary_search_by(|existing| existing.version.cmp(&version)) {
                Ok(idx) => versions[idx].value = value,
                Err(idx) => versions.insert(idx, VersionedValue { version, value }),
            }
        }
        debug!(namespace, key, version, "stored value");

        if self.snapshot_path.is_some() {
            self.save_snapshot()?;
        }
        Ok(())
    }

    /// The latest version of `(namespace, key)`.
    pub fn retrieve(&self, namespace: &str, key: &str) -> Result<StoredValue, StoreError> {
        let map = self.map.read().map_err(|_| StoreError::Poisoned)?;
        map.get(namespace)
            .and_then(|ns| ns.get(key))
            .and_then(|versions| versions.last())
            .map(|v| v.value.clone())
            .ok_or_else(|| StoreError::NotFound {
                namespace: namespace.to_string(),
                key: key.to_string(),
            })
    }

    /// All versions of `(namespace, key)` in ascending version order.
    pub fn retrieve_all_versions(
        &self,
        namespace: &str,
        key: &str,
    ) -> Result<Vec<StoredValue>, StoreError> {
        let map = self.map.read().map_err(|_| StoreError::Poisoned)?;
        map.get(namespace)
            .and_then(|ns| ns.get(key))
            .filter(|versions| !versions.is_empty())
            .map(|versions| versions.iter().map(|v| v.value.clone()).collect())
            .ok_or_else(|| StoreError::NotFound {
                namespace: namespace.to_string(),
                key: key.to_string(),
            })
    }

    /// Highest stored version of `(namespace, key)`, if any.
    pub fn latest_version(&self, namespace: &str, key: &str) -> Result<Option<i64>, StoreError> {
        let map = self.map.read().map_err(|_| StoreError::Poisoned)?;
        Ok(map
            .get(namespace)
            .and_then(|ns| ns.get(key))
            .and_then(|versions| versions.last())
            .map(|v| v.version))
    }

    /// Latest value of every key in `namespace` whose latest version carries
    /// `type_tag`. Keys are visited in sorted order so output is stable.
    pub fn list_by_type(
        &self,
        namespace: &str,
        type_tag: &str,
    ) -> Result<Vec<StoredValue>, StoreError> {
        let map = self.map.read().map_err(|_| StoreError::Poisoned)?;
        let ns = map.get(namespace).ok_or_else(|| StoreError::NotFound {
            namespace: namespace.to_string(),
            key: String::new(),
        })?;
        let mut keys: Vec<&String> = ns.keys().collect();
        keys.sort();
        Ok(keys
            .into_iter()
            .filter_map(|key| ns.get(key).and_then(|versions| versions.last()))
            .filter(|latest| latest.value.type_tag() == type_tag)
            .map(|latest| latest.value.clone())
            .collect())
    }

    /// Latest matching values across every namespace.
    pub fn list_all_by_type(&self, type_tag: &str) -> Result<Vec<StoredValue>, StoreError> {
        let map = self.map.read().map_err(|_| StoreError::Poisoned)?;
        let mut namespaces: Vec<&String> = map.keys().collect();
        namespaces.sort();
        let mut out = Vec::new();
        for namespace in namespaces {
            let ns = &map[namespace];
            let mut keys: Vec<&String> = ns.keys().collect();
            keys.sort();
            for key in keys {
                if let Some(latest) = ns.get(key).and_then(|versions| versions.last())
                    && latest.value.type_tag() == type_tag
                {
                    out.push(latest.value.clone());
                }
            }
        }
        Ok(out)
    }

    /// Drop all data. When persistence is configured the empty snapshot is
    /// written out so a reload starts clean too.
    pub fn clear_store(&self) -> Result<(), StoreError> {
        {
            let mut map = self.map.write().map_err(|_| StoreError::Poisoned)?;
            map.clear();
        }
        info!("store cleared");
        if self.snapshot_path.is_some() {
            self.save_snapshot()?;
        }
        Ok(())
    }

    /// Serialize the full store to the snapshot file.
    ///
    /// The map is deep-copied under the read lock and released before any
    /// disk work, so mutators and readers proceed while the file is written.
    /// The file itself is replaced atomically (write-to-temp + rename).
    pub fn save_snapshot(&self) -> Result<(), StoreError> {
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };

        let detached: StoreMap = {
            let map = self.map.read().map_err(|_| StoreError::Poisoned)?;
            map.clone()
        };

        let _disk = self.disk.lock().map_err(|_| StoreError::Poisoned)?;
        let doc = to_snapshot_doc(&detached)?;
        let body = serde_json::to_string(&doc)?;
        write_atomic(path, body.as_bytes())?;
        debug!(path = %path.display(), namespaces = doc.len(), "snapshot written");
        Ok(())
    }

    /// Replace the in-memory map with the snapshot file contents. A missing
    /// file leaves the store empty; an unknown type tag is fatal.
    pub fn load_snapshot(&self) -> Result<(), StoreError> {
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };

        let body = {
            let _disk = self.disk.lock().map_err(|_| StoreError::Poisoned)?;
            if !path.exists() {
                debug!(path = %path.display(), "no snapshot file, starting empty");
                return Ok(());
            }
            std::fs::read_to_string(path)?
        };

        let doc: SnapshotDoc = serde_json::from_str(&body)?;
        let mut loaded: StoreMap = HashMap::new();
        let mut records = 0usize;
        for (namespace, keys) in doc {
            let ns = loaded.entry(namespace).or_default();
            for (key, entries) in keys {
                let mut versions = Vec::with_capacity(entries.len());
                for record in entries {
                    let value = StoredValue::decode(&record.type_tag, &record.json_data)?;
                    versions.push(VersionedValue {
                        version: record.version,
                        value,
                    });
                    records += 1;
                }
                versions.sort_by_key(|v| v.version);
                ns.insert(key, versions);
            }
        }

        let namespaces = loaded.len();
        {
            let mut map = self.map.write().map_err(|_| StoreError::Poisoned)?;
            *map = loaded;
        }
        info!(path = %path.display(), namespaces, records, "snapshot loaded");
        Ok(())
    }
}

fn to_snapshot_doc(map: &StoreMap) -> Result<SnapshotDoc, StoreError> {
    let mut doc: SnapshotDoc = BTreeMap::new();
    for (namespace, keys) in map {
        let ns = doc.entry(namespace.clone()).or_default();
        for (key, versions) in keys {
            let mut records = Vec::with_capacity(versions.len());
            for versioned in versions {
                records.push(SnapshotRecord {
                    json_data: versioned.value.encode()?,
                    type_tag: versioned.value.type_tag().to_string(),
                    version: versioned.version,
                });
            }
            ns.insert(key.clone(), records);
        }
    }
    Ok(doc)
}

/// Write `body` to a `.tmp` sibling, fsync, then rename over `path`. A crash
/// before the rename leaves the original untouched; the `.tmp` file is
/// cleaned up on any error path.
fn write_atomic(path: &Path, body: &[u8]) -> Result<(), StoreError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }

    let tmp_path = {
        let filename = path
            .file_name()
            .map(|f| f.to_string_lossy().to_string())
            .unwrap_or_else(|| "snapshot.json".to_string());
        path.with_file_name(format!("{filename}.tmp"))
    };

    let write_result: Result<(), StoreError> = (|| {
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp_path)?;
        file.write_all(body)?;
        file.flush()?;
        file.sync_all()?;
        Ok(())
    })();

    if let Err(err) = write_result {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(err);
    }

    if let Err(err) = std::fs::rename(&tmp_path, path) {
        warn!(path = %path.display(), error = %err, "snapshot rename failed");
        let _ = std::fs::remove_file(&tmp_path);
        return Err(err.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use noesis_model::{Belief, BeliefType, SelfModel};

    use super::*;

    fn belief(id: &str, version: i64, content: &str) -> StoredValue {
        let mut b = Belief::new(id.into(), "sm_1".into(), content.into(), BeliefType::Statement);
        b.version = version;
        StoredValue::Belief(b)
    }

    #[test]
    fn retrieve_returns_latest_version() {
        let store = KvStore::in_memory();
        store.store("sm_1", "bi_1", belief("bi_1", 1, "v1"), 1).unwrap();
        store.store("sm_1", "bi_1", belief("bi_1", 2, "v2"), 2).unwrap();

        let latest = store.retrieve("sm_1", "bi_1").unwrap().into_belief().unwrap();
        assert_eq!(latest.version, 2);
        assert_eq!(latest.content_text(), "v2");
    }

    #[test]
    fn versions_stay_sorted_regardless_of_insert_order() {
        let store = KvStore::in_memory();
        store.store("sm_1", "bi_1", belief("bi_1", 3, "v3"), 3).unwrap();
        store.store("sm_1", "bi_1", belief("bi_1", 1, "v1"), 1).unwrap();
        store.store("sm_1", "bi_1", belief("bi_1", 2, "v2"), 2).unwrap();

        let all = store.retrieve_all_versions("sm_1", "bi_1").unwrap();
        let versions: Vec<i64> = all
            .into_iter()
            .map(|v| v.into_belief().unwrap().version)
            .collect();
        assert_eq!(versions, vec![1, 2, 3]);
    }

    #[test]
    fn storing_same_version_replaces_in_place() {
        let store = KvStore::in_memory();
        store.store("sm_1", "bi_1", belief("bi_1", 1, "old"), 1).unwrap();
        store.store("sm_1", "bi_1", belief("bi_1", 1, "new"), 1).unwrap();

        let all = store.retrieve_all_versions("sm_1", "bi_1").unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].clone().into_belief().unwrap().content_text(), "new");
    }

    #[test]
    fn missing_entries_are_not_found() {
        let store = KvStore::in_memory();
        assert!(matches!(
            store.retrieve("nope", "bi_1"),
            Err(StoreError::NotFound { .. })
        ));
        assert!(matches!(
            store.list_by_type("nope", "Belief"),
            Err(StoreError::NotFound { .. })
        ));
    }

    #[test]
    fn empty_namespace_or_key_is_invalid() {
        let store = KvStore::in_memory();
        assert!(matches!(
            store.store("", "k", belief("bi_1", 1, "x"), 1),
            Err(StoreError::InvalidValue(_))
        ));
        assert!(matches!(
            store.store("ns", "", belief("bi_1", 1, "x"), 1),
            Err(StoreError::InvalidValue(_))
        ));
    }

    #[test]
    fn list_by_type_filters_on_latest_tag() {
        let store = KvStore::in_memory();
        store.store("sm_1", "bi_1", belief("bi_1", 1, "a"), 1).unwrap();
        store.store("sm_1", "bi_2", belief("bi_2", 1, "b"), 1).unwrap();
        store
            .store(
                "sm_1",
                "SelfModel",
                StoredValue::SelfModel(SelfModel {
                    id: "sm_1".into(),
                    philosophy_ids: Vec::new(),
                }),
                1,
            )
            .unwrap();

        let beliefs = store.list_by_type("sm_1", "Belief").unwrap();
        assert_eq!(beliefs.len(), 2);
        let models = store.list_by_type("sm_1", "SelfModel").unwrap();
        assert_eq!(models.len(), 1);
    }

    #[test]
    fn list_all_by_type_spans_namespaces() {
        let store = KvStore::in_memory();
        store.store("sm_1", "bi_1", belief("bi_1", 1, "a"), 1).unwrap();
        store.store("sm_2", "bi_2", belief("bi_2", 1, "b"), 1).unwrap();

        let all = store.list_all_by_type("Belief").unwrap();
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn clear_store_empties_everything() {
        let store = KvStore::in_memory();
        store.store("sm_1", "bi_1", belief("bi_1", 1, "a"), 1).unwrap();
        store.clear_store().unwrap();

        assert!(store.retrieve("sm_1", "bi_1").is_err());
        assert!(store.list_by_type("sm_1", "Belief").is_err());
    }

    #[test]
    fn snapshot_roundtrips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        let store = KvStore::with_snapshot(&path).unwrap();
        store.store("sm_1", "bi_1", belief("bi_1", 1, "v1"), 1).unwrap();
        store.store("sm_1", "bi_1", belief("bi_1", 2, "v2"), 2).unwrap();
        store.store("sm_2", "bi_9", belief("bi_9", 1, "other"), 1).unwrap();

        let reopened = KvStore::with_snapshot(&path).unwrap();
        let latest = reopened.retrieve("sm_1", "bi_1").unwrap().into_belief().unwrap();
        assert_eq!(latest.content_text(), "v2");
        assert_eq!(reopened.retrieve_all_versions("sm_1", "bi_1").unwrap().len(), 2);
        assert_eq!(reopened.list_by_type("sm_2", "Belief").unwrap().len(), 1);
    }

    #[test]
    fn unknown_tag_in_snapshot_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        std::fs::write(
            &path,
            r#"{"ns":{"k":[{"JsonData":"{}","Type":"Widget","Version":1}]}}"#,
        )
        .unwrap();

        let err = KvStore::with_snapshot(&path).unwrap_err();
        assert!(matches!(err, StoreError::UnknownTypeTag(tag) if tag == "Widget"));
    }

    #[test]
    fn clear_persists_empty_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        let store = KvStore::with_snapshot(&path).unwrap();
        store.store("sm_1", "bi_1", belief("bi_1", 1, "a"), 1).unwrap();
        store.clear_store().unwrap();

        let reopened = KvStore::with_snapshot(&path).unwrap();
        assert!(reopened.retrieve("sm_1", "bi_1").is_err());
    }
}
