//! Mapping persistence as a single JSON file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{info, warn};

use crate::error::{CalTrackError, CalTrackResult};
use crate::mapping::{MappingEntry, MappingStore, SCHEMA_VERSION};

/// Location of the mapping file. The file is owned by one process at a time.
#[derive(Debug, Clone)]
pub struct MappingFile {
    path: PathBuf,
}

impl MappingFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        MappingFile { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the store. A missing, unreadable or corrupt file yields an empty
    /// store; problems are logged, never returned.
    pub fn load(&self) -> MappingStore {
        if !self.path.exists() {
            return MappingStore::new();
        }

        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) => {
                warn!(file = %self.path.display(), error = %e, "Failed to read mapping file, starting fresh");
                return MappingStore::new();
            }
        };

        match parse_mapping(&content) {
            Ok(store) => store,
            Err(e) => {
                warn!(file = %self.path.display(), error = %e, "Failed to parse mapping file, starting fresh");
                MappingStore::new()
            }
        }
    }

    /// Overwrite the file with `store`.
    pub fn save(&self, store: &MappingStore) -> CalTrackResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(store)?;

        let mut temp = self.path.clone().into_os_string();
        temp.push(".tmp");
        let temp = PathBuf::from(temp);

        std::fs::write(&temp, content)?;
        std::fs::rename(&temp, &self.path)?;
        Ok(())
    }
}

/// Parse mapping file contents.
///
/// Files without a schema version are legacy files keyed by volatile event
/// ids, shaped either `{ "entries": {...} }` or as a bare map. Their entries
/// land in the `legacy` bucket for [`MappingStore::rekey_legacy`].
pub fn parse_mapping(content: &str) -> CalTrackResult<MappingStore> {
    let value: Value = serde_json::from_str(content)?;
    let object = value
        .as_object()
        .ok_or_else(|| CalTrackError::Serialization("mapping file is not a JSON object".into()))?;

    if object.contains_key("schemaVersion") || object.contains_key("version") {
        let mut store: MappingStore = serde_json::from_value(value)?;
        store.schema_version = SCHEMA_VERSION;
        return Ok(store);
    }

    info!("Migrating legacy mapping to schema version {}", SCHEMA_VERSION);

    let raw = object
        .get("entries")
        .and_then(Value::as_object)
        .unwrap_or(object);

    let legacy: BTreeMap<String, MappingEntry> = raw
        .iter()
        .filter_map(|(old_id, v)| match serde_json::from_value(v.clone()) {
            Ok(entry) => Some((old_id.clone(), entry)),
            Err(e) => {
                warn!(key = %old_id, error = %e, "Dropping unreadable legacy mapping entry");
                None
            }
        })
        .collect();

    Ok(MappingStore {
        schema_version: SCHEMA_VERSION,
        entries: BTreeMap::new(),
        legacy: Some(legacy),
    })
}
