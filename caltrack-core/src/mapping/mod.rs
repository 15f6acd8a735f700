//! Source event → destination time entry identity mapping.
//!
//! Entries are keyed by the event's stable key. The store is advisory: it
//! can always be rebuilt from what the destination holds, so a lost or
//! corrupt file degrades to "nothing is known yet".

mod file;

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::event::SourceEvent;
use crate::plan::Operation;

pub use file::{MappingFile, parse_mapping};

pub const SCHEMA_VERSION: u32 = 2;

/// Values last written to the destination for an entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub start: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub stop: DateTime<Utc>,
    #[serde(with = "crate::serde_util::delta_millis")]
    pub duration: TimeDelta,
    #[serde(alias = "taskId")]
    pub task_ref: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<Snapshot>,
    /// Who wrote the entry, e.g. "interactive".
    #[serde(
        default,
        alias = "createdFrom",
        alias = "updatedFrom",
        skip_serializing_if = "Option::is_none"
    )]
    pub origin: Option<String>,
    /// Pre-migration key this entry was carried over from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub migrated_from: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingEntry {
    #[serde(alias = "clickupTimeEntryId")]
    pub destination_id: String,
    #[serde(default, alias = "meta")]
    pub metadata: EntryMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// A mapping entry whose source event is no longer in the window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Orphan {
    pub source_key: String,
    pub destination_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingStore {
    #[serde(alias = "version")]
    pub schema_version: u32,
    #[serde(default)]
    pub entries: BTreeMap<String, MappingEntry>,
    /// Entries from a pre-v2 file, keyed by the volatile event id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legacy: Option<BTreeMap<String, MappingEntry>>,
}

impl Default for MappingStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MappingStore {
    pub fn new() -> Self {
        MappingStore {
            schema_version: SCHEMA_VERSION,
            entries: BTreeMap::new(),
            legacy: None,
        }
    }

    pub fn get(&self, source_key: &str) -> Option<&MappingEntry> {
        self.entries.get(source_key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn upsert(&mut self, source_key: &str, destination_id: &str, metadata: EntryMetadata) {
        self.entries.insert(
            source_key.to_string(),
            MappingEntry {
                destination_id: destination_id.to_string(),
                metadata,
                updated_at: Some(Utc::now()),
            },
        );
    }

    pub fn remove(&mut self, source_key: &str) -> Option<MappingEntry> {
        self.entries.remove(source_key)
    }

    /// Move legacy entries under the stable key of the event that currently
    /// carries their old id. Existing entries win. The legacy bucket is
    /// dropped afterwards, matched or not. Returns how many entries moved.
    pub fn rekey_legacy(&mut self, events: &[SourceEvent]) -> usize {
        let Some(legacy) = self.legacy.take() else {
            return 0;
        };

        let by_id: HashMap<&str, &SourceEvent> =
            events.iter().map(|e| (e.id.as_str(), e)).collect();

        let total = legacy.len();
        let mut migrated = 0;

        for (old_id, mut entry) in legacy {
            let Some(key) = by_id.get(old_id.as_str()).and_then(|e| e.stable_key()) else {
                continue;
            };

            if self.entries.contains_key(key) {
                continue;
            }

            entry.metadata.migrated_from = Some(old_id);
            self.entries.insert(key.to_string(), entry);
            migrated += 1;
        }

        info!(migrated, dropped = total - migrated, "Rekeyed legacy mapping entries");
        migrated
    }

    /// Every entry whose key is not in `live_keys`, in key order.
    pub fn find_orphans(&self, live_keys: &HashSet<&str>) -> Vec<Orphan> {
        self.entries
            .iter()
            .filter(|(key, _)| !live_keys.contains(key.as_str()))
            .map(|(key, entry)| Orphan {
                source_key: key.clone(),
                destination_id: entry.destination_id.clone(),
            })
            .collect()
    }

    /// Record an operation the caller applied successfully.
    ///
    /// Creates and updates are stored with a fresh snapshot of the written
    /// values; `destination_id` is the id the destination assigned (required
    /// for creates, optional for updates). Deletes drop the entry. Returns
    /// false when nothing could be recorded.
    pub fn record_applied(
        &mut self,
        op: &Operation,
        destination_id: Option<&str>,
        origin: &str,
    ) -> bool {
        match op {
            Operation::Create(create) => {
                let Some(id) = destination_id else {
                    return false;
                };
                self.upsert(
                    &create.entry.source_key,
                    id,
                    EntryMetadata {
                        snapshot: Some(create.entry.snapshot()),
                        origin: Some(origin.to_string()),
                        migrated_from: None,
                    },
                );
                true
            }
            Operation::Update(update) => {
                let id = destination_id.unwrap_or(&update.destination_id);
                self.upsert(
                    &update.entry.source_key,
                    id,
                    EntryMetadata {
                        snapshot: Some(update.entry.snapshot()),
                        origin: Some(origin.to_string()),
                        migrated_from: None,
                    },
                );
                true
            }
            Operation::Delete(delete) => self.remove(&delete.source_key).is_some(),
            Operation::Skip(_) => false,
        }
    }
}
