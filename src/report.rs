//! Staged JSON files exchanged with external fetchers and appliers.

use std::path::Path;

use anyhow::{Context, Result};
use caltrack_core::SyncWindow;
use caltrack_core::event::{SourceEvent, events_from_json};
use caltrack_core::plan::{Operation, PlanOutcome, SkipOp, Unmatched};
use caltrack_core::record::{DestinationRecord, records_from_json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Totals {
    pub events: usize,
    pub records: usize,
    pub creates: usize,
    pub updates: usize,
    pub deletes: usize,
    pub skipped: usize,
    pub unmatched: usize,
    pub orphans: usize,
    pub fallback_fetches: usize,
    pub fallback_found: usize,
}

/// Output of `caltrack plan --output`, input of `analyze-ids` and
/// `record-applied`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DryRunReport {
    pub generated_at: DateTime<Utc>,
    pub window: SyncWindow,
    pub totals: Totals,
    pub ops: Vec<Operation>,
    #[serde(default)]
    pub skipped: Vec<SkipOp>,
    #[serde(default)]
    pub unmatched: Vec<Unmatched>,
}

impl DryRunReport {
    pub fn new(window: SyncWindow, events: usize, records: usize, outcome: &PlanOutcome) -> Self {
        DryRunReport {
            generated_at: Utc::now(),
            window,
            totals: Totals {
                events,
                records,
                creates: outcome.creates().count(),
                updates: outcome.updates().count(),
                deletes: outcome.deletes().count(),
                skipped: outcome.skipped_count,
                unmatched: outcome.unmatched.len(),
                orphans: outcome.orphan_count,
                fallback_fetches: outcome.fallback_fetches,
                fallback_found: outcome.fallback_found,
            },
            ops: outcome.ops.clone(),
            skipped: outcome.skipped.clone(),
            unmatched: outcome.unmatched.clone(),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = read(path)?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse dry-run report {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write dry-run report {}", path.display()))
    }
}

/// One line of applier output.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedOp {
    pub source_key: String,
    /// Id assigned by the destination. Required for creates.
    #[serde(default)]
    pub destination_id: Option<String>,
}

fn read(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

pub fn load_events(path: &Path) -> Result<Vec<SourceEvent>> {
    events_from_json(&read(path)?).with_context(|| format!("Failed to parse events from {}", path.display()))
}

pub fn load_records(path: &Path) -> Result<Vec<DestinationRecord>> {
    records_from_json(&read(path)?)
        .with_context(|| format!("Failed to parse time entries from {}", path.display()))
}

pub fn load_applied(path: &Path) -> Result<Vec<AppliedOp>> {
    serde_json::from_str(&read(path)?)
        .with_context(|| format!("Failed to parse applied operations from {}", path.display()))
}
