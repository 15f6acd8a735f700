//! Verification of mapped entries the bulk fetch did not return.

use std::collections::HashMap;
use std::future::Future;
use std::ops::AddAssign;

use tracing::{debug, warn};

use crate::error::CalTrackResult;
use crate::mapping::MappingEntry;
use crate::plan::change::{Recorded, detect_changes};
use crate::plan::operation::{FieldChange, PlannedEntry};
use crate::record::DestinationRecord;

/// Single-record lookup on the destination system.
pub trait RecordLookup {
    fn fetch_record(
        &self,
        id: &str,
    ) -> impl Future<Output = CalTrackResult<Option<DestinationRecord>>> + Send;
}

/// Lookup that never finds anything. Routes every miss to the snapshot check.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLookup;

impl RecordLookup for NoLookup {
    async fn fetch_record(&self, _id: &str) -> CalTrackResult<Option<DestinationRecord>> {
        Ok(None)
    }
}

/// In-memory lookup over records fetched ahead of time.
#[derive(Debug, Clone, Default)]
pub struct RecordIndex {
    records: HashMap<String, DestinationRecord>,
}

impl RecordIndex {
    pub fn new(records: impl IntoIterator<Item = DestinationRecord>) -> Self {
        RecordIndex {
            records: records.into_iter().map(|r| (r.id.clone(), r)).collect(),
        }
    }

    pub fn get(&self, id: &str) -> Option<&DestinationRecord> {
        self.records.get(id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl RecordLookup for RecordIndex {
    async fn fetch_record(&self, id: &str) -> CalTrackResult<Option<DestinationRecord>> {
        Ok(self.records.get(id).cloned())
    }
}

/// Outcome of verifying one missing entry.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    /// Direct lookup found the record; `changes` as from the change detector.
    Found {
        record: DestinationRecord,
        changes: Vec<FieldChange>,
    },
    /// Not found, but the stored snapshot matches the plan.
    SnapshotMatch,
    /// Not found, and the stored snapshot differs from the plan.
    SnapshotMismatch { changes: Vec<FieldChange> },
    /// Not found and nothing stored to compare against.
    Missing,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FallbackStats {
    pub fetches: usize,
    pub found: usize,
    pub errors: usize,
}

impl FallbackStats {
    /// Counts accumulated after `earlier` was taken.
    pub fn since(self, earlier: FallbackStats) -> FallbackStats {
        FallbackStats {
            fetches: self.fetches.saturating_sub(earlier.fetches),
            found: self.found.saturating_sub(earlier.found),
            errors: self.errors.saturating_sub(earlier.errors),
        }
    }
}

impl AddAssign for FallbackStats {
    fn add_assign(&mut self, other: FallbackStats) {
        self.fetches += other.fetches;
        self.found += other.found;
        self.errors += other.errors;
    }
}

/// Runs one direct lookup per call, in order, and keeps count.
pub struct FallbackVerifier<'a, L> {
    lookup: &'a L,
    stats: FallbackStats,
}

impl<'a, L: RecordLookup> FallbackVerifier<'a, L> {
    pub fn new(lookup: &'a L) -> Self {
        FallbackVerifier {
            lookup,
            stats: FallbackStats::default(),
        }
    }

    pub fn stats(&self) -> FallbackStats {
        self.stats
    }

    pub async fn verify(&mut self, entry: &MappingEntry, planned: &PlannedEntry) -> Verdict {
        self.stats.fetches += 1;

        match self.lookup.fetch_record(&entry.destination_id).await {
            Ok(Some(record)) => {
                self.stats.found += 1;
                let changes = detect_changes(planned, &Recorded::from(&record));
                return Verdict::Found { record, changes };
            }
            Ok(None) => {
                debug!(destination_id = %entry.destination_id, "Direct lookup found nothing");
            }
            Err(e) => {
                self.stats.errors += 1;
                warn!(destination_id = %entry.destination_id, error = %e, "Direct lookup failed, treating as not found");
            }
        }

        let Some(snapshot) = entry.metadata.snapshot.as_ref() else {
            return Verdict::Missing;
        };

        let changes = detect_changes(planned, &Recorded::from(snapshot));
        if changes.is_empty() {
            Verdict::SnapshotMatch
        } else {
            Verdict::SnapshotMismatch { changes }
        }
    }
}
