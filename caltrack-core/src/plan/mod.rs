//! Reconciliation planning: decide which time entries to create, update or
//! delete so the destination mirrors the calendar.
//!
//! Planning is sequential. Events are handled one at a time in input order,
//! and the only I/O is the direct lookup for mapped entries the bulk fetch
//! did not return.

mod change;
mod fallback;
mod operation;

use std::collections::{HashMap, HashSet};

use chrono::TimeDelta;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::event::SourceEvent;
use crate::extract::Extractor;
use crate::mapping::MappingStore;
use crate::record::DestinationRecord;
use crate::transform::SubjectTransform;

pub use change::{Recorded, TOLERANCE, detect_changes};
pub use fallback::{FallbackStats, FallbackVerifier, NoLookup, RecordIndex, RecordLookup, Verdict};
pub use operation::{
    CreateOp, DeleteOp, Field, FieldChange, Operation, PlannedEntry, Reason, SkipOp, Unmatched,
    UnmatchedReason, UpdateOp,
};

/// Result of one planning run.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanOutcome {
    /// Creates and updates in event order, followed by all deletes.
    /// Callers may rely on no delete preceding a create or update.
    pub ops: Vec<Operation>,
    /// Mapped events that need no write.
    pub skipped: Vec<SkipOp>,
    pub unmatched: Vec<Unmatched>,
    pub orphan_count: usize,
    pub skipped_count: usize,
    pub fallback_fetches: usize,
    pub fallback_found: usize,
    pub fallback_errors: usize,
    /// Legacy mapping entries moved under a stable key before planning.
    pub migrated: usize,
    pub duplicate_event_ids: usize,
    pub duplicate_stable_keys: usize,
}

impl PlanOutcome {
    pub fn creates(&self) -> impl Iterator<Item = &CreateOp> {
        self.ops.iter().filter_map(|op| match op {
            Operation::Create(create) => Some(create),
            _ => None,
        })
    }

    pub fn updates(&self) -> impl Iterator<Item = &UpdateOp> {
        self.ops.iter().filter_map(|op| match op {
            Operation::Update(update) => Some(update),
            _ => None,
        })
    }

    pub fn deletes(&self) -> impl Iterator<Item = &DeleteOp> {
        self.ops.iter().filter_map(|op| match op {
            Operation::Delete(delete) => Some(delete),
            _ => None,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

enum Decision {
    Write(Operation),
    Skip(SkipOp),
}

/// Plans against one extractor, subject transform and lookup.
pub struct Planner<'a, L> {
    extractor: &'a Extractor,
    transform: &'a dyn SubjectTransform,
    lookup: &'a L,
}

impl<'a, L: RecordLookup> Planner<'a, L> {
    pub fn new(extractor: &'a Extractor, transform: &'a dyn SubjectTransform, lookup: &'a L) -> Self {
        Planner {
            extractor,
            transform,
            lookup,
        }
    }

    /// Plan operations for `events` against the records already fetched for
    /// the window.
    ///
    /// Legacy entries in `mapping` are rekeyed first; nothing else in the
    /// mapping is modified. Saving it is up to the caller, after applying.
    pub async fn plan(
        &self,
        events: &[SourceEvent],
        records: &[DestinationRecord],
        mapping: &mut MappingStore,
    ) -> PlanOutcome {
        let migrated = mapping.rekey_legacy(events);
        let mapping = &*mapping;

        let by_id: HashMap<&str, &DestinationRecord> =
            records.iter().map(|r| (r.id.as_str(), r)).collect();

        let mut verifier = FallbackVerifier::new(self.lookup);
        let mut outcome = PlanOutcome {
            migrated,
            ..Default::default()
        };

        let mut seen_ids = HashSet::new();
        let mut duplicate_ids = HashSet::new();

        // Slots are cleared when a later event claims the same stable key,
        // along with the lookups spent on the discarded decision
        let mut decisions: Vec<Option<(Decision, FallbackStats)>> = Vec::new();
        let mut slot_by_key: HashMap<&str, usize> = HashMap::new();
        let mut duplicate_keys = HashSet::new();

        for event in events {
            if !seen_ids.insert(event.id.as_str()) {
                duplicate_ids.insert(event.id.as_str());
            }

            let Some(source_key) = event.stable_key() else {
                debug!(event_id = %event.id, "No stable key");
                outcome
                    .unmatched
                    .push(Unmatched::new(event, UnmatchedReason::MissingStableKey));
                continue;
            };

            let Some(extraction) = self.extractor.extract(event) else {
                debug!(event_id = %event.id, "No task id");
                outcome.unmatched.push(Unmatched::new(event, UnmatchedReason::NoTaskId));
                continue;
            };

            let start = event.start.as_ref().and_then(|t| t.to_utc());
            let end = event.end.as_ref().and_then(|t| t.to_utc());
            let (Some(start), Some(end)) = (start, end) else {
                debug!(event_id = %event.id, "Unparsable start or end");
                outcome.unmatched.push(Unmatched::new(event, UnmatchedReason::MissingTime));
                continue;
            };

            let duration = end - start;
            if duration <= TimeDelta::zero() {
                debug!(event_id = %event.id, duration_ms = duration.num_milliseconds(), "Non-positive duration");
                outcome
                    .unmatched
                    .push(Unmatched::new(event, UnmatchedReason::NonPositiveDuration));
                continue;
            }

            let subject = event.subject();
            let description = match self.transform.transform(subject) {
                Ok(description) => description,
                Err(e) => {
                    warn!(event_id = %event.id, error = %e, "Subject transform failed, using raw subject");
                    subject.to_string()
                }
            };

            let entry = PlannedEntry {
                event_id: event.id.clone(),
                source_key: source_key.to_string(),
                series_master_id: event.series_master_id.clone(),
                task_ref: extraction.task_ref,
                start,
                end,
                duration,
                subject: subject.to_string(),
                description,
            };

            let before = verifier.stats();
            let decision = self.decide(entry, mapping, &by_id, &mut verifier).await;
            let spent = verifier.stats().since(before);

            if let Some(previous) = slot_by_key.insert(source_key, decisions.len()) {
                duplicate_keys.insert(source_key);
                decisions[previous] = None;
            }
            decisions.push(Some((decision, spent)));
        }

        if !duplicate_ids.is_empty() {
            warn!(count = duplicate_ids.len(), "Duplicate event ids in fetched window");
        }
        if !duplicate_keys.is_empty() {
            warn!(count = duplicate_keys.len(), "Duplicate stable keys in fetched window, later events win");
        }

        let mut stats = FallbackStats::default();
        for (decision, spent) in decisions.into_iter().flatten() {
            stats += spent;
            match decision {
                Decision::Write(op) => outcome.ops.push(op),
                Decision::Skip(skip) => outcome.skipped.push(skip),
            }
        }

        let live_keys: HashSet<&str> = events.iter().filter_map(|e| e.stable_key()).collect();
        let orphans = mapping.find_orphans(&live_keys);
        outcome.orphan_count = orphans.len();
        outcome.ops.extend(orphans.into_iter().map(|orphan| {
            Operation::Delete(DeleteOp {
                source_key: orphan.source_key,
                destination_id: orphan.destination_id,
            })
        }));

        outcome.skipped_count = outcome.skipped.len();
        outcome.fallback_fetches = stats.fetches;
        outcome.fallback_found = stats.found;
        outcome.fallback_errors = stats.errors;
        outcome.duplicate_event_ids = duplicate_ids.len();
        outcome.duplicate_stable_keys = duplicate_keys.len();

        info!(
            ops = outcome.ops.len(),
            skipped = outcome.skipped_count,
            unmatched = outcome.unmatched.len(),
            orphans = outcome.orphan_count,
            fallback_fetches = outcome.fallback_fetches,
            "Planned"
        );

        outcome
    }

    async fn decide(
        &self,
        entry: PlannedEntry,
        mapping: &MappingStore,
        by_id: &HashMap<&str, &DestinationRecord>,
        verifier: &mut FallbackVerifier<'_, L>,
    ) -> Decision {
        let Some(mapped) = mapping.get(&entry.source_key) else {
            debug!(source_key = %entry.source_key, "Not mapped, create");
            return Decision::Write(Operation::Create(CreateOp { entry, reason: None }));
        };

        let destination_id = mapped.destination_id.clone();

        if let Some(record) = by_id.get(destination_id.as_str()) {
            let changes = detect_changes(&entry, &Recorded::from(*record));
            return changed_or_skip(entry, destination_id, changes, None, Reason::Unchanged);
        }

        let verdict = verifier.verify(mapped, &entry).await;
        match verdict {
            Verdict::Found { changes, .. } => changed_or_skip(
                entry,
                destination_id,
                changes,
                Some(Reason::FetchedDirect),
                Reason::FetchedDirect,
            ),
            Verdict::SnapshotMatch => Decision::Skip(SkipOp {
                source_key: entry.source_key,
                destination_id,
                reason: Reason::SnapshotMatch,
            }),
            Verdict::SnapshotMismatch { changes } => Decision::Write(Operation::Update(UpdateOp {
                destination_id,
                entry,
                reason: Some(Reason::SnapshotBased),
                changes,
            })),
            Verdict::Missing => {
                debug!(source_key = %entry.source_key, destination_id = %destination_id, "Mapped entry gone, recreate");
                Decision::Write(Operation::Create(CreateOp {
                    entry,
                    reason: Some(Reason::MissingRemote),
                }))
            }
        }
    }
}

fn changed_or_skip(
    entry: PlannedEntry,
    destination_id: String,
    changes: Vec<FieldChange>,
    update_reason: Option<Reason>,
    skip_reason: Reason,
) -> Decision {
    if changes.is_empty() {
        return Decision::Skip(SkipOp {
            source_key: entry.source_key,
            destination_id,
            reason: skip_reason,
        });
    }

    Decision::Write(Operation::Update(UpdateOp {
        destination_id,
        entry,
        reason: update_reason,
        changes,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use chrono::{DateTime, TimeZone, Utc};

    use crate::config::ExtractConfig;
    use crate::error::{CalTrackError, CalTrackResult};
    use crate::event::{EventBody, EventDateTime};
    use crate::mapping::{EntryMetadata, MappingEntry};
    use crate::transform::TrimTransform;

    fn extractor() -> Extractor {
        Extractor::from_config(&ExtractConfig::default()).unwrap()
    }

    fn event(id: &str, key: &str, body: &str, start: &str, end: &str) -> SourceEvent {
        SourceEvent {
            id: id.to_string(),
            ical_uid: Some(key.to_string()),
            subject: Some(format!("Work on {} ", id)),
            body: Some(EventBody {
                content_type: Some("html".into()),
                content: Some(body.to_string()),
            }),
            start: Some(EventDateTime::new(start, Some("UTC"))),
            end: Some(EventDateTime::new(end, Some("UTC"))),
            ..Default::default()
        }
    }

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 20, h, m, 0).unwrap()
    }

    fn standard_events() -> Vec<SourceEvent> {
        vec![
            event("e1", "k1", "tid#AB12cd34", "2025-03-20T09:00:00", "2025-03-20T10:00:00"),
            event("e2", "k2", "<p>nothing here</p>", "2025-03-20T10:00:00", "2025-03-20T11:00:00"),
            event("e3", "k3", "tid#XY98zz76", "2025-03-20T11:00:00", "2025-03-20T11:00:00"),
            event("e4", "k4", "tid#QQ11ww22", "2025-03-20T13:00:00", "2025-03-20T14:30:00"),
        ]
    }

    /// Destination records as they would look after applying `outcome`,
    /// with the mapping updated the way a caller records applied ops.
    fn apply(outcome: &PlanOutcome, mapping: &mut MappingStore) -> Vec<DestinationRecord> {
        let mut records = Vec::new();
        for (n, op) in outcome.ops.iter().enumerate() {
            let id = match op {
                Operation::Create(_) => format!("te-new-{}", n),
                Operation::Update(update) => update.destination_id.clone(),
                _ => {
                    mapping.record_applied(op, None, "test");
                    continue;
                }
            };
            let entry = op.entry().unwrap();
            records.push(DestinationRecord {
                id: id.clone(),
                task_ref: Some(entry.task_ref.clone()),
                start: entry.start,
                stop: Some(entry.end),
                duration: Some(entry.duration),
                description: entry.description.clone(),
            });
            assert!(mapping.record_applied(op, Some(&id), "test"));
        }
        records
    }

    async fn plan_with<L: RecordLookup>(
        events: &[SourceEvent],
        records: &[DestinationRecord],
        mapping: &mut MappingStore,
        lookup: &L,
    ) -> PlanOutcome {
        let extractor = extractor();
        Planner::new(&extractor, &TrimTransform, lookup)
            .plan(events, records, mapping)
            .await
    }

    fn mapped_with_snapshot(store: &mut MappingStore, key: &str, destination_id: &str, entry: &PlannedEntry) {
        store.upsert(
            key,
            destination_id,
            EntryMetadata {
                snapshot: Some(entry.snapshot()),
                ..Default::default()
            },
        );
    }

    fn planned_for(key: &str, task_ref: &str, start: DateTime<Utc>, end: DateTime<Utc>, description: &str) -> PlannedEntry {
        PlannedEntry {
            event_id: String::new(),
            source_key: key.into(),
            series_master_id: None,
            task_ref: task_ref.into(),
            start,
            end,
            duration: end - start,
            subject: description.into(),
            description: description.into(),
        }
    }

    #[tokio::test]
    async fn test_fresh_plan_creates_and_reports_unmatched() {
        let mut mapping = MappingStore::new();
        let outcome = plan_with(&standard_events(), &[], &mut mapping, &NoLookup).await;

        let created: Vec<&str> = outcome.creates().map(|c| c.entry.source_key.as_str()).collect();
        assert_eq!(created, vec!["k1", "k4"]);
        assert_eq!(outcome.ops.len(), 2);

        let create = outcome.creates().next().unwrap();
        assert_eq!(create.entry.task_ref, "AB12cd34");
        assert_eq!(create.entry.start, at(9, 0));
        assert_eq!(create.entry.duration, TimeDelta::hours(1));
        assert_eq!(create.entry.description, "Work on e1", "Transform trims the subject");
        assert_eq!(create.reason, None);

        let reasons: Vec<(&str, UnmatchedReason)> = outcome
            .unmatched
            .iter()
            .map(|u| (u.id.as_str(), u.reason))
            .collect();
        assert_eq!(
            reasons,
            vec![
                ("e2", UnmatchedReason::NoTaskId),
                ("e3", UnmatchedReason::NonPositiveDuration)
            ]
        );
    }

    #[tokio::test]
    async fn test_unmatched_never_in_ops() {
        let mut mapping = MappingStore::new();
        let outcome = plan_with(&standard_events(), &[], &mut mapping, &NoLookup).await;

        for unmatched in &outcome.unmatched {
            assert!(
                outcome.ops.iter().all(|op| op.entry().map(|e| e.event_id.as_str()) != Some(unmatched.id.as_str())),
                "Unmatched event {} must not be planned",
                unmatched.id
            );
        }
    }

    #[tokio::test]
    async fn test_missing_time_and_missing_key() {
        let mut bad_time = event("e1", "k1", "tid#AB12cd34", "not a date", "2025-03-20T10:00:00");
        bad_time.end = None;
        let mut no_key = event("e2", "", "tid#AB12cd34", "2025-03-20T09:00:00", "2025-03-20T10:00:00");
        no_key.ical_uid = None;
        let negative = event("e3", "k3", "tid#AB12cd34", "2025-03-20T10:00:00", "2025-03-20T09:00:00");

        let mut mapping = MappingStore::new();
        let outcome = plan_with(&[bad_time, no_key, negative], &[], &mut mapping, &NoLookup).await;

        assert!(outcome.ops.is_empty());
        let reasons: Vec<UnmatchedReason> = outcome.unmatched.iter().map(|u| u.reason).collect();
        assert_eq!(
            reasons,
            vec![
                UnmatchedReason::MissingTime,
                UnmatchedReason::MissingStableKey,
                UnmatchedReason::NonPositiveDuration
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_key_reported_before_missing_task_id() {
        let mut neither = event("e1", "", "<p>no task here</p>", "2025-03-20T09:00:00", "2025-03-20T10:00:00");
        neither.ical_uid = None;
        let no_task = event("e2", "k2", "<p>no task here</p>", "2025-03-20T09:00:00", "2025-03-20T10:00:00");

        let mut mapping = MappingStore::new();
        let outcome = plan_with(&[neither, no_task], &[], &mut mapping, &NoLookup).await;

        let reasons: Vec<UnmatchedReason> = outcome.unmatched.iter().map(|u| u.reason).collect();
        assert_eq!(
            reasons,
            vec![UnmatchedReason::MissingStableKey, UnmatchedReason::NoTaskId]
        );
    }

    #[tokio::test]
    async fn test_transform_failure_uses_raw_subject() {
        let failing = |_: &str| -> CalTrackResult<String> { Err(CalTrackError::Transform("boom".into())) };
        let extractor = extractor();
        let mut mapping = MappingStore::new();

        let events = vec![event("e1", "k1", "tid#AB12cd34", "2025-03-20T09:00:00", "2025-03-20T10:00:00")];
        let outcome = Planner::new(&extractor, &failing, &NoLookup)
            .plan(&events, &[], &mut mapping)
            .await;

        assert_eq!(outcome.creates().next().unwrap().entry.description, "Work on e1 ");
    }

    #[tokio::test]
    async fn test_second_run_is_idempotent() {
        let events = standard_events();
        let mut mapping = MappingStore::new();

        let first = plan_with(&events, &[], &mut mapping, &NoLookup).await;
        assert_eq!(first.ops.len(), 2);
        let records = apply(&first, &mut mapping);

        let second = plan_with(&events, &records, &mut mapping, &NoLookup).await;
        assert!(second.ops.is_empty(), "Expected no ops, got {:?}", second.ops);
        assert_eq!(second.skipped_count, 2);
        assert!(second.skipped.iter().all(|s| s.reason == Reason::Unchanged));
        assert_eq!(second.fallback_fetches, 0);
    }

    #[tokio::test]
    async fn test_changed_record_is_updated() {
        let events = standard_events();
        let mut mapping = MappingStore::new();
        let first = plan_with(&events, &[], &mut mapping, &NoLookup).await;
        let mut records = apply(&first, &mut mapping);

        // Someone shortened the entry on the destination side
        records[0].stop = Some(at(9, 30));
        records[0].duration = None;

        let second = plan_with(&events, &records, &mut mapping, &NoLookup).await;
        let updates: Vec<&UpdateOp> = second.updates().collect();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].destination_id, records[0].id);
        assert_eq!(updates[0].reason, None);
        assert_eq!(
            updates[0].changes.iter().map(|c| c.field).collect::<Vec<_>>(),
            vec![Field::Stop, Field::Duration]
        );
    }

    #[tokio::test]
    async fn test_orphans_become_trailing_deletes() {
        let mut mapping = MappingStore::new();
        mapping.upsert("gone", "te-gone", EntryMetadata::default());
        // Present in the window but without a task id: not an orphan
        mapping.upsert("k2", "te-k2", EntryMetadata::default());

        let outcome = plan_with(&standard_events(), &[], &mut mapping, &NoLookup).await;

        assert_eq!(outcome.orphan_count, 1);
        let deletes: Vec<&DeleteOp> = outcome.deletes().collect();
        assert_eq!(
            deletes,
            vec![&DeleteOp {
                source_key: "gone".into(),
                destination_id: "te-gone".into()
            }]
        );

        let first_delete = outcome.ops.iter().position(Operation::is_delete).unwrap();
        assert!(
            outcome.ops[first_delete..].iter().all(Operation::is_delete),
            "Deletes must come after every create and update"
        );
    }

    #[tokio::test]
    async fn test_snapshot_match_skips_when_lookup_misses() {
        let events = vec![event("e1", "k1", "tid#AB12cd34", "2025-03-20T09:00:00", "2025-03-20T10:00:00")];
        let mut mapping = MappingStore::new();
        let expected = planned_for("k1", "AB12cd34", at(9, 0), at(10, 0), "Work on e1");
        mapped_with_snapshot(&mut mapping, "k1", "te-hidden", &expected);

        let outcome = plan_with(&events, &[], &mut mapping, &NoLookup).await;

        assert!(outcome.ops.is_empty(), "Must not create a duplicate");
        assert_eq!(
            outcome.skipped,
            vec![SkipOp {
                source_key: "k1".into(),
                destination_id: "te-hidden".into(),
                reason: Reason::SnapshotMatch
            }]
        );
        assert_eq!(outcome.fallback_fetches, 1);
        assert_eq!(outcome.fallback_found, 0);
    }

    #[tokio::test]
    async fn test_snapshot_mismatch_updates_remembered_id() {
        let events = vec![event("e1", "k1", "tid#AB12cd34", "2025-03-20T09:00:00", "2025-03-20T10:00:00")];
        let mut mapping = MappingStore::new();
        let stale = planned_for("k1", "AB12cd34", at(8, 0), at(9, 0), "Work on e1");
        mapped_with_snapshot(&mut mapping, "k1", "te-hidden", &stale);

        let outcome = plan_with(&events, &[], &mut mapping, &NoLookup).await;

        let update = outcome.updates().next().expect("Should update");
        assert_eq!(update.destination_id, "te-hidden");
        assert_eq!(update.reason, Some(Reason::SnapshotBased));
        assert_eq!(outcome.creates().count(), 0);
    }

    #[tokio::test]
    async fn test_no_snapshot_recreates() {
        let events = vec![event("e1", "k1", "tid#AB12cd34", "2025-03-20T09:00:00", "2025-03-20T10:00:00")];
        let mut mapping = MappingStore::new();
        mapping.upsert("k1", "te-gone", EntryMetadata::default());

        let outcome = plan_with(&events, &[], &mut mapping, &NoLookup).await;

        let create = outcome.creates().next().expect("Should create");
        assert_eq!(create.reason, Some(Reason::MissingRemote));
        assert_eq!(outcome.deletes().count(), 0, "Key is live, no delete");
    }

    #[tokio::test]
    async fn test_direct_lookup_resolves_pagination_gap() {
        let events = vec![event("e1", "k1", "tid#AB12cd34", "2025-03-20T09:00:00", "2025-03-20T10:00:00")];
        let mut mapping = MappingStore::new();
        mapping.upsert("k1", "te-paged-out", EntryMetadata::default());

        let index = RecordIndex::new([DestinationRecord {
            id: "te-paged-out".into(),
            task_ref: Some("AB12cd34".into()),
            start: at(9, 0),
            stop: Some(at(10, 0)),
            duration: Some(TimeDelta::hours(1)),
            description: "Work on e1".into(),
        }]);

        let outcome = plan_with(&events, &[], &mut mapping, &index).await;

        assert!(outcome.ops.is_empty());
        assert_eq!(outcome.skipped[0].reason, Reason::FetchedDirect);
        assert_eq!(outcome.fallback_found, 1);
    }

    #[tokio::test]
    async fn test_duplicate_stable_key_last_wins() {
        let events = vec![
            event("e1", "k1", "tid#AB12cd34", "2025-03-20T09:00:00", "2025-03-20T10:00:00"),
            event("e2", "k2", "tid#CD34ef56", "2025-03-20T10:00:00", "2025-03-20T11:00:00"),
            event("e3", "k1", "tid#GH78ij90", "2025-03-20T12:00:00", "2025-03-20T13:00:00"),
        ];
        let mut mapping = MappingStore::new();
        let outcome = plan_with(&events, &[], &mut mapping, &NoLookup).await;

        let planned: Vec<(&str, &str)> = outcome
            .creates()
            .map(|c| (c.entry.source_key.as_str(), c.entry.task_ref.as_str()))
            .collect();
        assert_eq!(planned, vec![("k2", "CD34ef56"), ("k1", "GH78ij90")]);
        assert_eq!(outcome.duplicate_stable_keys, 1);
    }

    #[tokio::test]
    async fn test_discarded_duplicate_lookups_not_counted() {
        let events = vec![
            event("e1", "k1", "tid#AB12cd34", "2025-03-20T09:00:00", "2025-03-20T10:00:00"),
            event("e2", "k1", "tid#AB12cd34", "2025-03-20T09:00:00", "2025-03-20T10:00:00"),
        ];
        let mut mapping = MappingStore::new();
        mapping.upsert("k1", "te-paged-out", EntryMetadata::default());

        let index = RecordIndex::new([DestinationRecord {
            id: "te-paged-out".into(),
            task_ref: Some("AB12cd34".into()),
            start: at(9, 0),
            stop: Some(at(10, 0)),
            duration: Some(TimeDelta::hours(1)),
            description: "Work on e2".into(),
        }]);

        let outcome = plan_with(&events, &[], &mut mapping, &index).await;

        assert_eq!(outcome.duplicate_stable_keys, 1);
        assert_eq!(outcome.skipped_count, 1);
        assert_eq!(outcome.fallback_fetches, 1);
        assert_eq!(outcome.fallback_found, 1);
    }

    #[tokio::test]
    async fn test_duplicate_event_ids_are_counted_not_blocking() {
        let events = vec![
            event("e1", "k1", "tid#AB12cd34", "2025-03-20T09:00:00", "2025-03-20T10:00:00"),
            event("e1", "k2", "tid#AB12cd34", "2025-03-20T10:00:00", "2025-03-20T11:00:00"),
        ];
        let mut mapping = MappingStore::new();
        let outcome = plan_with(&events, &[], &mut mapping, &NoLookup).await;

        assert_eq!(outcome.duplicate_event_ids, 1);
        assert_eq!(outcome.creates().count(), 2);
    }

    #[tokio::test]
    async fn test_legacy_entries_rekeyed_before_planning() {
        let events = vec![event("old-id", "k1", "tid#AB12cd34", "2025-03-20T09:00:00", "2025-03-20T10:00:00")];
        let mut mapping = MappingStore::new();
        let mut legacy = BTreeMap::new();
        legacy.insert(
            "old-id".to_string(),
            MappingEntry {
                destination_id: "te-legacy".into(),
                metadata: EntryMetadata::default(),
                updated_at: None,
            },
        );
        mapping.legacy = Some(legacy);

        let records = vec![DestinationRecord {
            id: "te-legacy".into(),
            task_ref: Some("AB12cd34".into()),
            start: at(9, 0),
            stop: Some(at(10, 0)),
            duration: None,
            description: "Work on old-id".into(),
        }];

        let outcome = plan_with(&events, &records, &mut mapping, &NoLookup).await;

        assert_eq!(outcome.migrated, 1);
        assert!(outcome.ops.is_empty());
        assert_eq!(outcome.skipped_count, 1);
        assert!(mapping.legacy.is_none());
    }

    #[tokio::test]
    async fn test_outcome_serializes_for_reports() {
        let mut mapping = MappingStore::new();
        let outcome = plan_with(&standard_events(), &[], &mut mapping, &NoLookup).await;

        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value["ops"][0]["type"], "create");
        assert_eq!(value["ops"][0]["taskRef"], "AB12cd34");
        assert_eq!(value["unmatched"][0]["reason"], "no_task_id");
        assert_eq!(value["skippedCount"], 0);
    }
}
