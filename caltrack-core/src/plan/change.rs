//! Tolerance-based comparison of planned values against what the destination
//! holds (or last held).

use chrono::{DateTime, TimeDelta, Utc};

use crate::mapping::Snapshot;
use crate::plan::operation::{Field, FieldChange, PlannedEntry};
use crate::record::DestinationRecord;

/// Instants and durations within this distance are equal. Both systems round
/// their clocks differently.
pub const TOLERANCE: TimeDelta = TimeDelta::milliseconds(1000);

/// The comparable side of a destination record or a stored snapshot.
#[derive(Debug, Clone)]
pub struct Recorded<'a> {
    pub start: DateTime<Utc>,
    /// None when the destination holds neither a stop nor a duration.
    pub stop: Option<DateTime<Utc>>,
    pub duration: Option<TimeDelta>,
    pub task_ref: Option<&'a str>,
    pub description: &'a str,
}

impl<'a> From<&'a DestinationRecord> for Recorded<'a> {
    fn from(record: &'a DestinationRecord) -> Self {
        Recorded {
            start: record.start,
            stop: record.effective_stop(),
            duration: record.effective_duration(),
            task_ref: record.task_ref.as_deref().filter(|t| !t.is_empty()),
            description: &record.description,
        }
    }
}

impl<'a> From<&'a Snapshot> for Recorded<'a> {
    fn from(snapshot: &'a Snapshot) -> Self {
        Recorded {
            start: snapshot.start,
            stop: Some(snapshot.stop),
            duration: Some(snapshot.duration),
            task_ref: Some(snapshot.task_ref.as_str()).filter(|t| !t.is_empty()),
            description: &snapshot.description,
        }
    }
}

fn within(a: TimeDelta) -> bool {
    a.abs() <= TOLERANCE
}

fn millis(delta: TimeDelta) -> String {
    delta.num_milliseconds().to_string()
}

/// Fields on which `recorded` differs from `planned`. Empty means unchanged.
pub fn detect_changes(planned: &PlannedEntry, recorded: &Recorded<'_>) -> Vec<FieldChange> {
    let mut changes = Vec::new();

    if !within(recorded.start - planned.start) {
        changes.push(FieldChange {
            field: Field::Start,
            old: Some(recorded.start.to_rfc3339()),
            new: planned.start.to_rfc3339(),
        });
    }

    match recorded.stop {
        Some(stop) if within(stop - planned.end) => {}
        stop => changes.push(FieldChange {
            field: Field::Stop,
            old: stop.map(|s| s.to_rfc3339()),
            new: planned.end.to_rfc3339(),
        }),
    }

    if let Some(duration) = recorded.duration
        && !within(duration - planned.duration)
    {
        changes.push(FieldChange {
            field: Field::Duration,
            old: Some(millis(duration)),
            new: millis(planned.duration),
        });
    }

    if let Some(task_ref) = recorded.task_ref
        && task_ref != planned.task_ref
    {
        changes.push(FieldChange {
            field: Field::TaskRef,
            old: Some(task_ref.to_string()),
            new: planned.task_ref.clone(),
        });
    }

    let description = planned.description.trim();
    if recorded.description.trim() != description {
        changes.push(FieldChange {
            field: Field::Description,
            old: Some(recorded.description.trim().to_string()),
            new: description.to_string(),
        });
    }

    changes
}
