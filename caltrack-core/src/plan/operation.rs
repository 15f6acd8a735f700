//! Planner output types.

use std::fmt;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::event::SourceEvent;
use crate::mapping::Snapshot;

/// Why an operation was planned the way it was. Audit only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reason {
    /// Mapped entry not found anywhere and no snapshot to go by.
    MissingRemote,
    /// Entry not visible, snapshot differs: update the remembered id.
    SnapshotBased,
    /// Entry not visible, snapshot matches: assume it still exists.
    SnapshotMatch,
    /// Entry found in the bulk fetch, values match.
    Unchanged,
    /// Entry missed by the bulk fetch but found by direct lookup.
    FetchedDirect,
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Reason::MissingRemote => "missing_remote",
            Reason::SnapshotBased => "snapshot_based",
            Reason::SnapshotMatch => "snapshot_match",
            Reason::Unchanged => "unchanged",
            Reason::FetchedDirect => "fetched_direct",
        };
        write!(f, "{}", name)
    }
}

/// Values the destination entry should end up with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedEntry {
    pub event_id: String,
    pub source_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub series_master_id: Option<String>,
    pub task_ref: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub start: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub end: DateTime<Utc>,
    #[serde(with = "crate::serde_util::delta_millis")]
    pub duration: TimeDelta,
    pub subject: String,
    pub description: String,
}

impl PlannedEntry {
    /// What gets remembered in the mapping once this entry is written.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            start: self.start,
            stop: self.end,
            duration: self.duration,
            task_ref: self.task_ref.clone(),
            description: self.description.trim().to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Start,
    Stop,
    Duration,
    TaskRef,
    Description,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Field::Start => "Start",
            Field::Stop => "Stop",
            Field::Duration => "Duration",
            Field::TaskRef => "Task",
            Field::Description => "Description",
        };
        write!(f, "{}", name)
    }
}

/// One field that differs between the destination and the plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldChange {
    pub field: Field,
    pub old: Option<String>,
    pub new: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOp {
    #[serde(flatten)]
    pub entry: PlannedEntry,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<Reason>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOp {
    pub destination_id: String,
    #[serde(flatten)]
    pub entry: PlannedEntry,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<Reason>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub changes: Vec<FieldChange>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteOp {
    pub source_key: String,
    pub destination_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkipOp {
    pub source_key: String,
    pub destination_id: String,
    pub reason: Reason,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Operation {
    Create(CreateOp),
    Update(UpdateOp),
    Delete(DeleteOp),
    Skip(SkipOp),
}

impl Operation {
    pub fn source_key(&self) -> &str {
        match self {
            Operation::Create(op) => &op.entry.source_key,
            Operation::Update(op) => &op.entry.source_key,
            Operation::Delete(op) => &op.source_key,
            Operation::Skip(op) => &op.source_key,
        }
    }

    pub fn entry(&self) -> Option<&PlannedEntry> {
        match self {
            Operation::Create(op) => Some(&op.entry),
            Operation::Update(op) => Some(&op.entry),
            Operation::Delete(_) | Operation::Skip(_) => None,
        }
    }

    pub fn destination_id(&self) -> Option<&str> {
        match self {
            Operation::Create(_) => None,
            Operation::Update(op) => Some(&op.destination_id),
            Operation::Delete(op) => Some(&op.destination_id),
            Operation::Skip(op) => Some(&op.destination_id),
        }
    }

    pub fn reason(&self) -> Option<Reason> {
        match self {
            Operation::Create(op) => op.reason,
            Operation::Update(op) => op.reason,
            Operation::Delete(_) => None,
            Operation::Skip(op) => Some(op.reason),
        }
    }

    pub fn is_delete(&self) -> bool {
        matches!(self, Operation::Delete(_))
    }
}

/// Why an event was left out of planning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnmatchedReason {
    NoTaskId,
    MissingStableKey,
    MissingTime,
    NonPositiveDuration,
}

impl fmt::Display for UnmatchedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UnmatchedReason::NoTaskId => "no_task_id",
            UnmatchedReason::MissingStableKey => "missing_stable_key",
            UnmatchedReason::MissingTime => "missing_time",
            UnmatchedReason::NonPositiveDuration => "non_positive_duration",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Unmatched {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub series_master_id: Option<String>,
    pub subject: String,
    pub reason: UnmatchedReason,
}

impl Unmatched {
    pub fn new(event: &SourceEvent, reason: UnmatchedReason) -> Self {
        Unmatched {
            id: event.id.clone(),
            source_key: event.stable_key().map(String::from),
            series_master_id: event.series_master_id.clone(),
            subject: event.subject().to_string(),
            reason,
        }
    }
}
