//! Time-tracking entries as held by the destination system.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::CalTrackResult;

/// A time entry on the destination side.
///
/// On the wire (ClickUp style) instants and durations are epoch
/// milliseconds, sent either as numbers or as numeric strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "WireRecord", into = "WireRecord")]
pub struct DestinationRecord {
    pub id: String,
    pub task_ref: Option<String>,
    pub start: DateTime<Utc>,
    pub stop: Option<DateTime<Utc>>,
    pub duration: Option<TimeDelta>,
    pub description: String,
}

impl DestinationRecord {
    /// Stop instant, derived from start + duration when not stored.
    pub fn effective_stop(&self) -> Option<DateTime<Utc>> {
        self.stop
            .or_else(|| self.duration.map(|d| self.start + d))
    }

    /// Duration, derived from stop - start when not stored.
    pub fn effective_duration(&self) -> Option<TimeDelta> {
        self.duration.or_else(|| self.stop.map(|s| s - self.start))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum Flexible {
    Int(i64),
    Float(f64),
    Text(String),
}

impl Flexible {
    fn as_i64(&self) -> Option<i64> {
        match self {
            Flexible::Int(n) => Some(*n),
            Flexible::Float(f) if f.is_finite() => Some(f.round() as i64),
            Flexible::Float(_) => None,
            Flexible::Text(s) => s.trim().parse().ok(),
        }
    }

    fn as_text(&self) -> String {
        match self {
            Flexible::Int(n) => n.to_string(),
            Flexible::Float(f) => f.to_string(),
            Flexible::Text(s) => s.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireTask {
    id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireRecord {
    id: Flexible,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    task: Option<WireTask>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tid: Option<String>,
    start: Flexible,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    end: Option<Flexible>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    stop: Option<Flexible>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    duration: Option<Flexible>,
    #[serde(default)]
    description: Option<String>,
}

impl TryFrom<WireRecord> for DestinationRecord {
    type Error = String;

    fn try_from(wire: WireRecord) -> Result<Self, Self::Error> {
        let id = wire.id.as_text();

        let start = wire
            .start
            .as_i64()
            .and_then(DateTime::from_timestamp_millis)
            .ok_or_else(|| format!("time entry {}: unparsable start", id))?;

        let stop = wire
            .end
            .as_ref()
            .or(wire.stop.as_ref())
            .and_then(Flexible::as_i64)
            .and_then(DateTime::from_timestamp_millis);

        let duration = wire
            .duration
            .as_ref()
            .and_then(Flexible::as_i64)
            .and_then(TimeDelta::try_milliseconds);

        let task_ref = wire
            .task
            .map(|t| t.id)
            .or(wire.tid)
            .filter(|t| !t.is_empty());

        Ok(DestinationRecord {
            id,
            task_ref,
            start,
            stop,
            duration,
            description: wire.description.unwrap_or_default(),
        })
    }
}

impl From<DestinationRecord> for WireRecord {
    fn from(record: DestinationRecord) -> Self {
        WireRecord {
            id: Flexible::Text(record.id),
            task: record.task_ref.map(|id| WireTask { id }),
            tid: None,
            start: Flexible::Int(record.start.timestamp_millis()),
            end: record.stop.map(|s| Flexible::Int(s.timestamp_millis())),
            stop: None,
            duration: record.duration.map(|d| Flexible::Int(d.num_milliseconds())),
            description: Some(record.description),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RecordBatch {
    Bare(Vec<serde_json::Value>),
    Api { data: Vec<serde_json::Value> },
}

/// Parse a staged destination record file (a bare array or a `{ "data": [...] }`
/// API response). Entries that cannot be read are skipped with a warning.
pub fn records_from_json(json: &str) -> CalTrackResult<Vec<DestinationRecord>> {
    let batch: RecordBatch = serde_json::from_str(json)?;
    let raw = match batch {
        RecordBatch::Bare(values) => values,
        RecordBatch::Api { data } => data,
    };

    let records = raw
        .into_iter()
        .filter_map(|value| match serde_json::from_value::<DestinationRecord>(value) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(error = %e, "Skipping unreadable time entry");
                None
            }
        })
        .collect();

    Ok(records)
}
