//! Calendar events as delivered by the source system.
//!
//! The shape follows the Graph calendar view payload (camelCase keys,
//! `start`/`end` as `{ dateTime, timeZone }` pairs). Only the fields the
//! planner needs are modeled; everything else is ignored on deserialize.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::CalTrackResult;

/// A calendar event from the source system.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceEvent {
    /// Volatile id. May change between recurrence expansions.
    pub id: String,
    #[serde(rename = "iCalUId", default, skip_serializing_if = "Option::is_none")]
    pub ical_uid: Option<String>,
    /// Older snapshots carried the stable key under `uid`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub series_master_id: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<EventBody>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_preview: Option<String>,
    #[serde(default)]
    pub start: Option<EventDateTime>,
    #[serde(default)]
    pub end: Option<EventDateTime>,
    #[serde(default)]
    pub categories: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventBody {
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

/// A wall-clock time plus the zone it is expressed in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDateTime {
    pub date_time: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
}

impl EventDateTime {
    pub fn new(date_time: &str, time_zone: Option<&str>) -> Self {
        EventDateTime {
            date_time: date_time.to_string(),
            time_zone: time_zone.map(String::from),
        }
    }

    /// Resolve to an absolute instant.
    ///
    /// Values with an explicit offset are taken as-is. Offset-less values are
    /// read in `time_zone` (UTC when absent). Returns None for anything that
    /// cannot be resolved, including unknown zone names.
    pub fn to_utc(&self) -> Option<DateTime<Utc>> {
        let raw = self.date_time.trim();
        if raw.is_empty() {
            return None;
        }

        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc));
        }

        let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").ok()?;

        match self.time_zone.as_deref().map(str::trim) {
            None | Some("") => Some(naive.and_utc()),
            Some(name) if name.eq_ignore_ascii_case("utc") => Some(naive.and_utc()),
            Some(name) => {
                let tz: Tz = name.parse().ok()?;
                tz.from_local_datetime(&naive)
                    .earliest()
                    .map(|dt| dt.with_timezone(&Utc))
            }
        }
    }
}

impl SourceEvent {
    /// The reconciliation identity. Prefers `iCalUId`, falls back to the
    /// legacy `uid` field. Never the volatile `id`.
    pub fn stable_key(&self) -> Option<&str> {
        self.ical_uid
            .as_deref()
            .filter(|k| !k.is_empty())
            .or_else(|| self.uid.as_deref().filter(|k| !k.is_empty()))
    }

    pub fn subject(&self) -> &str {
        self.subject.as_deref().unwrap_or_default()
    }

    /// Raw body markup: the full body when present, else the preview.
    pub fn body_markup(&self) -> &str {
        self.body
            .as_ref()
            .and_then(|b| b.content.as_deref())
            .filter(|c| !c.is_empty())
            .or(self.body_preview.as_deref())
            .unwrap_or_default()
    }

    pub fn has_category(&self, category: &str) -> bool {
        self.categories
            .iter()
            .any(|c| c.eq_ignore_ascii_case(category))
    }
}

/// Keep only events tagged with `category`. No category means no filtering.
pub fn filter_by_category(events: Vec<SourceEvent>, category: Option<&str>) -> Vec<SourceEvent> {
    match category {
        Some(cat) if !cat.is_empty() => events.into_iter().filter(|e| e.has_category(cat)).collect(),
        _ => events,
    }
}

/// Staged event files come in a few shapes: a bare array, a Graph
/// response (`{ "value": [...] }`) or a fetch snapshot (`{ "events": [...] }`).
#[derive(Deserialize)]
#[serde(untagged)]
enum EventBatch {
    Bare(Vec<SourceEvent>),
    Graph { value: Vec<SourceEvent> },
    Snapshot { events: Vec<SourceEvent> },
}

/// Parse a staged event file.
pub fn events_from_json(json: &str) -> CalTrackResult<Vec<SourceEvent>> {
    let batch: EventBatch = serde_json::from_str(json)?;
    Ok(match batch {
        EventBatch::Bare(events) => events,
        EventBatch::Graph { value } => value,
        EventBatch::Snapshot { events } => events,
    })
}
