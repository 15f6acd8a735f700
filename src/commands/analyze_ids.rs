use std::collections::HashMap;
use std::path::Path;

use anyhow::Result;
use caltrack_core::plan::Operation;
use owo_colors::OwoColorize;

use crate::report::DryRunReport;

/// How many duplicates are listed per id kind.
const TOP_DUPLICATES: usize = 20;

#[derive(Debug, Default, PartialEq, Eq)]
pub struct Tally {
    pub unique: usize,
    /// Values seen more than once, most frequent first.
    pub duplicates: Vec<(String, usize)>,
}

fn tally<'a>(values: impl Iterator<Item = &'a str>) -> Tally {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for value in values.filter(|v| !v.is_empty()) {
        *counts.entry(value).or_default() += 1;
    }

    let unique = counts.len();
    let mut duplicates: Vec<(String, usize)> = counts
        .into_iter()
        .filter(|(_, n)| *n > 1)
        .map(|(v, n)| (v.to_string(), n))
        .collect();
    duplicates.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    duplicates.truncate(TOP_DUPLICATES);

    Tally { unique, duplicates }
}

pub fn analyze(report: &DryRunReport) -> (Tally, Tally) {
    let op_event_ids = report.ops.iter().filter_map(Operation::entry).map(|e| e.event_id.as_str());
    let unmatched_ids = report.unmatched.iter().map(|u| u.id.as_str());
    let event_ids = tally(op_event_ids.chain(unmatched_ids));

    // Deletes are keyed by mapping entries, not events
    let op_keys = report
        .ops
        .iter()
        .filter(|op| !op.is_delete())
        .map(Operation::source_key);
    let skipped_keys = report.skipped.iter().map(|s| s.source_key.as_str());
    let unmatched_keys = report.unmatched.iter().filter_map(|u| u.source_key.as_deref());
    let stable_keys = tally(op_keys.chain(skipped_keys).chain(unmatched_keys));

    (event_ids, stable_keys)
}

fn print_tally(label: &str, tally: &Tally) {
    println!("{} {}", label.bold(), format!("({} unique)", tally.unique).dimmed());
    if tally.duplicates.is_empty() {
        println!("   {}", "No duplicates".dimmed());
    }
    for (value, count) in &tally.duplicates {
        println!("   {} {}", value.yellow(), format!("×{}", count).dimmed());
    }
}

pub fn run(path: &Path) -> Result<()> {
    let report = DryRunReport::load(path)?;
    let (event_ids, stable_keys) = analyze(&report);

    print_tally("Event ids", &event_ids);
    println!();
    print_tally("Stable keys", &stable_keys);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tally_orders_by_count() {
        let values = ["a", "b", "a", "c", "b", "a", ""];
        let tally = tally(values.into_iter());

        assert_eq!(tally.unique, 3, "Empty values are ignored");
        assert_eq!(
            tally.duplicates,
            vec![("a".to_string(), 3), ("b".to_string(), 2)]
        );
    }

    #[test]
    fn test_analyze_report() {
        let json = r#"{
            "generatedAt": "2025-07-15T12:00:00Z",
            "window": { "start": "2025-04-15T12:00:00+00:00", "end": "2025-07-15T12:00:00Z" },
            "totals": { "events": 3, "records": 0, "creates": 2, "updates": 0, "deletes": 1,
                        "skipped": 0, "unmatched": 1, "orphans": 1, "fallbackFetches": 0, "fallbackFound": 0 },
            "ops": [
                { "type": "create", "eventId": "e1", "sourceKey": "k1", "taskRef": "AB12cd34",
                  "start": 1742461200000, "end": 1742464800000, "duration": 3600000,
                  "subject": "A", "description": "A" },
                { "type": "create", "eventId": "e1", "sourceKey": "k2", "taskRef": "AB12cd34",
                  "start": 1742464800000, "end": 1742468400000, "duration": 3600000,
                  "subject": "B", "description": "B" },
                { "type": "delete", "sourceKey": "k1", "destinationId": "te-1" }
            ],
            "unmatched": [
                { "id": "e3", "sourceKey": "k2", "subject": "C", "reason": "no_task_id" }
            ]
        }"#;
        let report: DryRunReport = serde_json::from_str(json).unwrap();

        let (event_ids, stable_keys) = analyze(&report);
        assert_eq!(event_ids.duplicates, vec![("e1".to_string(), 2)]);
        assert_eq!(stable_keys.unique, 2);
        assert_eq!(stable_keys.duplicates, vec![("k2".to_string(), 2)]);
    }
}
