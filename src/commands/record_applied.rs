use std::path::Path;

use anyhow::Result;
use caltrack_core::SyncConfig;
use caltrack_core::mapping::MappingStore;
use caltrack_core::plan::Operation;
use owo_colors::OwoColorize;
use tracing::{info, warn};

use super::mapping_file;
use crate::report::{self, AppliedOp, DryRunReport};

/// Origin recorded on mapping entries written by this command.
const ORIGIN: &str = "caltrack";

#[derive(Debug, Default, PartialEq, Eq)]
pub struct RecordSummary {
    pub recorded: usize,
    pub not_in_report: usize,
    pub rejected: usize,
}

/// Record every applied operation found in `ops`, matched by source key.
/// A plan holds at most one operation per key.
pub fn record_all(ops: &[Operation], applied: &[AppliedOp], mapping: &mut MappingStore) -> RecordSummary {
    let mut result = RecordSummary::default();

    for done in applied {
        let Some(op) = ops.iter().find(|op| op.source_key() == done.source_key) else {
            warn!(source_key = %done.source_key, "Applied operation not in report");
            result.not_in_report += 1;
            continue;
        };

        if mapping.record_applied(op, done.destination_id.as_deref(), ORIGIN) {
            result.recorded += 1;
        } else {
            warn!(source_key = %done.source_key, "Could not record applied operation");
            result.rejected += 1;
        }
    }

    result
}

pub fn run(config: &SyncConfig, report_path: &Path, applied_path: &Path) -> Result<()> {
    let report = DryRunReport::load(report_path)?;
    let applied = report::load_applied(applied_path)?;

    let file = mapping_file(config)?;
    let mut mapping = file.load();

    let result = record_all(&report.ops, &applied, &mut mapping);
    file.save(&mapping)?;

    info!(file = %file.path().display(), recorded = result.recorded, "Mapping saved");
    println!(
        "{} {}",
        format!("Recorded {} operations", result.recorded).green(),
        format!("({} not in report, {} rejected)", result.not_in_report, result.rejected).dimmed()
    );

    Ok(())
}
