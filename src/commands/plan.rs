use std::path::PathBuf;

use anyhow::Result;
use caltrack_core::event::{SourceEvent, filter_by_category};
use caltrack_core::plan::{NoLookup, PlanOutcome, Planner, RecordIndex, RecordLookup};
use caltrack_core::record::DestinationRecord;
use caltrack_core::transform::{SubjectTransform, TrimTransform};
use caltrack_core::{Extractor, MappingStore, SyncConfig, SyncWindow};
use chrono::Utc;
use owo_colors::OwoColorize;
use tracing::{info, warn};

use super::mapping_file;
use crate::render::{Render, render_plan, render_summary};
use crate::report::{self, DryRunReport};

/// How many unmatched events are logged individually.
const UNMATCHED_LOG_LIMIT: usize = 10;

pub struct PlanArgs {
    pub events: PathBuf,
    pub records: PathBuf,
    pub lookup: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub verbose: bool,
}

pub async fn run(config: &SyncConfig, args: PlanArgs) -> Result<()> {
    let window = SyncWindow::from_config(Utc::now(), &config.window)?;
    let extractor = Extractor::from_config(&config.extract)?;
    let transform: Box<dyn SubjectTransform> = match config.transform.build() {
        Ok(transform) => transform,
        Err(e) => {
            warn!(error = %e, "Invalid subject transform, trimming only");
            Box::new(TrimTransform)
        }
    };

    let fetched = report::load_events(&args.events)?;
    let fetched_count = fetched.len();
    let events = filter_by_category(fetched, config.source.category.as_deref());
    if events.len() < fetched_count {
        info!(kept = events.len(), dropped = fetched_count - events.len(), "Filtered events by category");
    }

    let records = report::load_records(&args.records)?;

    let mapping_file = mapping_file(config)?;
    let mut mapping = mapping_file.load();

    let outcome = match &args.lookup {
        Some(path) => {
            let index = RecordIndex::new(report::load_records(path)?);
            plan_with(&extractor, transform.as_ref(), &index, &events, &records, &mut mapping).await
        }
        None => plan_with(&extractor, transform.as_ref(), &NoLookup, &events, &records, &mut mapping).await,
    };

    println!("{} {}", "Window".bold(), window.render().dimmed());
    println!("{}", render_plan(&outcome, args.verbose));
    println!("   {}", render_summary(&outcome));

    if args.verbose && !outcome.unmatched.is_empty() {
        println!();
        println!("{}", "Unmatched".bold());
        for unmatched in &outcome.unmatched {
            println!("   {}", unmatched.render());
        }
    } else {
        for unmatched in outcome.unmatched.iter().take(UNMATCHED_LOG_LIMIT) {
            warn!(id = %unmatched.id, reason = %unmatched.reason, subject = %unmatched.subject, "Unmatched event");
        }
    }

    if let Some(output) = &args.output {
        let report = DryRunReport::new(window, events.len(), records.len(), &outcome);
        report.save(output)?;
        info!(file = %output.display(), ops = outcome.ops.len(), "Dry run written");
    }

    Ok(())
}

async fn plan_with<L: RecordLookup>(
    extractor: &Extractor,
    transform: &dyn SubjectTransform,
    lookup: &L,
    events: &[SourceEvent],
    records: &[DestinationRecord],
    mapping: &mut MappingStore,
) -> PlanOutcome {
    Planner::new(extractor, transform, lookup)
        .plan(events, records, mapping)
        .await
}
