use std::collections::HashSet;
use std::path::Path;

use anyhow::Result;
use caltrack_core::SyncConfig;
use caltrack_core::event::filter_by_category;
use owo_colors::OwoColorize;

use super::mapping_file;
use crate::report;

pub fn run(config: &SyncConfig, events: &Path) -> Result<()> {
    let events = filter_by_category(report::load_events(events)?, config.source.category.as_deref());

    let mut mapping = mapping_file(config)?.load();
    mapping.rekey_legacy(&events);

    let live_keys: HashSet<&str> = events.iter().filter_map(|e| e.stable_key()).collect();
    let orphans = mapping.find_orphans(&live_keys);

    if orphans.is_empty() {
        println!("{}", "No orphaned entries".dimmed());
        return Ok(());
    }

    for orphan in &orphans {
        println!(
            "{} {} {}",
            "-".red(),
            orphan.destination_id.red(),
            orphan.source_key.dimmed()
        );
    }
    println!(
        "{}",
        format!("{} of {} mapped entries have no live event", orphans.len(), mapping.len()).dimmed()
    );

    Ok(())
}
