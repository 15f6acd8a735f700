use anyhow::Result;
use caltrack_core::{SyncConfig, SyncWindow};
use chrono::Utc;
use owo_colors::OwoColorize;

use crate::render::Render;

pub fn run(config: &SyncConfig) -> Result<()> {
    let window = SyncWindow::from_config(Utc::now(), &config.window)?;
    let padding = config.window.padding()?;
    let (start, end) = window.padded(padding);

    println!("{}", "Window".bold());
    println!("  Events:       {}", window.render());
    println!("  Time entries: {} → {}", start.to_rfc3339(), end.to_rfc3339());
    if let Some(date) = config.window.hard_start_date {
        println!("  {}", format!("(hard start date {})", date).dimmed());
    } else {
        println!(
            "  {}",
            format!("(last {} months)", config.window.active_window_months).dimmed()
        );
    }

    Ok(())
}
