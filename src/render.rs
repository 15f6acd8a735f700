//! Colored terminal rendering of planned operations.

use caltrack_core::SyncWindow;
use caltrack_core::plan::{FieldChange, Operation, PlanOutcome, PlannedEntry, Unmatched};
use chrono::{DateTime, TimeDelta, Utc};
use owo_colors::OwoColorize;

/// Extension trait for TUI rendering with colors.
pub trait Render {
    fn render(&self) -> String;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OpKind {
    Create,
    Update,
    Delete,
}

impl OpKind {
    fn of(op: &Operation) -> Option<Self> {
        match op {
            Operation::Create(_) => Some(OpKind::Create),
            Operation::Update(_) => Some(OpKind::Update),
            Operation::Delete(_) => Some(OpKind::Delete),
            Operation::Skip(_) => None,
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            OpKind::Create => "+",
            OpKind::Update => "~",
            OpKind::Delete => "-",
        }
    }

    fn colorize(self, text: &str) -> String {
        match self {
            OpKind::Create => text.green().to_string(),
            OpKind::Update => text.yellow().to_string(),
            OpKind::Delete => text.red().to_string(),
        }
    }
}

fn render_time(start: DateTime<Utc>, duration: TimeDelta) -> String {
    let minutes = duration.num_minutes();
    let length = if minutes % 60 == 0 {
        format!("{}h", minutes / 60)
    } else if minutes > 60 {
        format!("{}h{:02}m", minutes / 60, minutes % 60)
    } else {
        format!("{}m", minutes)
    };
    format!("{} ({})", start.format("%Y-%m-%d %H:%M"), length)
}

fn render_entry(kind: OpKind, entry: &PlannedEntry) -> String {
    let title = if entry.description.is_empty() {
        "(no subject)"
    } else {
        entry.description.as_str()
    };
    format!(
        "{} {} {} {}",
        kind.colorize(kind.symbol()),
        kind.colorize(title),
        format!("[{}]", entry.task_ref).dimmed(),
        render_time(entry.start, entry.duration).dimmed()
    )
}

impl Render for Operation {
    fn render(&self) -> String {
        match self {
            Operation::Create(create) => {
                let mut line = render_entry(OpKind::Create, &create.entry);
                if let Some(reason) = create.reason {
                    line.push_str(&format!(" {}", format!("({})", reason).dimmed()));
                }
                line
            }
            Operation::Update(update) => {
                let mut line = render_entry(OpKind::Update, &update.entry);
                if let Some(reason) = update.reason {
                    line.push_str(&format!(" {}", format!("({})", reason).dimmed()));
                }
                line
            }
            Operation::Delete(delete) => format!(
                "{} {} {}",
                OpKind::Delete.colorize("-"),
                OpKind::Delete.colorize(&delete.destination_id),
                format!("(event {} gone)", delete.source_key).dimmed()
            ),
            Operation::Skip(skip) => format!(
                "  {} {}",
                skip.destination_id.dimmed(),
                format!("({})", skip.reason).dimmed()
            ),
        }
    }
}

impl Render for FieldChange {
    fn render(&self) -> String {
        let old = self.old.as_deref().unwrap_or("(none)");
        format!(
            "{}: {} → {}",
            self.field.to_string().dimmed(),
            old.red(),
            self.new.green()
        )
    }
}

impl Render for Unmatched {
    fn render(&self) -> String {
        let subject = if self.subject.is_empty() {
            "(no subject)"
        } else {
            self.subject.as_str()
        };
        format!("{} {}", subject, format!("({})", self.reason).dimmed())
    }
}

impl Render for SyncWindow {
    fn render(&self) -> String {
        format!("{} → {}", self.start.to_rfc3339(), self.end.to_rfc3339())
    }
}

/// Threshold for compact view (show counts instead of individual operations)
const COMPACT_THRESHOLD: usize = 5;

/// Simple pluralization helper
fn pluralize(word: &str, count: usize) -> &str {
    if count == 1 {
        return word;
    }
    match word {
        "entry" => "entries",
        _ => word,
    }
}

/// Render the plan, using compact view if there are many operations and verbose is false
pub fn render_plan(outcome: &PlanOutcome, verbose: bool) -> String {
    if outcome.is_empty() {
        return "   Nothing to do".dimmed().to_string();
    }

    let mut lines = Vec::new();

    if verbose || outcome.ops.len() <= COMPACT_THRESHOLD {
        for op in &outcome.ops {
            lines.push(format!("   {}", op.render()));
            if let Operation::Update(update) = op {
                lines.extend(update.changes.iter().map(|c| format!("      {}", c.render())));
            }
        }
    } else {
        let count = |kind: OpKind| {
            outcome
                .ops
                .iter()
                .filter(|op| OpKind::of(op) == Some(kind))
                .count()
        };

        for (kind, adjective) in [
            (OpKind::Create, "new"),
            (OpKind::Update, "changed"),
            (OpKind::Delete, "deleted"),
        ] {
            let n = count(kind);
            if n > 0 {
                let label = format!("({} {} {})", n, adjective, pluralize("entry", n));
                lines.push(format!("   {} {}", kind.colorize(kind.symbol()), kind.colorize(&label)));
            }
        }
    }

    lines.join("\n")
}

/// One-line totals shown after the plan.
pub fn render_summary(outcome: &PlanOutcome) -> String {
    let mut parts = vec![
        format!("{} skipped", outcome.skipped_count),
        format!("{} unmatched", outcome.unmatched.len()),
    ];
    if outcome.fallback_fetches > 0 {
        parts.push(format!(
            "{} of {} direct lookups found",
            outcome.fallback_found, outcome.fallback_fetches
        ));
    }
    parts.join(", ").dimmed().to_string()
}
