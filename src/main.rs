mod commands;
mod render;
mod report;

use std::env;
use std::path::PathBuf;

use anyhow::Result;
use caltrack_core::SyncConfig;
use clap::{Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser)]
#[command(name = "caltrack")]
#[command(about = "Plan time entries from categorized calendar events without duplicating work")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Plan creates, updates and deletes from staged events and time entries
    Plan {
        /// Calendar events (JSON array, or an object with `value`)
        #[arg(long)]
        events: PathBuf,

        /// Time entries fetched for the window (JSON array, or an object with `data`)
        #[arg(long)]
        records: PathBuf,

        /// Time entries available for direct lookup by id
        #[arg(long)]
        lookup: Option<PathBuf>,

        /// Write the dry-run report here
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// List every operation instead of counts
        #[arg(short, long)]
        verbose: bool,
    },
    /// Show the sync window and the padded destination query bounds
    Window,
    /// List mapping entries whose events are gone
    Orphans {
        #[arg(long)]
        events: PathBuf,
    },
    /// Tally duplicate event ids and stable keys in a dry-run report
    AnalyzeIds {
        #[arg(long)]
        report: PathBuf,
    },
    /// Record operations the applier completed into the mapping
    RecordApplied {
        /// Dry-run report the operations came from
        #[arg(long)]
        report: PathBuf,

        /// Applier results: `[{ "sourceKey", "destinationId"? }]`
        #[arg(long)]
        applied: PathBuf,
    },
    /// Print the effective configuration and paths
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = SyncConfig::load()?;

    match cli.command {
        Commands::Plan {
            events,
            records,
            lookup,
            output,
            verbose,
        } => {
            let args = commands::plan::PlanArgs {
                events,
                records,
                lookup,
                output,
                verbose,
            };
            commands::plan::run(&config, args).await
        }
        Commands::Window => commands::window::run(&config),
        Commands::Orphans { events } => commands::orphans::run(&config, &events),
        Commands::AnalyzeIds { report } => commands::analyze_ids::run(&report),
        Commands::RecordApplied { report, applied } => {
            commands::record_applied::run(&config, &report, &applied)
        }
        Commands::Config => commands::config::run(&config),
    }
}

/// Logs go to stderr so rendered plans on stdout stay pipeable.
fn init_tracing() {
    let filter = EnvFilter::try_from_env("CALTRACK_LOG")
        .unwrap_or_else(|_| EnvFilter::new("caltrack=info,caltrack_core=info,warn"));

    let format = env::var("CALTRACK_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}
