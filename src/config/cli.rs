use crate::app::ExportTarget;
use crate::config::SettingsOverrides;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "woo-export")]
#[command(about = "Resumable exports of WooCommerce products, orders and activity logs to CSV")]
#[command(version)]
pub struct Cli {
    /// Sites file (JSON, or TOML when the extension is .toml)
    #[arg(long, global = true, default_value = "config.json")]
    pub config: PathBuf,

    /// Directory for CSV output and page checkpoints
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Log process CPU and memory after every page
    #[arg(long, global = true)]
    pub monitor: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Export a target, resuming from the last saved page
    Export(ExportArgs),
    /// Delete a target's CSV file and page checkpoint
    Reset(ResetArgs),
    /// List configured websites
    List,
}

#[derive(Debug, Args)]
pub struct ExportArgs {
    #[arg(value_enum)]
    pub target: ExportTarget,

    /// Website name from the sites file (defaults to its default_website, then the environment)
    #[arg(long)]
    pub website: Option<String>,

    /// Stop after at least this many records were written
    #[arg(long)]
    pub max_records: Option<usize>,

    /// Write the CSV here instead of the data directory
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Records requested per page (1-100)
    #[arg(long)]
    pub page_size: Option<u32>,

    /// Pause between pages in milliseconds
    #[arg(long)]
    pub delay_ms: Option<u64>,

    /// Request timeout in seconds
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    #[command(flatten)]
    pub activity: ActivityArgs,
}

/// Filters that only apply to the `activity` target.
#[derive(Debug, Args)]
pub struct ActivityArgs {
    /// Activity-log event id to export
    #[arg(long, default_value_t = 9073)]
    pub event: i64,

    /// Export every event id instead of --event
    #[arg(long)]
    pub all_events: bool,

    /// Only events from the last N days
    #[arg(long)]
    pub days: Option<u32>,

    /// Numeric user id or login name
    #[arg(long)]
    pub user: Option<String>,

    /// Database table prefix (overrides DATABASE_TABLE_PREFIX)
    #[arg(long)]
    pub prefix: Option<String>,
}

#[derive(Debug, Args)]
pub struct ResetArgs {
    #[arg(value_enum, required_unless_present = "all")]
    pub target: Option<ExportTarget>,

    /// Reset every target for the website
    #[arg(long, conflicts_with = "target")]
    pub all: bool,

    #[arg(long)]
    pub website: Option<String>,

    /// CSV path used by a previous `export --output`
    #[arg(short, long, conflicts_with = "all")]
    pub output: Option<PathBuf>,
}

impl ExportArgs {
    pub fn overrides(&self, data_dir: Option<PathBuf>) -> SettingsOverrides {
        SettingsOverrides {
            data_dir,
            page_size: self.page_size,
            page_delay_ms: self.delay_ms,
            request_timeout_secs: self.timeout_secs,
            max_records: self.max_records,
            output: self.output.clone(),
        }
    }
}

impl ResetArgs {
    pub fn targets(&self) -> Vec<ExportTarget> {
        match self.target {
            Some(target) if !self.all => vec![target],
            _ => ExportTarget::ALL.to_vec(),
        }
    }
}
