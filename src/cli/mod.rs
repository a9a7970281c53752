//! Command-line interface
//!
//! Thin layer over the engine: argument parsing and validation, settings and
//! universe loading, provider/repository wiring, and the exit-status policy.
//! Validation failures exit with code 2 before any task is dispatched;
//! per-item failures degrade to partial success and exit 0.

pub mod backfill;
pub mod inject_csv;

use clap::{Args, Parser, Subcommand};

use crate::storage::ConflictPolicy;

/// Exit code for argument and date validation failures
pub const EXIT_VALIDATION: i32 = 2;

/// Backfill manager CLI
#[derive(Parser)]
#[command(name = "backfill-manager")]
#[command(about = "Market data backfilling operations")]
#[command(version)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Backfill a date range for tickers sequentially
    Specific(backfill::BackfillArgs),
    /// Concurrent multi-ticker backfill
    Concurrent(backfill::ConcurrentArgs),
    /// Inject previously downloaded CSV dumps into the store
    InjectCsv(inject_csv::InjectCsvArgs),
}

impl Cli {
    /// Logging level requested on whichever subcommand was used.
    pub fn log_level(&self) -> &str {
        match &self.command {
            Commands::Specific(args) => &args.shared.log_level,
            Commands::Concurrent(args) => &args.shared.log_level,
            Commands::InjectCsv(args) => &args.shared.log_level,
        }
    }
}

/// Flags shared by every command
#[derive(Args, Debug, Clone)]
pub struct SharedArgs {
    /// Start date DDMMYY, e.g. 040325 (default: 30 days before end)
    #[arg(long)]
    pub start: Option<String>,

    /// End date DDMMYY, e.g. 040325 (default: today)
    #[arg(long)]
    pub end: Option<String>,

    /// Explicit tickers (default: first entries of the universe file)
    #[arg(long, num_args = 1..)]
    pub tickers: Vec<String>,

    /// Exchange for tickers the universe cannot classify
    #[arg(long, default_value = "nasdaq")]
    pub exchange: String,

    /// Bar interval in minutes
    #[arg(long, default_value_t = 1)]
    pub interval: u32,

    /// Fetch and count but write nothing
    #[arg(long)]
    pub dry_run: bool,

    /// Duplicate (ticker, timestamp) handling
    #[arg(long, value_enum, default_value_t = ConflictPolicy::Fail)]
    pub on_conflict: ConflictPolicy,

    /// Logging level
    #[arg(long, default_value = "INFO", value_parser = ["DEBUG", "INFO", "WARNING", "ERROR"])]
    pub log_level: String,
}

/// Map the CLI level names onto tracing directives.
pub fn tracing_directive(level: &str) -> &'static str {
    match level {
        "DEBUG" => "debug",
        "WARNING" => "warn",
        "ERROR" => "error",
        _ => "info",
    }
}
