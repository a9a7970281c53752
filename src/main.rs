//! Backfill manager CLI
//!
//! Provides commands for:
//! - `specific`: sequential backfill over a date range
//! - `concurrent`: concurrent multi-ticker backfill
//! - `inject-csv`: inject previously downloaded CSV dumps

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use backfill_manager::cli::{self, Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // Argument errors exit with code 2 via clap before anything else runs
    let cli = Cli::parse();

    // Initialize logging at the requested level; RUST_LOG still wins
    let directive = format!(
        "backfill_manager={}",
        cli::tracing_directive(cli.log_level())
    );
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(directive.parse()?))
        .init();

    // Load environment variables from .env file
    dotenv::dotenv().ok();

    // Execute command
    match cli.command {
        Commands::Specific(args) => {
            cli::backfill::execute_specific(args).await?;
        }
        Commands::Concurrent(args) => {
            cli::backfill::execute_concurrent(args).await?;
        }
        Commands::InjectCsv(args) => {
            cli::inject_csv::execute(args).await?;
        }
    }

    Ok(())
}
