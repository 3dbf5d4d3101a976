//! fairbalance - Main Entry Point
//!
//! Rebalances demographic subgroups of a tabular dataset and verifies the
//! result with situation testing and group fairness metrics.

use clap::Parser;
use fairbalance::cli::{cmd_balance, cmd_info, cmd_run, Cli, Commands};

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fairbalance=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { data, balance, output, report, flag_only } => {
            cmd_run(&data, &balance, &output, report.as_deref(), flag_only)?;
        }
        Commands::Balance { data, balance, output } => {
            cmd_balance(&data, &balance, &output)?;
        }
        Commands::Info { data } => {
            cmd_info(&data)?;
        }
    }

    Ok(())
}
