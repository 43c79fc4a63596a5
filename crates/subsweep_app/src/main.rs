//! `subsweep`: export channel subscriptions to CSV and unsubscribe in bulk.
mod cli;
mod commands;
mod report;
mod session;

use clap::Parser;
use log::LevelFilter;
use sweep_logging::LogDestination;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();
    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    sweep_logging::initialize(LogDestination::Both, level, &cli.log_file);
    commands::run(cli).await
}
