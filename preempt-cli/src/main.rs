//! Preempt CLI - Command-line interface
//!
//! Runs priority-preemption queueing scenarios from JSON files or presets.

mod commands;

use std::path::PathBuf;

use anyhow::anyhow;
use clap::Parser;
use preempt_core::tracing_setup::{CliLogLevel, init_tracing};

#[derive(Parser)]
#[command(name = "preempt")]
#[command(about = "Discrete-event simulator for M/G/1 priority queues with preemption")]
struct Cli {
    /// Console log level (the full trace always goes to the log file)
    #[arg(long, global = true, value_enum, default_value_t = CliLogLevel::Warn)]
    log_level: CliLogLevel,

    /// Directory for the per-run debug log
    #[arg(long, global = true)]
    logs_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: commands::Commands,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_tracing_level(), cli.logs_dir.as_deref())
        .map_err(|e| anyhow!("Failed to initialize logging: {e}"))?;

    commands::handle_command(cli.command)
}
