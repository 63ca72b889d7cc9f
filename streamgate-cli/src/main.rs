//! Streamgate CLI - Command-line interface
//!
//! Runs the HTTP service, resolves single sources and verifies the local
//! setup.

mod commands;

use std::path::Path;

use clap::Parser;
use streamgate_core::tracing_setup::{CliLogLevel, init_tracing};

#[derive(Parser)]
#[command(name = "streamgate")]
#[command(about = "Resolve media sources to direct stream URLs")]
struct Cli {
    /// Console log level
    #[arg(long, global = true, default_value = "info")]
    log_level: CliLogLevel,

    #[command(subcommand)]
    command: commands::Commands,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_tracing_level(), Some(Path::new("logs")))?;

    commands::handle_command(cli.command).await
}
