//! Mediagate CLI - Command-line interface
//!
//! Runs the media gateway and inspects its configuration.

mod commands;

use std::path::PathBuf;

use clap::Parser;
use mediagate_core::tracing_setup::{CliLogLevel, init_tracing};

#[derive(Parser)]
#[command(name = "mediagate")]
#[command(about = "A media download and derived-image gateway")]
struct Cli {
    /// Console log level
    #[arg(long, value_enum, default_value_t = CliLogLevel::Info, global = true)]
    log_level: CliLogLevel,

    /// Directory for the per-run trace log, overrides `[logging] logs_dir`
    #[arg(long, global = true)]
    logs_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: commands::Commands,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let logs_dir = commands::resolve_logs_dir(cli.logs_dir, &cli.command)?;
    init_tracing(cli.log_level.as_tracing_level(), &logs_dir)?;

    commands::handle_command(cli.command).await
}
