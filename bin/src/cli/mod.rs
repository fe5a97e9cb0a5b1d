use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use simplelog::LevelFilter;

mod extract;
mod rasterize;

/// Reads account details, the bank name and transaction tables from scanned
/// bank statement PDFs.
#[derive(Parser)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Logging level.
    #[arg(long, default_value = "Warn")]
    log_level: LevelFilter,
}

#[derive(Subcommand)]
enum Command {
    Extract(extract::Command),
    Rasterize(rasterize::Command),
}

pub fn run() -> Result<()> {
    let args = Args::parse();

    simplelog::SimpleLogger::init(args.log_level, simplelog::Config::default())
        .with_context(|| "configuring logging")?;

    use Command::*;
    match &args.command {
        Extract(cmd) => extract::run(cmd),
        Rasterize(cmd) => rasterize::run(cmd),
    }
}
