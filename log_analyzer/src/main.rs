use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};

use log_analyzer::{app, config::Config, logging};

/// Build a latency report from the newest unprocessed nginx log.
#[derive(Parser, Debug)]
#[command(name = "log_analyzer", version)]
struct Cli {
    /// JSON config file; missing keys fall back to defaults
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;
    logging::init(config.log_file.as_deref())?;

    info!("START");
    match app::run(&config) {
        Ok(outcome) => info!(?outcome, "run finished"),
        Err(err) => error!("Run failed: {err:#}"),
    }

    if let Err(err) = app::write_timestamp(&config.ts_dir) {
        error!("{err:#}");
    }
    info!("DONE");

    Ok(())
}
