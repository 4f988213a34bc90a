//! Lookout CLI - lookout command

use anyhow::Result;
use clap::Parser;
use cli_lib::{daemon, logging, Cli};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Keep the guard alive so buffered file logs are flushed on exit
    let _guard = logging::init(cli.log_dir.as_deref())?;

    daemon::run(&cli.into()).await?;
    Ok(())
}
