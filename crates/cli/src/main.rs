//! CLI entry point for distnode.

use std::process::ExitCode;

use clap::Parser;
use cli::CliConfig;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let config = CliConfig::parse();
    config.init_logging();
    let result = config.run().await?;
    Ok(result.exit_code())
}
