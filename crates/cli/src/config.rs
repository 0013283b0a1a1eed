//! Command-line configuration.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::commands::{Command, CommandResult};

#[derive(Parser, Debug)]
#[command(name = "distnode", version, about = "Run nodes and call their services")]
pub struct CliConfig {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl CliConfig {
    /// Installs the fmt subscriber. `RUST_LOG` wins over `--verbose`.
    pub fn init_logging(&self) {
        let default = if self.verbose { "debug" } else { "info" };
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init();
    }

    pub async fn run(self) -> anyhow::Result<CommandResult> {
        self.command.run().await
    }
}
