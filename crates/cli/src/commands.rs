//! CLI commands.

use std::io::{self, BufRead, Write};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Args, Subcommand};
use tracing::info;

use corelib::serialization::{normalize_message, serialize};
use corelib::{Communicator, Error, NodeAddress, NodeConfig, Remote, Value};
use transport::{HttpTransport, Node};

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Call a service method on a remote node
    Send(SendArgs),
    /// Run a node until interrupted
    Serve(ServeArgs),
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Node address, e.g. http://127.0.0.1:8080
    #[arg(long)]
    pub node: String,

    /// Name of the service to call
    #[arg(long)]
    pub service: String,

    /// Method of the service to call
    #[arg(long)]
    pub method: String,

    /// Arguments as JSON: {"message": "param"} or {"message": ["p1", "p2"]}
    #[arg(long)]
    pub args: Option<String>,

    /// Send without asking for confirmation
    #[arg(short, long)]
    pub yes: bool,
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Node configuration as JSON, e.g. {"ip": "127.0.0.1", "port": 8080}
    #[arg(long)]
    pub config: Option<String>,

    /// Interface to listen on (overrides --config)
    #[arg(long)]
    pub ip: Option<String>,

    /// Port to listen on (overrides --config)
    #[arg(long)]
    pub port: Option<u16>,
}

/// Outcome of a command.
#[derive(Debug)]
pub enum CommandResult {
    /// The remote call succeeded.
    Response(Value),
    /// The remote call failed.
    Failed(Error),
    /// The operator declined to send.
    Cancelled,
    /// A served node shut down.
    Stopped,
}

impl CommandResult {
    pub fn exit_code(&self) -> ExitCode {
        match self {
            CommandResult::Failed(_) => ExitCode::FAILURE,
            _ => ExitCode::SUCCESS,
        }
    }
}

impl Command {
    pub async fn run(self) -> anyhow::Result<CommandResult> {
        match self {
            Command::Send(args) => send(args).await,
            Command::Serve(args) => serve(args).await,
        }
    }
}

/// Reads the `message` field of the JSON argument payload as an argument list.
///
/// No payload means no arguments; a missing `message` is one `undefined`
/// argument; a non-array message becomes a single argument.
pub fn parse_message(args: Option<&str>) -> anyhow::Result<Vec<Value>> {
    let Some(text) = args else {
        return Ok(Vec::new());
    };
    let json: serde_json::Value =
        serde_json::from_str(text).context("--args must be valid JSON")?;
    let serde_json::Value::Object(mut fields) = json else {
        bail!("--args must be a JSON object like {{\"message\": ...}}");
    };
    let message = fields
        .remove("message")
        .map(Value::from_json)
        .unwrap_or_default();
    Ok(normalize_message(message))
}

async fn send(args: SendArgs) -> anyhow::Result<CommandResult> {
    let node = NodeAddress::parse(&args.node)?;
    let message = parse_message(args.args.as_deref())?;
    let remote = Remote::new(node, args.service, args.method);

    if !args.yes && !confirm(&remote)? {
        println!("Request canceled.");
        return Ok(CommandResult::Cancelled);
    }

    let comm = Communicator::new(Arc::new(HttpTransport::new()));
    match comm.send(message, &remote).await {
        Ok(value) => {
            println!("Response: {}", serialize(&value));
            Ok(CommandResult::Response(value))
        }
        Err(err) => {
            match &err {
                Error::Remote(_) => eprintln!("Error: {}", serialize(&err.to_value())),
                other => eprintln!("Error: {}", other),
            }
            Ok(CommandResult::Failed(err))
        }
    }
}

fn confirm(remote: &Remote) -> anyhow::Result<bool> {
    print!(
        "Are you sure you want to send this request to '{}' method of '{}' service at {} ? [y/N] ",
        remote.method, remote.service, remote.node
    );
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}

/// Applies `--config`, then `--ip`/`--port` on top.
pub fn node_config(args: &ServeArgs) -> anyhow::Result<NodeConfig> {
    let mut config = match &args.config {
        Some(text) => NodeConfig::from_json(text)?,
        None => NodeConfig::default(),
    };
    if let Some(ip) = &args.ip {
        config.ip = ip.clone();
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    config.validate()?;
    Ok(config)
}

async fn serve(args: ServeArgs) -> anyhow::Result<CommandResult> {
    let config = node_config(&args)?;
    let node = Node::start(config).await?;
    println!("listening on {}", node.address());

    tokio::signal::ctrl_c()
        .await
        .context("waiting for ctrl-c")?;
    info!("interrupt received");
    node.stop().await;
    Ok(CommandResult::Stopped)
}
