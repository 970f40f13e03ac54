//! bootgridd: the bootgrid daemon.
//!
//! # Usage
//!
//! ```text
//! bootgridd local --executable ./bootgrid-worker --workers 3 \
//!     --host h1=10.0.0.1 --host h2=10.0.0.2 --host h3=10.0.0.3
//! bootgridd discover
//! ```
//!
//! Deployment toggles come from the environment: `MESOS_CHECKPOINT`,
//! `MESOS_AUTHENTICATE`, `DEFAULT_PRINCIPAL`, `DEFAULT_SECRET`.

mod local_mode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use bootgrid_executor::{Discovery, SystemDiscovery};

const DEFAULT_LOG_FILTER: &str = "info,bootgridd=debug,bootgrid=debug";

#[derive(Parser)]
#[command(name = "bootgridd", about = "bootgrid daemon")]
struct Cli {
    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a full deployment against the in-process cluster.
    Local(local_mode::LocalArgs),

    /// Print this host's telemetry as JSON.
    Discover {
        /// Address used to pick the outbound interface.
        #[arg(long)]
        probe: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match cli.command {
        Command::Local(args) => {
            let code = local_mode::run_local(args).await?;
            std::process::exit(code);
        }
        Command::Discover { probe } => discover(probe),
    }
}

fn init_tracing(json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn discover(probe: Option<String>) -> anyhow::Result<()> {
    let mut discovery = SystemDiscovery::new();
    if let Some(addr) = probe {
        discovery = discovery.with_probe_addr(addr);
    }
    let telemetry = discovery.discover()?;
    println!("{}", String::from_utf8_lossy(&telemetry.to_bytes()?));
    Ok(())
}
