mod commands;
mod opts;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::scan::ScanArgs;
use commands::serve::ServeArgs;
use commands::sync::SyncArgs;
use opts::GlobalOpts;

#[derive(Parser, Debug)]
#[command(name = "vmsync", version, about = "Hypervisor VM state reconciliation")]
struct Cli {
    #[command(flatten)]
    opts: GlobalOpts,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sync one host now, as on connect, and print the reconciliation messages
    Sync(SyncArgs),

    /// Verify VMs recorded as Unknown on one host
    Scan(ScanArgs),

    /// Track hosts, sync on connect/reconnect and accept state pushes
    Serve(ServeArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging();
    let opts = &cli.opts;

    match cli.command {
        Command::Sync(args) => commands::sync::cmd_sync(opts, &args).await,
        Command::Scan(args) => commands::scan::cmd_scan(opts, &args).await,
        Command::Serve(args) => commands::serve::cmd_serve(opts, &args).await,
    }
}

/// Log to stderr, filtered by `RUST_LOG` (default `info`).
fn setup_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_level(true)
        .init();
}
