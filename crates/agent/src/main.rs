#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Washboard display agent: polls the daemon on a jittered schedule and
//! renders a flicker-free machine grid in the terminal.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use washboard_core::jitter::PollWindow;

mod export;
mod poll;
mod view;

#[derive(Debug, Parser)]
#[command(name = "washboard-agent", version, about = "Display client for the washboard daemon")]
struct Cli {
    /// Daemon base URL, e.g. http://127.0.0.1:8088
    #[arg(long, default_value = "http://127.0.0.1:8088")]
    daemon_url: String,

    /// Client identifier (stable string). If omitted, a random UUID is used.
    #[arg(long)]
    client_id: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Poll machine state and render the status grid.
    Watch {
        /// Shortest delay between polls, in milliseconds.
        #[arg(long, default_value_t = 30_000)]
        poll_min_ms: u64,

        /// Longest delay between polls, in milliseconds.
        #[arg(long, default_value_t = 60_000)]
        poll_max_ms: u64,

        /// Poll once, render, and exit.
        #[arg(long, default_value_t = false)]
        once: bool,
    },
    /// Export recent transactions with per-transaction detail.
    Export {
        /// Directory export bundles are written under.
        #[arg(long, default_value = ".washboard/exports")]
        out_dir: std::path::PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let client_id = cli
        .client_id
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    match cli.command {
        Command::Watch {
            poll_min_ms,
            poll_max_ms,
            once,
        } => {
            let window = PollWindow::new(poll_min_ms, poll_max_ms);
            poll::watch(&cli.daemon_url, &client_id, window, once).await
        }
        Command::Export { out_dir } => export::run(&cli.daemon_url, &client_id, &out_dir).await,
    }
}
