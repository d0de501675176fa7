#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Washboard daemon: caches upstream laundry-room data and serves
//! conditional snapshots to display clients.

use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use clap::Parser;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cache;
mod config;
mod error;
mod gateway;
mod http;

use crate::config::Config;

#[derive(Parser, Debug)]
#[command(name = "washboard-daemon")]
struct Args {
    /// Listen address, e.g. 127.0.0.1:8088
    #[arg(long, default_value = "127.0.0.1:8088")]
    listen: SocketAddr,

    /// Path to the TOML config file.
    #[arg(long, default_value = "washboard.toml")]
    config: PathBuf,

    /// Write a starter config to --config and exit.
    #[arg(long, default_value_t = false)]
    init_config: bool,

    /// Log level (env-filter syntax).
    #[arg(long, default_value = "info")]
    log: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(args.log))
        .with(tracing_subscriber::fmt::layer())
        .init();

    if args.init_config {
        Config::default_local().save_to(&args.config)?;
        tracing::info!(path = %args.config.display(), "wrote starter config");
        return Ok(());
    }

    let cfg = Config::load_from(&args.config)?;
    let state = Arc::new(http::AppState::new(cfg)?);
    let app = http::router(state);

    tracing::info!(listen = %args.listen, "daemon starting");
    axum::serve(tokio::net::TcpListener::bind(args.listen).await?, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    tracing::info!("shutdown requested");
}
