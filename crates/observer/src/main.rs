// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! machinad - observer bridge daemon
//!
//! Binds the broadcast socket, accepts push subscribers over TCP, and
//! fans every record out with bounded per-subscriber latency.

use anyhow::Context as _;
use clap::Parser;
use machina_observer::{accept_loop, Bridge};
use std::path::PathBuf;
use std::time::Duration;
use tokio::net::TcpListener;

#[derive(Parser)]
#[command(
    name = "machinad",
    version,
    about = "Machina observer bridge - relays state changes to subscribers"
)]
struct Cli {
    /// Broadcast socket path shared with the engines
    #[arg(long, default_value = "/tmp/machina-events.sock")]
    event_socket_path: PathBuf,

    /// TCP address subscribers connect to
    #[arg(long, default_value = "127.0.0.1:9041")]
    listen: String,

    /// Per-subscriber send timeout in seconds
    #[arg(long, default_value_t = 2)]
    send_timeout_secs: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    setup_logging();

    let bridge = Bridge::bind(
        &cli.event_socket_path,
        Duration::from_secs(cli.send_timeout_secs),
    )
    .with_context(|| {
        format!(
            "cannot bind broadcast socket {}",
            cli.event_socket_path.display()
        )
    })?;

    let listener = TcpListener::bind(&cli.listen)
        .await
        .with_context(|| format!("cannot listen on {}", cli.listen))?;
    tracing::info!(listen = %cli.listen, "accepting subscribers");

    tokio::spawn(accept_loop(listener, bridge.subscribers()));
    bridge.spawn_watchdog();
    bridge.run().await?;
    Ok(())
}

fn setup_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}
