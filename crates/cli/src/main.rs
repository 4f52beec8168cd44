// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! machina - engine launcher
//!
//! Runs one machine instance: loads the descriptor, opens the shared
//! store, binds the machine's control socket, and enters the interpreter
//! loop until terminated.
//!
//! Exit codes: 0 clean stop, 1 config error, 2 runtime fatal.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod env;

use clap::Parser;
use machina_core::{Context, SystemClock};
use machina_engine::{Engine, EngineConfig, Registry};
use machina_store::Store;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Parser)]
#[command(
    name = "machina",
    version,
    about = "Machina - YAML-driven state machine engine"
)]
struct Cli {
    /// Path to the machine descriptor (YAML)
    descriptor: PathBuf,

    /// Instance identifier; also names the control socket
    #[arg(long)]
    machine_name: String,

    /// JSON object merged into the context at start
    #[arg(long)]
    initial_context: Option<String>,

    /// Broadcast socket path
    #[arg(long, default_value_os_t = env::default_event_socket())]
    event_socket_path: PathBuf,

    /// Per-machine control socket is PREFIX-NAME.sock
    #[arg(long, default_value_os_t = env::default_control_prefix())]
    control_socket_prefix: PathBuf,

    /// Extra directory of custom action definitions
    #[arg(long)]
    actions_dir: Option<PathBuf>,

    /// SQLite database path
    #[arg(long, default_value_os_t = env::default_database())]
    database: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    setup_logging(&cli.machine_name);

    let mut registry: Registry<SystemClock> = Registry::builtin();
    if let Some(actions_dir) = &cli.actions_dir {
        match registry.load_actions_dir(actions_dir) {
            Ok(count) => tracing::info!(count, dir = %actions_dir.display(), "custom actions loaded"),
            Err(err) => {
                tracing::error!(dir = %actions_dir.display(), error = %err, "cannot read actions dir");
                return ExitCode::from(1);
            }
        }
    }

    let def = match machina_descriptor::load_path(&cli.descriptor) {
        Ok(def) => def,
        Err(err) => {
            tracing::error!(error = %err, "descriptor rejected");
            return ExitCode::from(1);
        }
    };

    let initial_context = parse_initial_context(cli.initial_context.as_deref());

    let store = match Store::open(&cli.database, SystemClock) {
        Ok(store) => Arc::new(store),
        Err(err) => {
            tracing::error!(db = %cli.database.display(), error = %err, "cannot open database");
            return ExitCode::from(2);
        }
    };

    let engine_bin = std::env::current_exe().unwrap_or_else(|_| PathBuf::from("machina"));
    let config = EngineConfig {
        machine_name: cli.machine_name.clone(),
        database_path: cli.database.clone(),
        event_socket_path: cli.event_socket_path.clone(),
        control_socket_prefix: cli.control_socket_prefix.clone(),
        engine_bin,
    };

    let engine = match Engine::new(def, config, store, registry, SystemClock, initial_context) {
        Ok(engine) => engine,
        Err(machina_engine::EngineError::Descriptor(err)) => {
            tracing::error!(error = %err, "descriptor rejected");
            return ExitCode::from(1);
        }
        Err(err) => {
            tracing::error!(error = %err, "engine startup failed");
            return ExitCode::from(2);
        }
    };

    tracing::info!(
        machine = %cli.machine_name,
        descriptor = %cli.descriptor.display(),
        "machine starting"
    );

    match engine.run().await {
        Ok(reason) => {
            tracing::info!(?reason, "machine stopped");
            ExitCode::SUCCESS
        }
        Err(err) => {
            tracing::error!(error = %err, "machine failed");
            ExitCode::from(2)
        }
    }
}

/// Parse `--initial-context`. Malformed JSON logs an error and falls
/// back to an empty context rather than refusing to start.
fn parse_initial_context(raw: Option<&str>) -> Context {
    let Some(raw) = raw else {
        return Context::new();
    };
    match serde_json::from_str(raw) {
        Ok(serde_json::Value::Object(map)) => Context::from(map),
        Ok(other) => {
            tracing::error!(value = %other, "--initial-context must be a JSON object, ignoring");
            Context::new()
        }
        Err(err) => {
            tracing::error!(error = %err, "--initial-context is not valid JSON, ignoring");
            Context::new()
        }
    }
}

fn setup_logging(machine_name: &str) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
    tracing::debug!(machine = machine_name, "logging ready");
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;
