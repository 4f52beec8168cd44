// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Child machine spawning.
//!
//! `start_fsm` launches a separate engine process on another descriptor
//! with a pre-populated context. The parent and child share nothing but
//! the database and the socket paths; completion is observed through the
//! job table, not process handles.

use super::{Action, ActionConfig, ActionRuntime};
use crate::error::ActionError;
use async_trait::async_trait;
use machina_core::{Clock, Context};
use serde_json::{Map, Value};
use std::process::Stdio;
use tokio::process::Command;

/// Initial-context payloads beyond this log a warning: the context rides
/// the child's command line.
const CONTEXT_WARN_BYTES: usize = 4096;

/// Assemble the child's initial context from `context_vars` entries.
///
/// Each entry is `name`, `a.b.c`, or `a.b.c as alias`. Dotted paths keep
/// their final segment as the child key unless aliased. Missing values
/// log a warning and are skipped, so the child sees them as absent, not
/// null.
pub fn build_child_context(ctx: &Context, context_vars: &[String]) -> Map<String, Value> {
    let mut child = Map::new();
    for entry in context_vars {
        let (path, alias) = match entry.split_once(" as ") {
            Some((path, alias)) => (path.trim(), alias.trim()),
            None => {
                let path = entry.trim();
                let key = path.rsplit('.').next().unwrap_or(path);
                (path, key)
            }
        };
        match ctx.get(path) {
            Some(value) => {
                child.insert(alias.to_string(), value.clone());
            }
            None => {
                tracing::warn!(path, "context var missing, not passed to child");
            }
        }
    }
    child
}

/// Spawn a child engine process with a pre-populated context.
///
/// Config: `yaml_path`, `machine_name`, `context_vars` (list of
/// `name` / `a.b.c` / `a.b.c as alias` entries).
pub struct StartFsm;

#[async_trait]
impl<C: Clock + 'static> Action<C> for StartFsm {
    async fn run(
        &self,
        config: &ActionConfig,
        ctx: &mut Context,
        rt: &ActionRuntime<C>,
    ) -> Result<Option<String>, ActionError> {
        let yaml_path = config.require_string("yaml_path")?;
        let machine_name = config.require_string("machine_name")?;
        let context_vars: Vec<String> = match config.get("context_vars") {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            Some(other) => {
                return Err(ActionError::InvalidConfig {
                    key: "context_vars",
                    message: format!("expected a list of strings, got {}", other),
                })
            }
            None => Vec::new(),
        };

        let child_ctx = build_child_context(ctx, &context_vars);
        let encoded = Value::Object(child_ctx).to_string();
        if encoded.len() > CONTEXT_WARN_BYTES {
            tracing::warn!(
                bytes = encoded.len(),
                machine = %machine_name,
                "initial context exceeds 4 KiB"
            );
        }

        let mut cmd = Command::new(&rt.engine_bin);
        cmd.arg(&yaml_path)
            .arg("--machine-name")
            .arg(&machine_name)
            .arg("--initial-context")
            .arg(&encoded)
            .arg("--database")
            .arg(&rt.database_path)
            .arg("--event-socket-path")
            .arg(&rt.event_socket_path)
            .arg("--control-socket-prefix")
            .arg(&rt.control_prefix)
            .stdin(Stdio::null())
            .stdout(Stdio::null());

        match cmd.spawn() {
            Ok(child) => {
                tracing::info!(
                    machine = %machine_name,
                    descriptor = %yaml_path,
                    pid = child.id().unwrap_or(0),
                    "spawned child machine"
                );
                Ok(config.outcome("success"))
            }
            Err(err) => {
                tracing::error!(machine = %machine_name, error = %err, "spawn failed");
                match config.outcome("error") {
                    Some(event) => Ok(Some(event)),
                    None => Err(ActionError::Spawn(err.to_string())),
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "spawn_tests.rs"]
mod tests;
