// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shell and logging conveniences.

use super::{Action, ActionConfig, ActionRuntime};
use crate::error::ActionError;
use async_trait::async_trait;
use machina_core::{BroadcastRecord, Clock, Context};
use serde_json::Value;
use std::process::Output;
use std::time::Duration;
use tokio::process::Command;

/// Safety-net timeout for user shell commands.
const SHELL_COMMAND_TIMEOUT: Duration = Duration::from_secs(600);

/// Run a subprocess command with a timeout.
///
/// Wraps `Command::output()` with `tokio::time::timeout`, converting
/// timeout expiration into a descriptive error message. The child process
/// is killed automatically if the timeout elapses.
pub async fn run_with_timeout(
    mut cmd: Command,
    timeout: Duration,
    description: &str,
) -> Result<Output, String> {
    cmd.kill_on_drop(true);
    match tokio::time::timeout(timeout, cmd.output()).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(io_err)) => Err(format!("{} failed: {}", description, io_err)),
        Err(_elapsed) => Err(format!(
            "{} timed out after {}s",
            description,
            timeout.as_secs()
        )),
    }
}

/// Run a shell command via `sh -c`.
///
/// Config: `command` (interpolated), `timeout_seconds?`, `store_as?`
/// (trimmed stdout). Exit 0 maps to `success`; a non-zero exit maps to
/// the configured `error` event, or escalates when none is configured.
pub struct Bash;

#[async_trait]
impl<C: Clock + 'static> Action<C> for Bash {
    async fn run(
        &self,
        config: &ActionConfig,
        ctx: &mut Context,
        _rt: &ActionRuntime<C>,
    ) -> Result<Option<String>, ActionError> {
        let command = config.require_string("command")?;
        let timeout = config
            .u64("timeout_seconds")
            .map(Duration::from_secs)
            .unwrap_or(SHELL_COMMAND_TIMEOUT);

        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(&command);

        let output = run_with_timeout(cmd, timeout, "shell command")
            .await
            .map_err(ActionError::Shell)?;

        if let Some(store_as) = config.string("store_as") {
            let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
            ctx.insert(store_as, Value::String(stdout));
        }

        if output.status.success() {
            Ok(config.outcome("success"))
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            tracing::warn!(
                command = %command,
                code = output.status.code().unwrap_or(-1),
                stderr = %stderr,
                "shell command exited non-zero"
            );
            match config.outcome("error") {
                Some(event) => Ok(Some(event)),
                None => Err(ActionError::Shell(format!(
                    "exit {}: {}",
                    output.status.code().unwrap_or(-1),
                    stderr
                ))),
            }
        }
    }
}

/// Emit a log line and an `activity_log` broadcast record.
///
/// Config: `message` (interpolated), `level?` (`debug|info|warn`,
/// default `info`). Usually configured with no outcome event, so the
/// next action in the list runs.
pub struct Log;

#[async_trait]
impl<C: Clock + 'static> Action<C> for Log {
    async fn run(
        &self,
        config: &ActionConfig,
        _ctx: &mut Context,
        rt: &ActionRuntime<C>,
    ) -> Result<Option<String>, ActionError> {
        let message = config.require_string("message")?;
        match config.string("level").as_deref() {
            Some("debug") => tracing::debug!(machine = %rt.machine_name, "{}", message),
            Some("warn") => tracing::warn!(machine = %rt.machine_name, "{}", message),
            _ => tracing::info!(machine = %rt.machine_name, "{}", message),
        }
        rt.broadcast.send(&BroadcastRecord::activity_log(
            rt.machine_name.clone(),
            message,
            rt.clock.epoch_secs(),
        ));
        Ok(config.outcome("success"))
    }
}

#[cfg(test)]
#[path = "shell_tests.rs"]
mod tests;
