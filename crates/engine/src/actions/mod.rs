// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Action registry and the builtin action set.
//!
//! An action is a unit of behaviour attached to a state. Its contract is
//! one operation: `run(config, ctx, runtime)` returning the name of an
//! event to feed back into the interpreter, or `None` to let the next
//! action in the list run. The event name for each outcome slot
//! (`success`, `empty`, `already_claimed`, …) comes from the action's
//! declarative config, which is why the same action is reusable across
//! machines without code changes.
//!
//! The registry is a plain table from type name to implementation plus
//! per-type config defaults. Custom shell-backed actions loaded from an
//! actions directory register into the same table.

mod jobs;
mod list;
mod send;
mod shell;
mod spawn;
mod wait;

pub use shell::run_with_timeout;
pub use spawn::build_child_context;

use crate::broadcast::BroadcastWriter;
use crate::error::ActionError;
use async_trait::async_trait;
use machina_core::{Clock, Context};
use machina_store::Store;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Dependencies an action may touch.
pub struct ActionRuntime<C: Clock> {
    pub store: Arc<Store<C>>,
    pub broadcast: Arc<BroadcastWriter>,
    pub clock: C,
    pub machine_name: String,
    /// Prefix for sibling control sockets (`{prefix}-{name}.sock`).
    pub control_prefix: PathBuf,
    /// Broadcast socket path, forwarded to spawned children.
    pub event_socket_path: PathBuf,
    /// Database path, forwarded to spawned children.
    pub database_path: PathBuf,
    /// Binary to exec for child machines (normally the current exe).
    pub engine_bin: PathBuf,
}

/// Interpolated action configuration with typed accessors.
#[derive(Debug, Clone, Default)]
pub struct ActionConfig {
    map: Map<String, Value>,
}

impl ActionConfig {
    /// Wrap an interpolated config value. Non-objects become empty.
    pub fn new(value: Value) -> Self {
        match value {
            Value::Object(map) => Self { map },
            _ => Self::default(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.map.get(key)
    }

    /// String form of a scalar config value (numbers and bools render).
    pub fn string(&self, key: &str) -> Option<String> {
        match self.map.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    pub fn require_string(&self, key: &'static str) -> Result<String, ActionError> {
        self.string(key).ok_or(ActionError::MissingConfig(key))
    }

    pub fn u64(&self, key: &str) -> Option<u64> {
        self.map.get(key).and_then(Value::as_u64)
    }

    pub fn f64(&self, key: &str) -> Option<f64> {
        self.map.get(key).and_then(Value::as_f64)
    }

    /// The user-chosen event name for an outcome slot, if configured.
    pub fn outcome(&self, slot: &str) -> Option<String> {
        self.string(slot)
    }
}

/// A named unit of behaviour attached to a state.
#[async_trait]
pub trait Action<C: Clock>: Send + Sync {
    async fn run(
        &self,
        config: &ActionConfig,
        ctx: &mut Context,
        rt: &ActionRuntime<C>,
    ) -> Result<Option<String>, ActionError>;
}

struct Entry<C: Clock> {
    action: Arc<dyn Action<C>>,
    /// Per-type config defaults merged under the state's declared config
    /// before interpolation (used by custom shell actions).
    defaults: Map<String, Value>,
}

/// Table from action type name to implementation.
pub struct Registry<C: Clock> {
    entries: HashMap<String, Entry<C>>,
}

impl<C: Clock + 'static> Registry<C> {
    /// Registry with the builtin action set.
    pub fn builtin() -> Self {
        let mut registry = Self {
            entries: HashMap::new(),
        };
        registry.register("get_pending_jobs", Arc::new(jobs::GetPendingJobs));
        registry.register("claim_job", Arc::new(jobs::ClaimJob));
        registry.register("check_database_queue", Arc::new(jobs::CheckDatabaseQueue));
        registry.register("complete_job", Arc::new(jobs::CompleteJob));
        registry.register("fail_job", Arc::new(jobs::FailJob));
        registry.register("pop_from_list", Arc::new(list::PopFromList));
        registry.register("add_to_list", Arc::new(list::AddToList));
        registry.register("start_fsm", Arc::new(spawn::StartFsm));
        registry.register("wait_for_jobs", Arc::new(wait::WaitForJobs));
        registry.register("send_event", Arc::new(send::SendEvent));
        registry.register("bash", Arc::new(shell::Bash));
        registry.register("log", Arc::new(shell::Log));
        registry
    }

    pub fn register(&mut self, name: impl Into<String>, action: Arc<dyn Action<C>>) {
        self.register_with_defaults(name, action, Map::new());
    }

    pub fn register_with_defaults(
        &mut self,
        name: impl Into<String>,
        action: Arc<dyn Action<C>>,
        defaults: Map<String, Value>,
    ) {
        self.entries.insert(name.into(), Entry { action, defaults });
    }

    /// Scan a directory of YAML definitions for custom shell actions.
    ///
    /// Each file declares `{name, command, timeout_seconds?}` and
    /// registers a `bash`-backed action under `name`. Unreadable files
    /// warn and are skipped so one bad definition doesn't take the
    /// engine down. Returns how many actions were registered.
    pub fn load_actions_dir(&mut self, dir: &Path) -> std::io::Result<usize> {
        let mut registered = 0;
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            let is_yaml = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e == "yaml" || e == "yml");
            if !is_yaml {
                continue;
            }
            match load_custom_def(&path) {
                Ok(def) => {
                    tracing::info!(name = %def.name, path = %path.display(), "registered custom action");
                    let mut defaults = Map::new();
                    defaults.insert("command".to_string(), Value::String(def.command));
                    if let Some(timeout) = def.timeout_seconds {
                        defaults.insert("timeout_seconds".to_string(), Value::from(timeout));
                    }
                    self.register_with_defaults(def.name, Arc::new(shell::Bash), defaults);
                    registered += 1;
                }
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "skipping bad action definition");
                }
            }
        }
        Ok(registered)
    }

    /// Registered type names, for descriptor validation.
    pub fn names(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }

    pub fn get(&self, name: &str) -> Option<(Arc<dyn Action<C>>, &Map<String, Value>)> {
        self.entries
            .get(name)
            .map(|entry| (Arc::clone(&entry.action), &entry.defaults))
    }
}

#[derive(Debug, Deserialize)]
struct CustomActionDef {
    name: String,
    command: String,
    #[serde(default)]
    timeout_seconds: Option<u64>,
}

fn load_custom_def(path: &Path) -> Result<CustomActionDef, String> {
    let text = std::fs::read_to_string(path).map_err(|e| e.to_string())?;
    serde_yaml::from_str(&text).map_err(|e| e.to_string())
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
