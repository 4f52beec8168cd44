// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The validated machine descriptor.

use crate::error::ParseError;
use crate::guard::Guard;
use machina_core::Context;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

/// A single transition edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub from: String,
    pub to: String,
    pub event: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guard: Option<Guard>,
}

/// One action attached to a state: its registry type and the declarative
/// configuration it was given (everything but the `type` key).
#[derive(Debug, Clone, PartialEq)]
pub struct ActionSpec {
    pub action_type: String,
    pub config: Map<String, Value>,
}

impl ActionSpec {
    pub fn new(action_type: impl Into<String>, config: Map<String, Value>) -> Self {
        Self {
            action_type: action_type.into(),
            config,
        }
    }

    /// The config as a JSON value for interpolation.
    pub fn config_value(&self) -> Value {
        Value::Object(self.config.clone())
    }
}

/// Immutable, validated machine descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct MachineDef {
    pub name: String,
    pub initial_state: String,
    pub states: Vec<String>,
    pub events: Vec<String>,
    pub transitions: Vec<Transition>,
    /// Ordered entry-action lists per state.
    pub actions: BTreeMap<String, Vec<ActionSpec>>,
}

impl MachineDef {
    /// Find the transition for `(from, event)`, honoring guards.
    ///
    /// Guarded transitions are checked in declaration order; the first
    /// whose guard passes (or that has no guard) wins.
    pub fn find_transition(&self, from: &str, event: &str, ctx: &Context) -> Option<&Transition> {
        self.transitions
            .iter()
            .filter(|t| t.from == from && t.event == event)
            .find(|t| t.guard.as_ref().map(|g| g.eval(ctx)).unwrap_or(true))
    }

    /// Entry actions for a state (empty when none declared).
    pub fn entry_actions(&self, state: &str) -> &[ActionSpec] {
        self.actions.get(state).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The `timeout(N)` pseudo-event declared on this state, if any.
    ///
    /// Returns the timeout in seconds and the literal event name to
    /// enqueue when the timer fires.
    pub fn state_timeout(&self, state: &str) -> Option<(u64, &str)> {
        self.transitions
            .iter()
            .filter(|t| t.from == state)
            .find_map(|t| parse_timeout_event(&t.event).map(|secs| (secs, t.event.as_str())))
    }

    /// Check every declared action type against the registry's names.
    pub fn check_action_types(&self, known: &[&str]) -> Result<(), ParseError> {
        for (state, specs) in &self.actions {
            for spec in specs {
                if !known.contains(&spec.action_type.as_str()) {
                    return Err(ParseError::UnknownActionType {
                        state: state.clone(),
                        action_type: spec.action_type.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Re-emit the descriptor in canonical YAML form.
    ///
    /// The output is equivalent, not byte-identical: keys are ordered,
    /// defaults dropped.
    pub fn to_yaml(&self) -> Result<String, ParseError> {
        let actions: Map<String, Value> = self
            .actions
            .iter()
            .map(|(state, specs)| {
                let list: Vec<Value> = specs
                    .iter()
                    .map(|spec| {
                        let mut entry = Map::new();
                        entry.insert("type".to_string(), json!(spec.action_type));
                        for (k, v) in &spec.config {
                            entry.insert(k.clone(), v.clone());
                        }
                        Value::Object(entry)
                    })
                    .collect();
                (state.clone(), Value::Array(list))
            })
            .collect();

        let doc = json!({
            "name": self.name,
            "initial_state": self.initial_state,
            "states": self.states,
            "events": self.events,
            "transitions": self.transitions,
            "actions": actions,
        });
        Ok(serde_yaml::to_string(&doc)?)
    }
}

/// Parse a `timeout(N)` pseudo-event name; returns N in seconds.
pub fn parse_timeout_event(event: &str) -> Option<u64> {
    let inner = event.strip_prefix("timeout(")?.strip_suffix(')')?;
    inner.parse().ok()
}

#[cfg(test)]
#[path = "def_tests.rs"]
mod tests;
