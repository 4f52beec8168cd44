// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Descriptor parsing (YAML).
//!
//! Unknown top-level keys are warnings, not errors, so older engines can
//! load descriptors written for newer ones. The `start` event (seeded by
//! the engine at boot) and `timeout(N)` pseudo-events do not need to be
//! declared in the `events` list.

use crate::def::{parse_timeout_event, ActionSpec, MachineDef, Transition};
use crate::error::ParseError;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

/// Top-level keys the parser understands; anything else warns.
const KNOWN_KEYS: &[&str] = &[
    "name",
    "initial_state",
    "states",
    "events",
    "transitions",
    "actions",
];

/// Event names accepted in transitions without an `events` declaration.
const IMPLICIT_EVENTS: &[&str] = &["start"];

#[derive(Debug, Deserialize)]
struct RawDoc {
    name: String,
    initial_state: String,
    #[serde(default)]
    states: Vec<String>,
    #[serde(default)]
    events: Vec<String>,
    #[serde(default)]
    transitions: Vec<Transition>,
    #[serde(default)]
    actions: BTreeMap<String, Vec<serde_yaml::Value>>,
}

/// Load and validate a descriptor from a file.
pub fn load_path(path: &Path) -> Result<MachineDef, ParseError> {
    let text = std::fs::read_to_string(path).map_err(|source| ParseError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_str(&text)
}

/// Parse and validate a descriptor from YAML text.
pub fn parse_str(text: &str) -> Result<MachineDef, ParseError> {
    warn_unknown_keys(text);

    let raw: RawDoc = serde_yaml::from_str(text)?;
    let mut actions = BTreeMap::new();
    for (state, specs) in raw.actions {
        let mut list = Vec::with_capacity(specs.len());
        for spec in specs {
            list.push(to_action_spec(&state, spec)?);
        }
        actions.insert(state, list);
    }

    let def = MachineDef {
        name: raw.name,
        initial_state: raw.initial_state,
        states: raw.states,
        events: raw.events,
        transitions: raw.transitions,
        actions,
    };
    validate(&def)?;
    Ok(def)
}

fn warn_unknown_keys(text: &str) {
    let Ok(mapping) = serde_yaml::from_str::<serde_yaml::Mapping>(text) else {
        return; // the typed parse will report the real error
    };
    for key in mapping.keys() {
        if let Some(key) = key.as_str() {
            if !KNOWN_KEYS.contains(&key) {
                tracing::warn!(key, "ignoring unknown top-level descriptor key");
            }
        }
    }
}

fn to_action_spec(state: &str, value: serde_yaml::Value) -> Result<ActionSpec, ParseError> {
    let json = serde_json::to_value(&value).map_err(|e| ParseError::InvalidActionConfig {
        state: state.to_string(),
        message: e.to_string(),
    })?;
    let Value::Object(mut config) = json else {
        return Err(ParseError::InvalidActionConfig {
            state: state.to_string(),
            message: "action must be a mapping".to_string(),
        });
    };
    let action_type = match config.remove("type") {
        Some(Value::String(t)) => t,
        _ => {
            return Err(ParseError::ActionMissingType {
                state: state.to_string(),
            })
        }
    };
    Ok(ActionSpec::new(action_type, config))
}

fn validate(def: &MachineDef) -> Result<(), ParseError> {
    if def.states.is_empty() {
        return Err(ParseError::NoStates);
    }
    if !def.states.contains(&def.initial_state) {
        return Err(ParseError::UndeclaredInitialState(def.initial_state.clone()));
    }

    for (i, t) in def.transitions.iter().enumerate() {
        let location = format!("transitions[{}]", i);
        for state in [&t.from, &t.to] {
            if !def.states.contains(state) {
                return Err(ParseError::UndeclaredState {
                    location: location.clone(),
                    state: state.clone(),
                });
            }
        }
        let declared = def.events.iter().any(|e| e == &t.event)
            || IMPLICIT_EVENTS.contains(&t.event.as_str())
            || parse_timeout_event(&t.event).is_some();
        if !declared {
            return Err(ParseError::UndeclaredEvent {
                location,
                event: t.event.clone(),
            });
        }
    }

    for state in def.actions.keys() {
        if !def.states.contains(state) {
            return Err(ParseError::ActionsForUnknownState(state.clone()));
        }
    }

    // Two transitions on the same (from, event) are only allowed when
    // guards can tell them apart: at most one may be unguarded.
    for (i, a) in def.transitions.iter().enumerate() {
        for b in def.transitions.iter().skip(i + 1) {
            if a.from == b.from && a.event == b.event && a.guard.is_none() && b.guard.is_none() {
                return Err(ParseError::AmbiguousTransition {
                    from: a.from.clone(),
                    event: a.event.clone(),
                });
            }
        }
    }

    Ok(())
}

#[cfg(test)]
#[path = "parser_tests.rs"]
mod tests;
