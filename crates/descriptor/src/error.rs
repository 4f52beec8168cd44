// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Errors that can occur during descriptor parsing

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("cannot read descriptor {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("descriptor declares no states")]
    NoStates,

    #[error("initial_state '{0}' is not a declared state")]
    UndeclaredInitialState(String),

    #[error("transition {location} references undeclared state '{state}'")]
    UndeclaredState { location: String, state: String },

    #[error("transition {location} references undeclared event '{event}'")]
    UndeclaredEvent { location: String, event: String },

    #[error("actions declared for unknown state '{0}'")]
    ActionsForUnknownState(String),

    #[error(
        "ambiguous transitions from '{from}' on '{event}': \
         two unguarded transitions match the same event"
    )]
    AmbiguousTransition { from: String, event: String },

    #[error("unknown action type '{action_type}' in state '{state}'")]
    UnknownActionType { state: String, action_type: String },

    #[error("action in state '{state}' is missing the 'type' key")]
    ActionMissingType { state: String },

    #[error("invalid action config in state '{state}': {message}")]
    InvalidActionConfig { state: String, message: String },

    #[error("invalid guard '{guard}': {message}")]
    InvalidGuard { guard: String, message: String },
}
