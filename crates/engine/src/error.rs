// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine and action error types

use thiserror::Error;

/// An action could not fulfil its contract.
///
/// These are recovered locally: the interpreter re-expresses them as the
/// action's configured `error` event so the descriptor author controls
/// the response in YAML.
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("store error: {0}")]
    Store(#[from] machina_store::StoreError),

    #[error("missing required config key '{0}'")]
    MissingConfig(&'static str),

    #[error("config key '{key}' has invalid value: {message}")]
    InvalidConfig { key: &'static str, message: String },

    #[error("shell command failed: {0}")]
    Shell(String),

    #[error("failed to spawn child machine: {0}")]
    Spawn(String),
}

/// Fatal engine failures. Everything below these is recovered locally and
/// re-expressed as an event.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("descriptor error: {0}")]
    Descriptor(#[from] machina_descriptor::ParseError),

    #[error("store error: {0}")]
    Store(#[from] machina_store::StoreError),

    #[error("control socket error: {0}")]
    Socket(#[from] std::io::Error),

    #[error(
        "no transition from state '{state}' handles '{event}'; machine failed"
    )]
    FatalTransition { state: String, event: String },
}
