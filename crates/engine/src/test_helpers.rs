// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared helpers for engine tests.

use crate::actions::{ActionConfig, ActionRuntime};
use crate::broadcast::BroadcastWriter;
use machina_core::SystemClock;
use machina_store::Store;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// An action runtime rooted in a temp directory, sharing a store handle.
pub(crate) fn test_runtime(dir: &Path) -> (ActionRuntime<SystemClock>, Arc<Store<SystemClock>>) {
    let store = Arc::new(Store::open(&dir.join("machina.db"), SystemClock).unwrap());
    let rt = ActionRuntime {
        store: Arc::clone(&store),
        broadcast: Arc::new(BroadcastWriter::new(dir.join("events.sock"))),
        clock: SystemClock,
        machine_name: "test-machine".to_string(),
        control_prefix: dir.join("ctrl"),
        event_socket_path: dir.join("events.sock"),
        database_path: dir.join("machina.db"),
        engine_bin: PathBuf::from("/bin/true"),
    };
    (rt, store)
}

pub(crate) fn cfg(value: Value) -> ActionConfig {
    ActionConfig::new(value)
}
