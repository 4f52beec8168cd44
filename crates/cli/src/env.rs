// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Environment overrides for launcher defaults.

use std::path::PathBuf;

/// Database path: `MACHINA_DB`, else `machina.db` in the working dir.
pub fn default_database() -> PathBuf {
    std::env::var_os("MACHINA_DB")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("machina.db"))
}

/// Broadcast socket path: `MACHINA_EVENT_SOCKET`, else a stable default.
pub fn default_event_socket() -> PathBuf {
    std::env::var_os("MACHINA_EVENT_SOCKET")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("/tmp/machina-events.sock"))
}

/// Control socket prefix: `MACHINA_CONTROL_PREFIX`, else a stable default.
pub fn default_control_prefix() -> PathBuf {
    std::env::var_os("MACHINA_CONTROL_PREFIX")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("/tmp/machina-ctrl"))
}
