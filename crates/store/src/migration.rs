// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Schema setup and versioned migration.

use rusqlite::Connection;

/// Current schema version, written to `PRAGMA user_version`.
const SCHEMA_VERSION: i64 = 1;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS jobs (
    job_id       TEXT PRIMARY KEY,
    job_type     TEXT NOT NULL,
    machine_type TEXT,
    status       TEXT NOT NULL DEFAULT 'pending',
    priority     INTEGER NOT NULL DEFAULT 100,
    created_at   INTEGER NOT NULL,
    started_at   INTEGER,
    completed_at INTEGER,
    data         TEXT NOT NULL DEFAULT '{}',
    metadata     TEXT NOT NULL DEFAULT '{}'
);

CREATE INDEX IF NOT EXISTS idx_jobs_queue
    ON jobs (status, priority, created_at);

CREATE TABLE IF NOT EXISTS machine_events (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    target_machine TEXT NOT NULL,
    event_type     TEXT NOT NULL,
    payload        TEXT NOT NULL DEFAULT '{}',
    job_id         TEXT,
    source         TEXT,
    created_at     INTEGER NOT NULL,
    consumed_at    INTEGER
);

CREATE INDEX IF NOT EXISTS idx_machine_events_target
    ON machine_events (target_machine, consumed_at);

CREATE TABLE IF NOT EXISTS machine_states (
    machine_name      TEXT PRIMARY KEY,
    config_type       TEXT NOT NULL,
    current_state     TEXT NOT NULL,
    last_heartbeat_at INTEGER NOT NULL,
    status            TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS state_transitions (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    machine_name  TEXT NOT NULL,
    from_state    TEXT NOT NULL,
    to_state      TEXT NOT NULL,
    event_trigger TEXT NOT NULL,
    created_at    INTEGER NOT NULL
);
";

/// Apply pragmas and bring the schema up to the current version.
///
/// WAL mode keeps concurrent engine processes from blocking each other on
/// reads; the busy timeout bounds writer contention before the store's
/// own retry layer kicks in.
pub(crate) fn migrate(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "busy_timeout", 1_000)?;

    let version: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    if version < SCHEMA_VERSION {
        conn.execute_batch(SCHEMA)?;
        conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    }
    Ok(())
}
