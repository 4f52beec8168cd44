// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The store proper.

use crate::error::StoreError;
use crate::migration;
use machina_core::{
    Clock, EventEnvelope, IdGen, Job, JobId, JobStatus, MachineEvent, MachineState, MachineStatus,
    UuidIdGen,
};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

/// Transient-error retry budget.
const MAX_RETRIES: u32 = 3;

/// Base backoff between retries; grows linearly per attempt.
const RETRY_BACKOFF: Duration = Duration::from_millis(20);

/// Default job priority (lower runs first).
const DEFAULT_PRIORITY: i64 = 100;

/// Filter for queue scans.
#[derive(Debug, Clone, Default)]
pub struct JobFilter {
    pub job_type: Option<String>,
    pub machine_type: Option<String>,
}

/// Job queue, event log, and machine-state rows over one SQLite database.
pub struct Store<C: Clock> {
    conn: Mutex<Connection>,
    clock: C,
    id_gen: UuidIdGen,
}

impl<C: Clock> Store<C> {
    /// Open (creating if needed) the database at `path` and migrate it.
    pub fn open(path: &Path, clock: C) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        migration::migrate(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            clock,
            id_gen: UuidIdGen,
        })
    }

    // --- jobs ---

    /// Insert a new pending job; generates a UUID job_id when none given.
    pub fn create_job(&self, new: machina_core::NewJob) -> Result<JobId, StoreError> {
        let job_id = new.job_id.unwrap_or_else(|| self.id_gen.next());
        let data = new.data.unwrap_or_else(|| Value::Object(Default::default()));
        let metadata = new
            .metadata
            .unwrap_or_else(|| Value::Object(Default::default()));
        let now = self.clock.epoch_ms() as i64;

        self.with_retry(|conn| {
            conn.execute(
                "INSERT INTO jobs (job_id, job_type, machine_type, status, priority, created_at, data, metadata)
                 VALUES (?1, ?2, ?3, 'pending', ?4, ?5, ?6, ?7)",
                params![
                    job_id,
                    new.job_type,
                    new.machine_type,
                    new.priority.unwrap_or(DEFAULT_PRIORITY),
                    now,
                    data.to_string(),
                    metadata.to_string(),
                ],
            )
        })?;
        Ok(JobId::new(job_id))
    }

    /// Read-only queue scan: pending jobs matching the filter, ordered by
    /// `priority ASC, created_at ASC`. Never mutates status.
    pub fn get_pending_jobs(
        &self,
        filter: &JobFilter,
        limit: Option<u32>,
    ) -> Result<Vec<Job>, StoreError> {
        let rows = self.with_retry(|conn| {
            let mut stmt = conn.prepare(
                "SELECT job_id, job_type, machine_type, status, priority,
                        created_at, started_at, completed_at, data, metadata
                 FROM jobs
                 WHERE status = 'pending'
                   AND (?1 IS NULL OR job_type = ?1)
                   AND (?2 IS NULL OR machine_type = ?2)
                 ORDER BY priority ASC, created_at ASC
                 LIMIT ?3",
            )?;
            let mapped = stmt.query_map(
                params![
                    filter.job_type,
                    filter.machine_type,
                    limit.map(i64::from).unwrap_or(-1),
                ],
                raw_job_row,
            )?;
            mapped.collect::<Result<Vec<_>, _>>()
        })?;
        rows.into_iter().map(job_from_raw).collect()
    }

    /// Atomically claim a pending job.
    ///
    /// Returns true iff exactly one row moved `pending` → `processing`.
    /// The `WHERE status = 'pending'` predicate is what guarantees at most
    /// one claimer across any number of concurrent engines.
    pub fn claim_job(&self, job_id: &str) -> Result<bool, StoreError> {
        let now = self.clock.epoch_ms() as i64;
        let changed = self.with_retry(|conn| {
            conn.execute(
                "UPDATE jobs SET status = 'processing', started_at = ?1
                 WHERE job_id = ?2 AND status = 'pending'",
                params![now, job_id],
            )
        })?;
        Ok(changed == 1)
    }

    /// Mark a job completed. A no-op when the job is already terminal, so
    /// repeated completion cannot regress status.
    pub fn complete_job(&self, job_id: &str, result: Option<Value>) -> Result<(), StoreError> {
        self.finish_job(job_id, JobStatus::Completed, "result", result)
    }

    /// Mark a job failed, recording the error in metadata.
    pub fn fail_job(&self, job_id: &str, error: &str) -> Result<(), StoreError> {
        self.finish_job(
            job_id,
            JobStatus::Failed,
            "error",
            Some(Value::String(error.to_string())),
        )
    }

    fn finish_job(
        &self,
        job_id: &str,
        status: JobStatus,
        meta_key: &str,
        meta_value: Option<Value>,
    ) -> Result<(), StoreError> {
        let now = self.clock.epoch_ms() as i64;
        let existing = self.get_job(job_id)?;
        let Some(job) = existing else {
            tracing::warn!(job_id, status = %status, "finishing unknown job, ignoring");
            return Ok(());
        };
        if job.is_terminal() {
            return Ok(());
        }

        let mut metadata = job.metadata;
        if let (Some(value), Some(obj)) = (meta_value, metadata.as_object_mut()) {
            obj.insert(meta_key.to_string(), value);
        }

        self.with_retry(|conn| {
            conn.execute(
                "UPDATE jobs SET status = ?1, completed_at = ?2, metadata = ?3
                 WHERE job_id = ?4 AND status IN ('pending', 'processing')",
                params![status.as_str(), now, metadata.to_string(), job_id],
            )
        })?;
        Ok(())
    }

    pub fn get_job(&self, job_id: &str) -> Result<Option<Job>, StoreError> {
        let row = self.with_retry(|conn| {
            conn.query_row(
                "SELECT job_id, job_type, machine_type, status, priority,
                        created_at, started_at, completed_at, data, metadata
                 FROM jobs WHERE job_id = ?1",
                params![job_id],
                raw_job_row,
            )
            .optional()
        })?;
        row.map(job_from_raw).transpose()
    }

    /// Status lookup for a set of jobs. Unknown ids are absent from the
    /// result, not errors.
    pub fn get_job_statuses(
        &self,
        job_ids: &[String],
    ) -> Result<HashMap<String, JobStatus>, StoreError> {
        let rows = self.with_retry(|conn| {
            let mut stmt = conn.prepare("SELECT status FROM jobs WHERE job_id = ?1")?;
            let mut found = Vec::with_capacity(job_ids.len());
            for id in job_ids {
                let status: Option<String> = stmt
                    .query_row(params![id], |row| row.get(0))
                    .optional()?;
                if let Some(status) = status {
                    found.push((id.clone(), status));
                }
            }
            Ok(found)
        })?;

        let mut statuses = HashMap::with_capacity(rows.len());
        for (id, status) in rows {
            let status = JobStatus::parse(&status).ok_or(StoreError::InvalidColumn {
                field: "status",
                value: status,
            })?;
            statuses.insert(id, status);
        }
        Ok(statuses)
    }

    // --- event log ---

    /// Append an envelope to the durable event log.
    pub fn record_event(
        &self,
        target_machine: &str,
        envelope: &EventEnvelope,
    ) -> Result<i64, StoreError> {
        let now = self.clock.epoch_ms() as i64;
        let payload = envelope
            .payload
            .clone()
            .unwrap_or_else(|| Value::Object(Default::default()));
        self.with_retry(|conn| {
            conn.execute(
                "INSERT INTO machine_events
                     (target_machine, event_type, payload, job_id, source, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    target_machine,
                    envelope.event_type,
                    payload.to_string(),
                    envelope.job_id,
                    envelope.source,
                    now,
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    /// Drain unconsumed events for a machine, marking them consumed.
    ///
    /// `since` (epoch ms) skips rows created before it (they are still
    /// marked consumed), so a restarting machine can bound how stale a
    /// replayed event may be.
    pub fn pull_events(
        &self,
        target_machine: &str,
        since: Option<u64>,
    ) -> Result<Vec<MachineEvent>, StoreError> {
        let now = self.clock.epoch_ms() as i64;
        let since = since.map(|ms| ms as i64).unwrap_or(0);
        let rows = self.with_retry(|conn| {
            let tx = conn.unchecked_transaction()?;
            let rows = {
                let mut stmt = tx.prepare(
                    "SELECT id, target_machine, event_type, payload, job_id, source,
                            created_at, consumed_at
                     FROM machine_events
                     WHERE target_machine = ?1 AND consumed_at IS NULL AND created_at >= ?2
                     ORDER BY id ASC",
                )?;
                let mapped = stmt.query_map(params![target_machine, since], raw_event_row)?;
                mapped.collect::<Result<Vec<_>, _>>()?
            };
            tx.execute(
                "UPDATE machine_events SET consumed_at = ?1
                 WHERE target_machine = ?2 AND consumed_at IS NULL",
                params![now, target_machine],
            )?;
            tx.commit()?;
            Ok(rows)
        })?;
        rows.into_iter().map(event_from_raw).collect()
    }

    /// Delete consumed events older than the retention window. Returns
    /// the number of rows removed.
    pub fn prune_events(&self, retention: Duration) -> Result<usize, StoreError> {
        let cutoff = self.clock.epoch_ms() as i64 - retention.as_millis() as i64;
        let removed = self.with_retry(|conn| {
            conn.execute(
                "DELETE FROM machine_events
                 WHERE consumed_at IS NOT NULL AND created_at < ?1",
                params![cutoff],
            )
        })?;
        Ok(removed)
    }

    // --- machine states ---

    /// Record the machine's current state, refreshing the heartbeat.
    pub fn upsert_machine_state(
        &self,
        machine_name: &str,
        config_type: &str,
        current_state: &str,
    ) -> Result<(), StoreError> {
        let now = self.clock.epoch_ms() as i64;
        self.with_retry(|conn| {
            conn.execute(
                "INSERT INTO machine_states
                     (machine_name, config_type, current_state, last_heartbeat_at, status)
                 VALUES (?1, ?2, ?3, ?4, 'running')
                 ON CONFLICT (machine_name) DO UPDATE SET
                     config_type = excluded.config_type,
                     current_state = excluded.current_state,
                     last_heartbeat_at = excluded.last_heartbeat_at,
                     status = 'running'",
                params![machine_name, config_type, current_state, now],
            )
        })?;
        Ok(())
    }

    /// Set the machine's lifecycle status, preserving its last state for
    /// post-mortem inspection.
    pub fn set_machine_status(
        &self,
        machine_name: &str,
        status: MachineStatus,
    ) -> Result<(), StoreError> {
        let now = self.clock.epoch_ms() as i64;
        self.with_retry(|conn| {
            conn.execute(
                "UPDATE machine_states SET status = ?1, last_heartbeat_at = ?2
                 WHERE machine_name = ?3",
                params![status.as_str(), now, machine_name],
            )
        })?;
        Ok(())
    }

    pub fn get_machine_state(
        &self,
        machine_name: &str,
    ) -> Result<Option<MachineState>, StoreError> {
        let row = self.with_retry(|conn| {
            conn.query_row(
                "SELECT machine_name, config_type, current_state, last_heartbeat_at, status
                 FROM machine_states WHERE machine_name = ?1",
                params![machine_name],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, i64>(3)?,
                        row.get::<_, String>(4)?,
                    ))
                },
            )
            .optional()
        })?;
        let Some((machine_name, config_type, current_state, heartbeat, status)) = row else {
            return Ok(None);
        };
        let status =
            MachineStatus::parse(&status).ok_or_else(|| StoreError::InvalidColumn {
                field: "status",
                value: status,
            })?;
        Ok(Some(MachineState {
            machine_name,
            config_type,
            current_state,
            last_heartbeat_at: heartbeat as u64,
            status,
        }))
    }

    /// Append to the transition log.
    pub fn record_transition(
        &self,
        machine_name: &str,
        from_state: &str,
        to_state: &str,
        event_trigger: &str,
    ) -> Result<(), StoreError> {
        let now = self.clock.epoch_ms() as i64;
        self.with_retry(|conn| {
            conn.execute(
                "INSERT INTO state_transitions
                     (machine_name, from_state, to_state, event_trigger, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![machine_name, from_state, to_state, event_trigger, now],
            )
        })?;
        Ok(())
    }

    // --- retry plumbing ---

    /// Run an operation, retrying on SQLite busy/locked with linear
    /// backoff. Exhausted retries surface as [`StoreError::RetriesExhausted`].
    fn with_retry<T>(
        &self,
        op: impl Fn(&Connection) -> Result<T, rusqlite::Error>,
    ) -> Result<T, StoreError> {
        let conn = self.conn.lock();
        let mut attempt = 0;
        loop {
            match op(&conn) {
                Ok(value) => return Ok(value),
                Err(err) if is_transient(&err) && attempt < MAX_RETRIES => {
                    attempt += 1;
                    tracing::debug!(attempt, error = %err, "transient database error, retrying");
                    std::thread::sleep(RETRY_BACKOFF * attempt);
                }
                Err(err) if is_transient(&err) => {
                    return Err(StoreError::RetriesExhausted {
                        attempts: attempt,
                        source: err,
                    })
                }
                Err(err) => return Err(err.into()),
            }
        }
    }
}

fn is_transient(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if matches!(
                e.code,
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
            )
    )
}

/// Raw row tuple read inside rusqlite's row mapper; JSON and enum parsing
/// happens outside so its errors surface as [`StoreError`], not SQL errors.
type RawJob = (
    String,
    String,
    Option<String>,
    String,
    i64,
    i64,
    Option<i64>,
    Option<i64>,
    String,
    String,
);

fn raw_job_row(row: &rusqlite::Row<'_>) -> Result<RawJob, rusqlite::Error> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
        row.get(9)?,
    ))
}

fn job_from_raw(raw: RawJob) -> Result<Job, StoreError> {
    let (job_id, job_type, machine_type, status, priority, created_at, started_at, completed_at, data, metadata) =
        raw;
    let status = JobStatus::parse(&status).ok_or(StoreError::InvalidColumn {
        field: "status",
        value: status,
    })?;
    Ok(Job {
        job_id: JobId::new(job_id),
        job_type,
        machine_type,
        status,
        priority,
        created_at: created_at as u64,
        started_at: started_at.map(|v| v as u64),
        completed_at: completed_at.map(|v| v as u64),
        data: serde_json::from_str(&data)?,
        metadata: serde_json::from_str(&metadata)?,
    })
}

type RawEvent = (
    i64,
    String,
    String,
    String,
    Option<String>,
    Option<String>,
    i64,
    Option<i64>,
);

fn raw_event_row(row: &rusqlite::Row<'_>) -> Result<RawEvent, rusqlite::Error> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
    ))
}

fn event_from_raw(raw: RawEvent) -> Result<MachineEvent, StoreError> {
    let (id, target_machine, event_type, payload, job_id, source, created_at, consumed_at) = raw;
    Ok(MachineEvent {
        id,
        target_machine,
        event_type,
        payload: serde_json::from_str(&payload)?,
        job_id,
        source,
        created_at: created_at as u64,
        consumed_at: consumed_at.map(|v| v as u64),
    })
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
