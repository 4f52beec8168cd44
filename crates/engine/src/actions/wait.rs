// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Waiting on a batch of spawned jobs.

use super::{Action, ActionConfig, ActionRuntime};
use crate::error::ActionError;
use async_trait::async_trait;
use machina_core::{Clock, Context, JobStatus};
use serde_json::Value;
use std::time::Duration;

const DEFAULT_TIMEOUT_SECS: u64 = 300;
const DEFAULT_POLL_INTERVAL_SECS: f64 = 1.0;

/// Poll the job table until every tracked job reaches a terminal state.
///
/// Reads job ids from `ctx[tracked_jobs_key]` (default `spawned_jobs`)
/// and partitions them into `completed_jobs`, `failed_jobs`, and
/// `pending_jobs` in the context on every poll, so a timeout handler
/// still sees the latest partition.
///
/// Outcomes: `all_jobs_complete` when no pending jobs remain,
/// `check_timeout` when the wall-clock budget is exhausted,
/// `no_jobs_tracked` when the list is empty.
pub struct WaitForJobs;

#[async_trait]
impl<C: Clock + 'static> Action<C> for WaitForJobs {
    async fn run(
        &self,
        config: &ActionConfig,
        ctx: &mut Context,
        rt: &ActionRuntime<C>,
    ) -> Result<Option<String>, ActionError> {
        let tracked_key = config
            .string("tracked_jobs_key")
            .unwrap_or_else(|| "spawned_jobs".to_string());
        let budget = Duration::from_secs(config.u64("timeout_seconds").unwrap_or(DEFAULT_TIMEOUT_SECS));
        let poll_interval = Duration::from_secs_f64(
            config
                .f64("poll_interval")
                .unwrap_or(DEFAULT_POLL_INTERVAL_SECS)
                .max(0.01),
        );

        let job_ids: Vec<String> = match ctx.get(&tracked_key) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        };
        if job_ids.is_empty() {
            tracing::debug!(key = %tracked_key, "no jobs tracked");
            return Ok(config.outcome("no_jobs_tracked"));
        }

        let started = rt.clock.now();
        loop {
            let statuses = rt.store.get_job_statuses(&job_ids)?;

            let mut completed = Vec::new();
            let mut failed = Vec::new();
            let mut pending = Vec::new();
            for id in &job_ids {
                match statuses.get(id) {
                    Some(JobStatus::Completed) => completed.push(id.clone()),
                    Some(JobStatus::Failed) => failed.push(id.clone()),
                    // Unknown rows count as pending: the child may not
                    // have been inserted yet.
                    _ => pending.push(id.clone()),
                }
            }

            let pending_empty = pending.is_empty();
            ctx.insert("completed_jobs", Value::from(completed));
            ctx.insert("failed_jobs", Value::from(failed));
            ctx.insert("pending_jobs", Value::from(pending));

            if pending_empty {
                tracing::info!(jobs = job_ids.len(), "all tracked jobs terminal");
                return Ok(config.outcome("all_jobs_complete"));
            }
            if rt.clock.now().saturating_duration_since(started) >= budget {
                tracing::warn!(
                    budget_secs = budget.as_secs(),
                    "wait budget exhausted with jobs still pending"
                );
                return Ok(config.outcome("check_timeout"));
            }
            tokio::time::sleep(poll_interval).await;
        }
    }
}

#[cfg(test)]
#[path = "wait_tests.rs"]
mod tests;
