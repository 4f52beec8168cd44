// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job queue actions: scan, claim, and finish.

use super::{Action, ActionConfig, ActionRuntime};
use crate::error::ActionError;
use async_trait::async_trait;
use machina_core::{context, Clock, Context};
use machina_store::JobFilter;
use serde_json::Value;

fn filter_from(config: &ActionConfig) -> JobFilter {
    JobFilter {
        job_type: config.string("job_type"),
        machine_type: config.string("machine_type"),
    }
}

/// Read-only queue scan. Stores the matching pending jobs under
/// `store_as` (default `pending_jobs`).
///
/// Outcomes: `success` when non-empty, `empty` otherwise.
pub struct GetPendingJobs;

#[async_trait]
impl<C: Clock + 'static> Action<C> for GetPendingJobs {
    async fn run(
        &self,
        config: &ActionConfig,
        ctx: &mut Context,
        rt: &ActionRuntime<C>,
    ) -> Result<Option<String>, ActionError> {
        let store_as = config
            .string("store_as")
            .unwrap_or_else(|| "pending_jobs".to_string());
        let limit = config.u64("limit").map(|n| n as u32);

        let jobs = rt.store.get_pending_jobs(&filter_from(config), limit)?;
        let slot = if jobs.is_empty() { "empty" } else { "success" };
        tracing::debug!(count = jobs.len(), store_as = %store_as, "queue scan");

        let encoded = serde_json::to_value(&jobs)
            .map_err(|e| ActionError::InvalidConfig {
                key: "store_as",
                message: e.to_string(),
            })?;
        ctx.insert(store_as, encoded);
        Ok(config.outcome(slot))
    }
}

/// Atomic claim of one job by id.
///
/// Outcomes: `success` when this machine won the claim,
/// `already_claimed` when the row was no longer pending.
pub struct ClaimJob;

#[async_trait]
impl<C: Clock + 'static> Action<C> for ClaimJob {
    async fn run(
        &self,
        config: &ActionConfig,
        _ctx: &mut Context,
        rt: &ActionRuntime<C>,
    ) -> Result<Option<String>, ActionError> {
        let job_id = config.require_string("job_id")?;
        let claimed = rt.store.claim_job(&job_id)?;
        if claimed {
            tracing::info!(job_id = %job_id, "claimed job");
            Ok(config.outcome("success"))
        } else {
            tracing::debug!(job_id = %job_id, "claim lost");
            Ok(config.outcome("already_claimed"))
        }
    }
}

/// Legacy single-claim convenience: scan the queue and atomically claim
/// the first available row, storing it as `current_job`.
///
/// Outcomes: `jobs_found` when a row was claimed, `empty` otherwise.
pub struct CheckDatabaseQueue;

#[async_trait]
impl<C: Clock + 'static> Action<C> for CheckDatabaseQueue {
    async fn run(
        &self,
        config: &ActionConfig,
        ctx: &mut Context,
        rt: &ActionRuntime<C>,
    ) -> Result<Option<String>, ActionError> {
        let limit = config.u64("limit").unwrap_or(1).max(1) as u32;
        let candidates = rt.store.get_pending_jobs(&filter_from(config), Some(limit))?;

        // Another machine may claim a candidate between scan and claim;
        // losing a race here just means trying the next row.
        for job in candidates {
            if rt.store.claim_job(job.job_id.as_str())? {
                let claimed = rt.store.get_job(job.job_id.as_str())?;
                if let Some(claimed) = claimed {
                    tracing::info!(job_id = %claimed.job_id, "claimed job from queue");
                    let encoded =
                        serde_json::to_value(&claimed).map_err(|e| ActionError::InvalidConfig {
                            key: "current_job",
                            message: e.to_string(),
                        })?;
                    ctx.insert(context::CURRENT_JOB, encoded);
                }
                return Ok(config.outcome("jobs_found"));
            }
        }
        Ok(config.outcome("empty"))
    }
}

/// Terminal completion of a job, with optional result metadata.
pub struct CompleteJob;

#[async_trait]
impl<C: Clock + 'static> Action<C> for CompleteJob {
    async fn run(
        &self,
        config: &ActionConfig,
        _ctx: &mut Context,
        rt: &ActionRuntime<C>,
    ) -> Result<Option<String>, ActionError> {
        let job_id = config.require_string("job_id")?;
        let result = config.get("result").cloned();
        rt.store.complete_job(&job_id, result)?;
        tracing::info!(job_id = %job_id, "job completed");
        Ok(config.outcome("success"))
    }
}

/// Terminal failure of a job, recording the error text.
pub struct FailJob;

#[async_trait]
impl<C: Clock + 'static> Action<C> for FailJob {
    async fn run(
        &self,
        config: &ActionConfig,
        _ctx: &mut Context,
        rt: &ActionRuntime<C>,
    ) -> Result<Option<String>, ActionError> {
        let job_id = config.require_string("job_id")?;
        let error = config
            .get("error")
            .map(render_error)
            .unwrap_or_else(|| "failed".to_string());
        rt.store.fail_job(&job_id, &error)?;
        tracing::info!(job_id = %job_id, error = %error, "job failed");
        Ok(config.outcome("success"))
    }
}

fn render_error(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
#[path = "jobs_tests.rs"]
mod tests;
