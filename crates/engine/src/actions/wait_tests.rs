// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_helpers::{cfg, test_runtime};
use machina_core::NewJob;
use serde_json::json;

#[tokio::test]
async fn empty_tracking_list_short_circuits() {
    let dir = tempfile::tempdir().unwrap();
    let (rt, _store) = test_runtime(dir.path());

    let mut ctx = Context::new();
    let config = cfg(json!({"no_jobs_tracked": "nothing_to_wait_for"}));
    let outcome = WaitForJobs.run(&config, &mut ctx, &rt).await.unwrap();
    assert_eq!(outcome.as_deref(), Some("nothing_to_wait_for"));
}

#[tokio::test]
async fn all_terminal_jobs_complete_immediately() {
    let dir = tempfile::tempdir().unwrap();
    let (rt, store) = test_runtime(dir.path());
    for id in ["j1", "j2", "j3"] {
        store.create_job(NewJob::new("t").with_id(id)).unwrap();
        store.claim_job(id).unwrap();
    }
    store.complete_job("j1", None).unwrap();
    store.complete_job("j2", None).unwrap();
    store.fail_job("j3", "boom").unwrap();

    let mut ctx = Context::from_value(json!({"spawned_jobs": ["j1", "j2", "j3"]}));
    let config = cfg(json!({
        "all_jobs_complete": "batch_finished",
        "check_timeout": "too_slow",
    }));
    let outcome = WaitForJobs.run(&config, &mut ctx, &rt).await.unwrap();
    assert_eq!(outcome.as_deref(), Some("batch_finished"));

    assert_eq!(ctx.get("completed_jobs"), Some(&json!(["j1", "j2"])));
    assert_eq!(ctx.get("failed_jobs"), Some(&json!(["j3"])));
    assert_eq!(ctx.get("pending_jobs"), Some(&json!([])));
}

#[tokio::test]
async fn exhausted_budget_reports_timeout_with_partitions() {
    let dir = tempfile::tempdir().unwrap();
    let (rt, store) = test_runtime(dir.path());
    store.create_job(NewJob::new("t").with_id("j1")).unwrap();
    store.claim_job("j1").unwrap();
    store.complete_job("j1", None).unwrap();
    store.create_job(NewJob::new("t").with_id("j2")).unwrap();

    let mut ctx = Context::from_value(json!({"spawned_jobs": ["j1", "j2"]}));
    let config = cfg(json!({
        "timeout_seconds": 0,
        "all_jobs_complete": "batch_finished",
        "check_timeout": "too_slow",
    }));
    let outcome = WaitForJobs.run(&config, &mut ctx, &rt).await.unwrap();
    assert_eq!(outcome.as_deref(), Some("too_slow"));

    assert_eq!(ctx.get("completed_jobs"), Some(&json!(["j1"])));
    assert_eq!(ctx.get("pending_jobs"), Some(&json!(["j2"])));
}

#[tokio::test]
async fn unknown_job_ids_count_as_pending() {
    let dir = tempfile::tempdir().unwrap();
    let (rt, _store) = test_runtime(dir.path());

    let mut ctx = Context::from_value(json!({"spawned_jobs": ["ghost"]}));
    let config = cfg(json!({
        "timeout_seconds": 0,
        "all_jobs_complete": "batch_finished",
        "check_timeout": "too_slow",
    }));
    let outcome = WaitForJobs.run(&config, &mut ctx, &rt).await.unwrap();
    assert_eq!(outcome.as_deref(), Some("too_slow"));
    assert_eq!(ctx.get("pending_jobs"), Some(&json!(["ghost"])));
}

#[tokio::test]
async fn polls_until_jobs_finish() {
    let dir = tempfile::tempdir().unwrap();
    let (rt, store) = test_runtime(dir.path());
    store.create_job(NewJob::new("t").with_id("j1")).unwrap();

    // Finish the job from a parallel task while the action polls.
    let store_clone = std::sync::Arc::clone(&store);
    let finisher = tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        store_clone.claim_job("j1").unwrap();
        store_clone.complete_job("j1", None).unwrap();
    });

    let mut ctx = Context::from_value(json!({"spawned_jobs": ["j1"]}));
    let config = cfg(json!({
        "timeout_seconds": 10,
        "poll_interval": 0.05,
        "all_jobs_complete": "batch_finished",
    }));
    let outcome = WaitForJobs.run(&config, &mut ctx, &rt).await.unwrap();
    assert_eq!(outcome.as_deref(), Some("batch_finished"));
    finisher.await.unwrap();
}

#[tokio::test]
async fn custom_tracking_key() {
    let dir = tempfile::tempdir().unwrap();
    let (rt, store) = test_runtime(dir.path());
    store.create_job(NewJob::new("t").with_id("j1")).unwrap();
    store.claim_job("j1").unwrap();
    store.complete_job("j1", None).unwrap();

    let mut ctx = Context::from_value(json!({"my_batch": ["j1"]}));
    let config = cfg(json!({
        "tracked_jobs_key": "my_batch",
        "all_jobs_complete": "batch_finished",
    }));
    let outcome = WaitForJobs.run(&config, &mut ctx, &rt).await.unwrap();
    assert_eq!(outcome.as_deref(), Some("batch_finished"));
}
