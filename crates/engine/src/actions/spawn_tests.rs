// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_helpers::{cfg, test_runtime};
use serde_json::json;

fn parent_ctx() -> Context {
    Context::from_value(json!({
        "current_job": {"id": "jX", "priority": 3},
        "report_title": "T",
    }))
}

#[test]
fn child_context_copies_named_values() {
    let child = build_child_context(
        &parent_ctx(),
        &["current_job.id as job_id".to_string(), "report_title".to_string()],
    );
    assert_eq!(
        serde_json::Value::Object(child),
        json!({"job_id": "jX", "report_title": "T"})
    );
}

#[test]
fn child_context_dotted_path_keeps_last_segment() {
    let child = build_child_context(&parent_ctx(), &["current_job.priority".to_string()]);
    assert_eq!(serde_json::Value::Object(child), json!({"priority": 3}));
}

#[test]
fn missing_vars_are_absent_not_null() {
    let child = build_child_context(
        &parent_ctx(),
        &["nope".to_string(), "report_title".to_string()],
    );
    let child = serde_json::Value::Object(child);
    assert_eq!(child, json!({"report_title": "T"}));
    assert!(child.get("nope").is_none());
}

#[test]
fn child_context_preserves_value_types() {
    let ctx = Context::from_value(json!({"ids": [1, 2], "flag": true}));
    let child = build_child_context(&ctx, &["ids".to_string(), "flag".to_string()]);
    assert_eq!(serde_json::Value::Object(child), json!({"ids": [1, 2], "flag": true}));
}

#[tokio::test]
async fn spawn_reports_success_for_a_real_binary() {
    let dir = tempfile::tempdir().unwrap();
    let (rt, _store) = test_runtime(dir.path());

    let mut ctx = parent_ctx();
    let config = cfg(json!({
        "yaml_path": "worker.yaml",
        "machine_name": "child-jX",
        "context_vars": ["current_job.id as job_id"],
        "success": "spawned",
        "error": "spawn_failed",
    }));
    let outcome = StartFsm.run(&config, &mut ctx, &rt).await.unwrap();
    assert_eq!(outcome.as_deref(), Some("spawned"));
}

#[tokio::test]
async fn spawn_failure_maps_to_configured_error_event() {
    let dir = tempfile::tempdir().unwrap();
    let (mut rt, _store) = test_runtime(dir.path());
    rt.engine_bin = dir.path().join("no-such-binary");

    let config = cfg(json!({
        "yaml_path": "worker.yaml",
        "machine_name": "child",
        "error": "spawn_failed",
    }));
    let outcome = StartFsm.run(&config, &mut parent_ctx(), &rt).await.unwrap();
    assert_eq!(outcome.as_deref(), Some("spawn_failed"));
}

#[tokio::test]
async fn spawn_failure_without_mapping_escalates() {
    let dir = tempfile::tempdir().unwrap();
    let (mut rt, _store) = test_runtime(dir.path());
    rt.engine_bin = dir.path().join("no-such-binary");

    let config = cfg(json!({"yaml_path": "worker.yaml", "machine_name": "child"}));
    let err = StartFsm
        .run(&config, &mut parent_ctx(), &rt)
        .await
        .unwrap_err();
    assert!(matches!(err, ActionError::Spawn(_)));
}

#[tokio::test]
async fn non_list_context_vars_is_a_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let (rt, _store) = test_runtime(dir.path());
    let config = cfg(json!({
        "yaml_path": "worker.yaml",
        "machine_name": "child",
        "context_vars": "current_job.id",
    }));
    let err = StartFsm
        .run(&config, &mut parent_ctx(), &rt)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ActionError::InvalidConfig { key: "context_vars", .. }
    ));
}
