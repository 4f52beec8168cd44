// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_helpers::{cfg, test_runtime};
use serde_json::json;

#[tokio::test]
async fn delivers_to_socket_and_logs_durably() {
    let dir = tempfile::tempdir().unwrap();
    let (rt, store) = test_runtime(dir.path());
    let mut target = ControlSocket::bind(&rt.control_prefix, "peer").unwrap();

    let mut ctx = Context::new();
    let config = cfg(json!({
        "target_machine": "peer",
        "event_type": "relay",
        "payload": {"uid": 42},
        "success": "sent",
    }));
    let outcome = SendEvent.run(&config, &mut ctx, &rt).await.unwrap();
    assert_eq!(outcome.as_deref(), Some("sent"));

    // Socket delivery, type-preserved payload, sender recorded as source
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    let delivered = target.drain();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].event_type, "relay");
    assert_eq!(delivered[0].normalized_payload(), json!({"uid": 42}));
    assert_eq!(delivered[0].source.as_deref(), Some("test-machine"));

    // Durable fallback row
    let logged = store.pull_events("peer", None).unwrap();
    assert_eq!(logged.len(), 1);
    assert_eq!(logged[0].payload, json!({"uid": 42}));
}

#[tokio::test]
async fn dead_socket_still_succeeds_via_the_log() {
    let dir = tempfile::tempdir().unwrap();
    let (rt, store) = test_runtime(dir.path());

    let config = cfg(json!({
        "target_machine": "offline",
        "event_type": "relay",
        "success": "sent",
    }));
    let outcome = SendEvent
        .run(&config, &mut Context::new(), &rt)
        .await
        .unwrap();
    assert_eq!(outcome.as_deref(), Some("sent"));
    assert_eq!(store.pull_events("offline", None).unwrap().len(), 1);
}

#[tokio::test]
async fn current_job_id_rides_along() {
    let dir = tempfile::tempdir().unwrap();
    let (rt, store) = test_runtime(dir.path());

    let mut ctx = Context::from_value(json!({"current_job": {"job_id": "j7"}}));
    let config = cfg(json!({"target_machine": "peer", "event_type": "done"}));
    SendEvent.run(&config, &mut ctx, &rt).await.unwrap();

    let logged = store.pull_events("peer", None).unwrap();
    assert_eq!(logged[0].job_id.as_deref(), Some("j7"));
}

#[tokio::test]
async fn requires_target_and_type() {
    let dir = tempfile::tempdir().unwrap();
    let (rt, _store) = test_runtime(dir.path());
    let err = SendEvent
        .run(&cfg(json!({"event_type": "x"})), &mut Context::new(), &rt)
        .await
        .unwrap_err();
    assert!(matches!(err, ActionError::MissingConfig("target_machine")));
}
