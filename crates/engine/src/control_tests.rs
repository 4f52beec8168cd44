// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;
use std::time::Duration;

#[test]
fn path_derivation_appends_machine_name() {
    let path = control_socket_path(Path::new("/tmp/machina/ctrl"), "worker-1");
    assert_eq!(path, PathBuf::from("/tmp/machina/ctrl-worker-1.sock"));
}

#[tokio::test]
async fn drain_returns_queued_envelopes_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let prefix = dir.path().join("ctrl");
    let mut socket = ControlSocket::bind(&prefix, "m1").unwrap();

    ControlSocket::send_to(&prefix, "m1", &EventEnvelope::new("first")).unwrap();
    ControlSocket::send_to(&prefix, "m1", &EventEnvelope::new("second")).unwrap();

    // Datagram delivery is immediate on the loopback path
    tokio::time::sleep(Duration::from_millis(20)).await;
    let events = socket.drain();
    let names: Vec<&str> = events.iter().map(|e| e.event_type.as_str()).collect();
    assert_eq!(names, vec!["first", "second"]);

    assert!(socket.drain().is_empty());
}

#[tokio::test]
async fn malformed_datagrams_are_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let prefix = dir.path().join("ctrl");
    let mut socket = ControlSocket::bind(&prefix, "m1").unwrap();

    let sender = std::os::unix::net::UnixDatagram::unbound().unwrap();
    sender
        .send_to(b"not json", control_socket_path(&prefix, "m1"))
        .unwrap();
    ControlSocket::send_to(&prefix, "m1", &EventEnvelope::new("good")).unwrap();

    tokio::time::sleep(Duration::from_millis(20)).await;
    let events = socket.drain();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, "good");
}

#[tokio::test]
async fn recv_timeout_returns_none_when_idle() {
    let dir = tempfile::tempdir().unwrap();
    let mut socket = ControlSocket::bind(&dir.path().join("ctrl"), "m1").unwrap();
    let got = socket
        .recv_timeout(Duration::from_millis(30))
        .await
        .unwrap();
    assert!(got.is_none());
}

#[tokio::test]
async fn recv_timeout_delivers_payload() {
    let dir = tempfile::tempdir().unwrap();
    let prefix = dir.path().join("ctrl");
    let mut socket = ControlSocket::bind(&prefix, "m1").unwrap();

    let env = EventEnvelope::new("relay").with_payload(json!({"user": {"id": 42}}));
    ControlSocket::send_to(&prefix, "m1", &env).unwrap();

    let got = socket
        .recv_timeout(Duration::from_secs(1))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(got, env);
}

#[tokio::test]
async fn rebind_replaces_stale_socket_file() {
    let dir = tempfile::tempdir().unwrap();
    let prefix = dir.path().join("ctrl");
    let first = ControlSocket::bind(&prefix, "m1").unwrap();
    let path = first.path().to_path_buf();
    // Simulate a crash: forget the socket so Drop never unlinks it
    std::mem::forget(first);
    assert!(path.exists());

    let second = ControlSocket::bind(&prefix, "m1").unwrap();
    assert_eq!(second.path(), path);
}

#[tokio::test]
async fn socket_file_removed_on_drop() {
    let dir = tempfile::tempdir().unwrap();
    let socket = ControlSocket::bind(&dir.path().join("ctrl"), "m1").unwrap();
    let path = socket.path().to_path_buf();
    assert!(path.exists());
    drop(socket);
    assert!(!path.exists());
}
