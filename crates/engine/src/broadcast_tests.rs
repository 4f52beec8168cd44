// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::os::unix::net::UnixDatagram;

#[test]
fn delivers_records_to_a_bound_listener() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("events.sock");
    let listener = UnixDatagram::bind(&path).unwrap();

    let writer = BroadcastWriter::new(&path);
    let record = BroadcastRecord::state_change("m1", "a", "b", "go", 1.5);
    writer.send(&record);

    let mut buf = [0u8; 65536];
    let n = listener.recv(&mut buf).unwrap();
    let received: BroadcastRecord = serde_json::from_slice(&buf[..n]).unwrap();
    assert_eq!(received, record);
}

#[test]
fn missing_socket_is_a_silent_drop() {
    let dir = tempfile::tempdir().unwrap();
    let writer = BroadcastWriter::new(dir.path().join("absent.sock"));
    // Must not error or block
    writer.send(&BroadcastRecord::activity_log("m1", "hello", 2.0));
}
