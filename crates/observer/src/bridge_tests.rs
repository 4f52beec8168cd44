// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::subscriber::Subscriber;
use async_trait::async_trait;
use serde_json::json;
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

/// Collects everything it receives.
struct Sink {
    id: String,
    received: Arc<Mutex<Vec<Value>>>,
}

#[async_trait]
impl Subscriber for Sink {
    fn id(&self) -> &str {
        &self.id
    }

    async fn send(&mut self, record: &[u8]) -> std::io::Result<()> {
        let value: Value = serde_json::from_slice(record)?;
        self.received.lock().await.push(value);
        Ok(())
    }
}

/// Never completes a send, like a subscriber that stopped reading.
struct Stalled;

#[async_trait]
impl Subscriber for Stalled {
    fn id(&self) -> &str {
        "stalled"
    }

    async fn send(&mut self, _record: &[u8]) -> std::io::Result<()> {
        std::future::pending().await
    }
}

/// Fails every send, like a closed connection.
struct Broken;

#[async_trait]
impl Subscriber for Broken {
    fn id(&self) -> &str {
        "broken"
    }

    async fn send(&mut self, _record: &[u8]) -> std::io::Result<()> {
        Err(std::io::Error::new(
            std::io::ErrorKind::BrokenPipe,
            "gone",
        ))
    }
}

fn sink(id: &str) -> (Sink, Arc<Mutex<Vec<Value>>>) {
    let received = Arc::new(Mutex::new(Vec::new()));
    (
        Sink {
            id: id.to_string(),
            received: Arc::clone(&received),
        },
        received,
    )
}

#[tokio::test]
async fn fan_out_reaches_every_subscriber() {
    let dir = tempfile::tempdir().unwrap();
    let bridge = Bridge::bind(&dir.path().join("events.sock"), DEFAULT_SEND_TIMEOUT).unwrap();

    let (s1, r1) = sink("s1");
    let (s2, r2) = sink("s2");
    {
        let subs = bridge.subscribers();
        let mut subs = subs.lock().await;
        subs.push(Box::new(s1));
        subs.push(Box::new(s2));
    }

    let record = json!({"machine_name": "m1", "event_type": "state_change", "payload": {}});
    bridge.fan_out(&record).await;

    assert_eq!(*r1.lock().await, vec![record.clone()]);
    assert_eq!(*r2.lock().await, vec![record]);
}

// Scenario: a subscriber that stops reading is marked dead within the
// per-send timeout, and later broadcasts reach the healthy subscriber
// without that delay.
#[tokio::test]
async fn slow_subscriber_is_evicted_within_the_timeout() {
    let dir = tempfile::tempdir().unwrap();
    let timeout = Duration::from_millis(100);
    let bridge = Bridge::bind(&dir.path().join("events.sock"), timeout).unwrap();

    let (healthy, received) = sink("healthy");
    {
        let subs = bridge.subscribers();
        let mut subs = subs.lock().await;
        subs.push(Box::new(Stalled));
        subs.push(Box::new(healthy));
    }

    let record = json!({"event_type": "state_change"});
    let started = Instant::now();
    bridge.fan_out(&record).await;
    // The healthy subscriber was delayed by at most the send timeout
    assert!(started.elapsed() < timeout * 3);
    assert_eq!(received.lock().await.len(), 1);
    assert_eq!(bridge.subscribers().lock().await.len(), 1);

    // Subsequent broadcasts are no longer delayed at all
    let started = Instant::now();
    bridge.fan_out(&record).await;
    assert!(started.elapsed() < timeout);
    assert_eq!(received.lock().await.len(), 2);
}

#[tokio::test]
async fn broken_subscriber_is_removed() {
    let dir = tempfile::tempdir().unwrap();
    let bridge = Bridge::bind(&dir.path().join("events.sock"), DEFAULT_SEND_TIMEOUT).unwrap();

    let (healthy, received) = sink("healthy");
    {
        let subs = bridge.subscribers();
        let mut subs = subs.lock().await;
        subs.push(Box::new(Broken));
        subs.push(Box::new(healthy));
    }

    bridge.fan_out(&json!({"event_type": "activity_log"})).await;
    assert_eq!(bridge.subscribers().lock().await.len(), 1);
    assert_eq!(received.lock().await.len(), 1);
}

#[tokio::test]
async fn end_to_end_datagram_to_tcp_line() {
    let dir = tempfile::tempdir().unwrap();
    let socket_path = dir.path().join("events.sock");
    let bridge = Bridge::bind(&socket_path, DEFAULT_SEND_TIMEOUT).unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(crate::subscriber::accept_loop(listener, bridge.subscribers()));
    tokio::spawn(bridge.run());

    let client = TcpStream::connect(addr).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    // An engine writes a state change to the broadcast socket
    let writer = std::os::unix::net::UnixDatagram::unbound().unwrap();
    let record = json!({
        "machine_name": "m1",
        "event_type": "state_change",
        "payload": {"from_state": "a", "to_state": "b", "event_trigger": "go", "timestamp": 1.0},
    });
    writer
        .send_to(record.to_string().as_bytes(), &socket_path)
        .unwrap();

    let mut lines = BufReader::new(client).lines();
    let line = tokio::time::timeout(Duration::from_secs(2), lines.next_line())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(serde_json::from_str::<Value>(&line).unwrap(), record);
}
