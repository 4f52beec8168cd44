// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The fan-out loop.

use crate::subscriber::SubscriberSet;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::UnixDatagram;
use tokio::sync::Mutex;

/// Per-subscriber send budget. A subscriber that exceeds it is dead.
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(2);

/// Watchdog log cadence.
const WATCHDOG_INTERVAL: Duration = Duration::from_secs(30);

const MAX_DATAGRAM: usize = 64 * 1024;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("broadcast socket error: {0}")]
    Socket(#[from] std::io::Error),
}

#[derive(Default)]
struct Stats {
    records: AtomicU64,
    evictions: AtomicU64,
}

/// Reads the broadcast socket and re-emits each record to subscribers.
pub struct Bridge {
    socket: UnixDatagram,
    path: PathBuf,
    subscribers: SubscriberSet,
    send_timeout: Duration,
    stats: Arc<Stats>,
}

impl Bridge {
    /// Bind the broadcast socket, replacing a stale file from a crashed
    /// predecessor.
    pub fn bind(event_socket_path: &Path, send_timeout: Duration) -> Result<Self, BridgeError> {
        if event_socket_path.exists() {
            std::fs::remove_file(event_socket_path)?;
        }
        if let Some(parent) = event_socket_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let socket = UnixDatagram::bind(event_socket_path)?;
        tracing::info!(path = %event_socket_path.display(), "broadcast socket bound");
        Ok(Self {
            socket,
            path: event_socket_path.to_path_buf(),
            subscribers: Arc::new(Mutex::new(Vec::new())),
            send_timeout,
            stats: Arc::new(Stats::default()),
        })
    }

    /// Handle to the subscriber set for the accept loop.
    pub fn subscribers(&self) -> SubscriberSet {
        Arc::clone(&self.subscribers)
    }

    /// Spawn the liveness watchdog: periodic stats so an operator can
    /// tell a silent bridge from a dead one.
    pub fn spawn_watchdog(&self) {
        let subscribers = Arc::clone(&self.subscribers);
        let stats = Arc::clone(&self.stats);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(WATCHDOG_INTERVAL);
            loop {
                interval.tick().await;
                let count = subscribers.lock().await.len();
                tracing::info!(
                    subscribers = count,
                    records = stats.records.load(Ordering::Relaxed),
                    evictions = stats.evictions.load(Ordering::Relaxed),
                    "bridge alive"
                );
            }
        });
    }

    /// Receive datagrams forever, fanning each out to all subscribers.
    pub async fn run(self) -> Result<(), BridgeError> {
        let mut buf = vec![0u8; MAX_DATAGRAM];
        loop {
            let len = self.socket.recv(&mut buf).await?;
            let record = match serde_json::from_slice::<Value>(&buf[..len]) {
                Ok(value) => value,
                Err(err) => {
                    tracing::warn!(error = %err, "discarding malformed broadcast record");
                    continue;
                }
            };
            self.stats.records.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(
                machine = record.get("machine_name").and_then(serde_json::Value::as_str).unwrap_or("?"),
                event_type = record.get("event_type").and_then(serde_json::Value::as_str).unwrap_or("?"),
                "record received"
            );
            self.fan_out(&record).await;
        }
    }

    /// Deliver one record to every subscriber, evicting the slow and the
    /// dead. Sends are sequential, so the worst case delay one
    /// subscriber can impose on another is the per-send timeout.
    pub async fn fan_out(&self, record: &Value) {
        let encoded = record.to_string();
        let mut subscribers = self.subscribers.lock().await;

        let mut dead = Vec::new();
        for (index, subscriber) in subscribers.iter_mut().enumerate() {
            match tokio::time::timeout(self.send_timeout, subscriber.send(encoded.as_bytes())).await
            {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    tracing::info!(subscriber = subscriber.id(), error = %err, "subscriber dropped");
                    dead.push(index);
                }
                Err(_elapsed) => {
                    tracing::warn!(
                        subscriber = subscriber.id(),
                        timeout_ms = self.send_timeout.as_millis() as u64,
                        "subscriber too slow, evicting"
                    );
                    dead.push(index);
                }
            }
        }

        for index in dead.into_iter().rev() {
            subscribers.remove(index);
            self.stats.evictions.fetch_add(1, Ordering::Relaxed);
        }
    }
}

impl Drop for Bridge {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

#[cfg(test)]
#[path = "bridge_tests.rs"]
mod tests;
