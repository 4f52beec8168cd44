// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Push subscribers.
//!
//! The in-tree binding pushes line-delimited JSON over TCP; the
//! [`Subscriber`] trait keeps the bridge agnostic, so a WebSocket or any
//! other push transport slots in without touching the fan-out loop.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpListener;
use tokio::sync::Mutex;

/// A push transport for broadcast records.
#[async_trait]
pub trait Subscriber: Send + Sync {
    fn id(&self) -> &str;

    /// Deliver one encoded record. An error means the subscriber is dead.
    async fn send(&mut self, record: &[u8]) -> std::io::Result<()>;
}

/// Shared, mutable set of live subscribers.
pub type SubscriberSet = Arc<Mutex<Vec<Box<dyn Subscriber>>>>;

/// Line-delimited JSON over TCP.
pub struct TcpSubscriber {
    id: String,
    writer: OwnedWriteHalf,
}

impl TcpSubscriber {
    pub fn new(id: impl Into<String>, writer: OwnedWriteHalf) -> Self {
        Self {
            id: id.into(),
            writer,
        }
    }
}

#[async_trait]
impl Subscriber for TcpSubscriber {
    fn id(&self) -> &str {
        &self.id
    }

    async fn send(&mut self, record: &[u8]) -> std::io::Result<()> {
        self.writer.write_all(record).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await
    }
}

/// Accept TCP subscribers and add them to the set.
pub async fn accept_loop(listener: TcpListener, subscribers: SubscriberSet) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let id = addr.to_string();
                tracing::info!(subscriber = %id, "subscriber connected");
                let (_reader, writer) = stream.into_split();
                subscribers
                    .lock()
                    .await
                    .push(Box::new(TcpSubscriber::new(id, writer)));
            }
            Err(err) => {
                tracing::warn!(error = %err, "subscriber accept failed");
            }
        }
    }
}
