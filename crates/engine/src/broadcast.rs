// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Broadcast socket writer.
//!
//! Every accepted transition is written as a datagram to the process-wide
//! broadcast path; actions may additionally emit `activity_log` records.
//! Only observers need these, so the writer never blocks and a missing
//! socket is a silent drop.

use machina_core::BroadcastRecord;
use std::os::unix::net::UnixDatagram;
use std::path::{Path, PathBuf};

pub struct BroadcastWriter {
    socket: Option<UnixDatagram>,
    path: PathBuf,
}

impl BroadcastWriter {
    /// Create a writer targeting `path`. The socket itself is created by
    /// whichever observer binds it; the writer works whether or not one
    /// exists yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let socket = match UnixDatagram::unbound() {
            Ok(socket) => {
                if let Err(err) = socket.set_nonblocking(true) {
                    tracing::warn!(error = %err, "broadcast socket cannot be non-blocking");
                }
                Some(socket)
            }
            Err(err) => {
                tracing::warn!(error = %err, "cannot create broadcast socket, records will be dropped");
                None
            }
        };
        Self {
            socket,
            path: path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Fire-and-forget send. Encoding failures and unreachable sockets
    /// are dropped with a trace line.
    pub fn send(&self, record: &BroadcastRecord) {
        let Some(socket) = &self.socket else { return };
        let encoded = match serde_json::to_vec(record) {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::warn!(error = %err, "broadcast record failed to encode");
                return;
            }
        };
        if let Err(err) = socket.send_to(&encoded, &self.path) {
            tracing::trace!(
                path = %self.path.display(),
                error = %err,
                "broadcast dropped (no observer listening)"
            );
        }
    }
}

#[cfg(test)]
#[path = "broadcast_tests.rs"]
mod tests;
