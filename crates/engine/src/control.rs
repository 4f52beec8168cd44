// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-machine control socket.
//!
//! Each machine instance binds a datagram socket at
//! `{prefix}-{machine}.sock`; any sender writes JSON [`EventEnvelope`]
//! datagrams to it. The socket is lossy under crash but authoritative
//! while the machine runs; the durable event log is the fallback path.

use machina_core::EventEnvelope;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::net::UnixDatagram;

/// Largest accepted control datagram.
const MAX_DATAGRAM: usize = 64 * 1024;

/// Control socket path for a machine under a given prefix.
pub fn control_socket_path(prefix: &Path, machine_name: &str) -> PathBuf {
    let mut path = prefix.as_os_str().to_os_string();
    path.push(format!("-{}.sock", machine_name));
    PathBuf::from(path)
}

pub struct ControlSocket {
    socket: UnixDatagram,
    path: PathBuf,
    buf: Vec<u8>,
}

impl ControlSocket {
    /// Bind the machine's control socket, replacing any stale file left
    /// by a crashed predecessor.
    pub fn bind(prefix: &Path, machine_name: &str) -> std::io::Result<Self> {
        let path = control_socket_path(prefix, machine_name);
        if path.exists() {
            std::fs::remove_file(&path)?;
        }
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let socket = UnixDatagram::bind(&path)?;
        tracing::debug!(path = %path.display(), "control socket bound");
        Ok(Self {
            socket,
            path,
            buf: vec![0u8; MAX_DATAGRAM],
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Drain every queued datagram without blocking. Malformed envelopes
    /// log a warning and are skipped.
    pub fn drain(&mut self) -> Vec<EventEnvelope> {
        let mut envelopes = Vec::new();
        loop {
            match self.socket.try_recv(&mut self.buf) {
                Ok(len) => {
                    if let Some(env) = decode(&self.buf[..len]) {
                        envelopes.push(env);
                    }
                }
                Err(err) if err.kind() == ErrorKind::WouldBlock => break,
                Err(err) => {
                    tracing::warn!(error = %err, "control socket receive error");
                    break;
                }
            }
        }
        envelopes
    }

    /// Wait up to `timeout` for one datagram. Returns `None` on timeout
    /// or a malformed envelope.
    pub async fn recv_timeout(
        &mut self,
        timeout: std::time::Duration,
    ) -> std::io::Result<Option<EventEnvelope>> {
        match tokio::time::timeout(timeout, self.socket.recv(&mut self.buf)).await {
            Ok(Ok(len)) => Ok(decode(&self.buf[..len])),
            Ok(Err(err)) => Err(err),
            Err(_elapsed) => Ok(None),
        }
    }

    /// Send an envelope to another machine's control socket.
    ///
    /// Uses an unbound sender socket so replies don't land here.
    pub fn send_to(
        prefix: &Path,
        machine_name: &str,
        envelope: &EventEnvelope,
    ) -> std::io::Result<()> {
        let path = control_socket_path(prefix, machine_name);
        let sender = std::os::unix::net::UnixDatagram::unbound()?;
        let encoded = serde_json::to_vec(envelope)
            .map_err(|e| std::io::Error::new(ErrorKind::InvalidData, e))?;
        sender.send_to(&encoded, &path)?;
        Ok(())
    }
}

impl Drop for ControlSocket {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

fn decode(bytes: &[u8]) -> Option<EventEnvelope> {
    match serde_json::from_slice::<EventEnvelope>(bytes) {
        Ok(env) => Some(env),
        Err(err) => {
            tracing::warn!(error = %err, "discarding malformed control datagram");
            None
        }
    }
}

#[cfg(test)]
#[path = "control_tests.rs"]
mod tests;
