// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire envelopes for the event plane.
//!
//! [`EventEnvelope`] is the JSON object senders write to a machine's
//! control socket. [`BroadcastRecord`] is what the engine writes to the
//! broadcast socket on every accepted transition. [`MachineEvent`] is the
//! durable row the event log stores as fallback delivery.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Broadcast record type for state transitions.
pub const STATE_CHANGE: &str = "state_change";

/// Broadcast record type for action-emitted activity lines.
pub const ACTIVITY_LOG: &str = "activity_log";

/// Targeted event envelope received on a machine's control socket.
///
/// Only `type` is required. `payload` may be an object (passed through)
/// or a JSON string (auto-parsed before delivery to actions).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    #[serde(rename = "type")]
    pub event_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl EventEnvelope {
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            payload: None,
            job_id: None,
            source: None,
        }
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Payload normalized for delivery to actions.
    ///
    /// String payloads are parsed as JSON; a parse failure logs a warning
    /// and delivers `{}`. Objects pass through unchanged, an absent
    /// payload delivers `{}`.
    pub fn normalized_payload(&self) -> Value {
        match &self.payload {
            None => Value::Object(Map::new()),
            Some(Value::String(raw)) => match serde_json::from_str::<Value>(raw) {
                Ok(parsed) => parsed,
                Err(err) => {
                    tracing::warn!(
                        event = %self.event_type,
                        error = %err,
                        "event payload is not valid JSON, delivering empty payload"
                    );
                    Value::Object(Map::new())
                }
            },
            Some(other) => other.clone(),
        }
    }

    /// The envelope as the `event_data` context value, payload normalized.
    pub fn to_event_data(&self) -> Value {
        let mut data = Map::new();
        data.insert("type".to_string(), Value::String(self.event_type.clone()));
        data.insert("payload".to_string(), self.normalized_payload());
        if let Some(job_id) = &self.job_id {
            data.insert("job_id".to_string(), Value::String(job_id.clone()));
        }
        if let Some(source) = &self.source {
            data.insert("source".to_string(), Value::String(source.clone()));
        }
        Value::Object(data)
    }
}

/// Record written to the broadcast socket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BroadcastRecord {
    pub machine_name: String,
    pub event_type: String,
    pub payload: Value,
}

impl BroadcastRecord {
    /// Record for an accepted transition.
    pub fn state_change(
        machine_name: impl Into<String>,
        from_state: &str,
        to_state: &str,
        event_trigger: &str,
        timestamp: f64,
    ) -> Self {
        Self {
            machine_name: machine_name.into(),
            event_type: STATE_CHANGE.to_string(),
            payload: json!({
                "from_state": from_state,
                "to_state": to_state,
                "event_trigger": event_trigger,
                "timestamp": timestamp,
            }),
        }
    }

    /// Record for an action-emitted activity line.
    pub fn activity_log(
        machine_name: impl Into<String>,
        message: impl Into<String>,
        timestamp: f64,
    ) -> Self {
        Self {
            machine_name: machine_name.into(),
            event_type: ACTIVITY_LOG.to_string(),
            payload: json!({
                "message": message.into(),
                "timestamp": timestamp,
            }),
        }
    }
}

/// Durable event-log row: the stored counterpart of [`EventEnvelope`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MachineEvent {
    pub id: i64,
    pub target_machine: String,
    pub event_type: String,
    pub payload: Value,
    pub job_id: Option<String>,
    pub source: Option<String>,
    pub created_at: u64,
    pub consumed_at: Option<u64>,
}

impl MachineEvent {
    /// Rehydrate the wire envelope for delivery through the interpreter.
    pub fn to_envelope(&self) -> EventEnvelope {
        EventEnvelope {
            event_type: self.event_type.clone(),
            payload: Some(self.payload.clone()),
            job_id: self.job_id.clone(),
            source: self.source.clone(),
        }
    }
}

#[cfg(test)]
#[path = "envelope_tests.rs"]
mod tests;
