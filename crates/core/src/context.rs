// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-machine mutable context.
//!
//! The context is a mapping from string keys to JSON values, owned by the
//! interpreter of one machine and propagated across actions within a state:
//! a value written by the first action of a state is visible to the second
//! action's interpolated configuration.

use serde_json::{Map, Value};

/// Key holding the name of the running machine instance.
pub const MACHINE_NAME: &str = "machine_name";

/// Key holding the machine's current state name.
pub const CURRENT_STATE: &str = "current_state";

/// Key holding the envelope of the event currently being handled.
pub const EVENT_DATA: &str = "event_data";

/// Key holding the claimed job row, if any.
pub const CURRENT_JOB: &str = "current_job";

/// Mutable mapping carried across actions and transitions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Context {
    values: Map<String, Value>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a context from a JSON object value. Non-object values yield
    /// an empty context.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(values) => Self { values },
            _ => Self::default(),
        }
    }

    /// Look up a value by bare key or dot-path.
    ///
    /// Dot-paths traverse nested objects: `"current_job.job_id"` resolves
    /// `values["current_job"]["job_id"]`. A missing segment yields `None`.
    pub fn get(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut current = self.values.get(first)?;
        for segment in segments {
            current = current.as_object()?.get(segment)?;
        }
        Some(current)
    }

    /// Look up a string value by path.
    pub fn get_str(&self, path: &str) -> Option<&str> {
        self.get(path).and_then(Value::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.values.insert(key.into(), value);
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Merge another object's entries into this context, overwriting on
    /// key collision.
    pub fn merge(&mut self, other: Map<String, Value>) {
        for (key, value) in other {
            self.values.insert(key, value);
        }
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.values
    }

    /// The context as a JSON object value (for logging and spawn handoff).
    pub fn to_value(&self) -> Value {
        Value::Object(self.values.clone())
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }
}

impl From<Map<String, Value>> for Context {
    fn from(values: Map<String, Value>) -> Self {
        Self { values }
    }
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod tests;
