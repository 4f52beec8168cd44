// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Transition guards.
//!
//! A guard is a small string predicate over context: a bare path tests
//! truthiness, `path == literal` and `path != literal` compare against a
//! JSON scalar (bare words compare as strings). Missing paths are falsy.

use crate::error::ParseError;
use machina_core::Context;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum Guard {
    /// `path`: true when the value is present and truthy.
    Truthy(String),
    /// `path == literal`
    Eq { path: String, value: Value },
    /// `path != literal`
    Ne { path: String, value: Value },
}

impl Guard {
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ParseError::InvalidGuard {
                guard: text.to_string(),
                message: "empty guard".to_string(),
            });
        }

        if let Some((lhs, rhs)) = text.split_once("==") {
            return Ok(Guard::Eq {
                path: parse_path(lhs, text)?,
                value: parse_literal(rhs),
            });
        }
        if let Some((lhs, rhs)) = text.split_once("!=") {
            return Ok(Guard::Ne {
                path: parse_path(lhs, text)?,
                value: parse_literal(rhs),
            });
        }
        Ok(Guard::Truthy(parse_path(text, text)?))
    }

    pub fn eval(&self, ctx: &Context) -> bool {
        match self {
            Guard::Truthy(path) => ctx.get(path).is_some_and(is_truthy),
            Guard::Eq { path, value } => ctx.get(path) == Some(value),
            Guard::Ne { path, value } => ctx.get(path) != Some(value),
        }
    }
}

impl fmt::Display for Guard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Guard::Truthy(path) => write!(f, "{}", path),
            Guard::Eq { path, value } => write!(f, "{} == {}", path, render_literal(value)),
            Guard::Ne { path, value } => write!(f, "{} != {}", path, render_literal(value)),
        }
    }
}

impl Serialize for Guard {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Guard {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Guard::parse(&text).map_err(serde::de::Error::custom)
    }
}

fn parse_path(text: &str, guard: &str) -> Result<String, ParseError> {
    let path = text.trim();
    let valid = !path.is_empty()
        && path.split('.').all(|seg| {
            !seg.is_empty()
                && seg
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        });
    if valid {
        Ok(path.to_string())
    } else {
        Err(ParseError::InvalidGuard {
            guard: guard.to_string(),
            message: format!("'{}' is not a context path", path),
        })
    }
}

/// Parse the right-hand side as a JSON scalar, falling back to a bare
/// string (so `status == pending` works without quotes).
fn parse_literal(text: &str) -> Value {
    let text = text.trim();
    match serde_json::from_str::<Value>(text) {
        Ok(value) if !value.is_object() && !value.is_array() => value,
        _ => Value::String(text.trim_matches('\'').to_string()),
    }
}

fn render_literal(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Truthiness mirrors what descriptor authors expect from dynamic
/// configs: null, false, 0, empty strings and empty containers are falsy.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64() != Some(0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

#[cfg(test)]
#[path = "guard_tests.rs"]
mod tests;
