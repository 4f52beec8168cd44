// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Template variable interpolation.
//!
//! Actions receive their configuration fully interpolated by the
//! interpreter; nothing else in the system substitutes placeholders.
//! Templates reference context entries as `{name}` or `{a.b.c}`.
//!
//! A template that consists of exactly one placeholder resolves to the raw
//! context value with its type preserved (int stays int, list stays list),
//! which is what lets a payload field like `"{event_data.payload}"` forward
//! an entire object. Mixed templates render to strings. Unknown
//! placeholders are preserved verbatim so they show up in diagnostics
//! instead of vanishing.

use crate::context::Context;
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

/// Regex pattern for {variable_name} or {dotted.path}
// Allow expect here as the regex is compile-time verified to be valid
#[allow(clippy::expect_used)]
pub static VAR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{([a-zA-Z_][a-zA-Z0-9_]*(?:\.[a-zA-Z_][a-zA-Z0-9_-]*)*)\}")
        .expect("constant regex pattern is valid")
});

/// Resolve `{path}` placeholders in a template against the context.
///
/// Returns the raw context value when the template is exactly one
/// placeholder; otherwise a string with each placeholder replaced by its
/// value's string form. Unknown placeholders are left as-is.
pub fn resolve(template: &str, ctx: &Context) -> Value {
    if let Some(path) = single_placeholder(template) {
        return match ctx.get(path) {
            Some(value) => value.clone(),
            None => Value::String(template.to_string()),
        };
    }

    let rendered = VAR_PATTERN.replace_all(template, |caps: &regex::Captures| {
        match ctx.get(&caps[1]) {
            Some(value) => render(value),
            None => caps[0].to_string(),
        }
    });
    Value::String(rendered.into_owned())
}

/// Recursively resolve every string inside nested maps and sequences.
///
/// Non-string scalars pass through unchanged.
pub fn resolve_tree(value: &Value, ctx: &Context) -> Value {
    match value {
        Value::String(template) => resolve(template, ctx),
        Value::Array(items) => Value::Array(items.iter().map(|v| resolve_tree(v, ctx)).collect()),
        Value::Object(entries) => Value::Object(
            entries
                .iter()
                .map(|(k, v)| (k.clone(), resolve_tree(v, ctx)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Returns the placeholder path when the template is exactly `{path}`.
fn single_placeholder(template: &str) -> Option<&str> {
    let caps = VAR_PATTERN.captures(template)?;
    let whole = caps.get(0)?;
    if whole.start() == 0 && whole.end() == template.len() {
        caps.get(1).map(|m| m.as_str())
    } else {
        None
    }
}

/// String form of a value for embedding in a larger template.
///
/// Strings embed without quotes; everything else uses its JSON encoding.
fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
#[path = "template_tests.rs"]
mod tests;
