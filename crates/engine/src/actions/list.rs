// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Context list manipulation, used by the batch-spawn loop.

use super::{Action, ActionConfig, ActionRuntime};
use crate::error::ActionError;
use async_trait::async_trait;
use machina_core::{Clock, Context};
use serde_json::Value;

/// Remove the first element of `ctx[list_key]` and place it at
/// `ctx[store_as]`.
///
/// Outcomes: `success` when an element was popped, `empty` when the list
/// is absent or exhausted.
pub struct PopFromList;

#[async_trait]
impl<C: Clock + 'static> Action<C> for PopFromList {
    async fn run(
        &self,
        config: &ActionConfig,
        ctx: &mut Context,
        _rt: &ActionRuntime<C>,
    ) -> Result<Option<String>, ActionError> {
        let list_key = config.require_string("list_key")?;
        let store_as = config.require_string("store_as")?;

        let popped = match ctx.get(&list_key) {
            Some(Value::Array(items)) if !items.is_empty() => {
                let mut items = items.clone();
                let first = items.remove(0);
                ctx.insert(list_key, Value::Array(items));
                Some(first)
            }
            _ => None,
        };

        match popped {
            Some(value) => {
                ctx.insert(store_as, value);
                Ok(config.outcome("success"))
            }
            None => Ok(config.outcome("empty")),
        }
    }
}

/// Append `value` to `ctx[list_key]`, creating the list if absent.
pub struct AddToList;

#[async_trait]
impl<C: Clock + 'static> Action<C> for AddToList {
    async fn run(
        &self,
        config: &ActionConfig,
        ctx: &mut Context,
        _rt: &ActionRuntime<C>,
    ) -> Result<Option<String>, ActionError> {
        let list_key = config.require_string("list_key")?;
        let value = config
            .get("value")
            .cloned()
            .ok_or(ActionError::MissingConfig("value"))?;

        let mut items = match ctx.get(&list_key) {
            Some(Value::Array(items)) => items.clone(),
            _ => Vec::new(),
        };
        items.push(value);
        ctx.insert(list_key, Value::Array(items));
        Ok(config.outcome("success"))
    }
}

#[cfg(test)]
#[path = "list_tests.rs"]
mod tests;
