// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sibling event relay.

use super::{Action, ActionConfig, ActionRuntime};
use crate::control::ControlSocket;
use crate::error::ActionError;
use async_trait::async_trait;
use machina_core::{Clock, Context, EventEnvelope};

/// Send an event to another machine.
///
/// The envelope is recorded in the durable event log first, then written
/// to the target's control socket. A dead socket is not an error: the
/// target will pull the logged event when it next drains the log. Payload
/// templates are resolved by the interpreter before this action runs, so
/// both field extraction and whole-payload forwarding arrive here with
/// their types intact.
pub struct SendEvent;

#[async_trait]
impl<C: Clock + 'static> Action<C> for SendEvent {
    async fn run(
        &self,
        config: &ActionConfig,
        ctx: &mut Context,
        rt: &ActionRuntime<C>,
    ) -> Result<Option<String>, ActionError> {
        let target_machine = config.require_string("target_machine")?;
        let event_type = config.require_string("event_type")?;

        let mut envelope = EventEnvelope::new(event_type).with_source(rt.machine_name.clone());
        if let Some(payload) = config.get("payload") {
            envelope.payload = Some(payload.clone());
        }
        if let Some(job_id) = config
            .string("job_id")
            .or_else(|| ctx.get_str("current_job.job_id").map(str::to_string))
        {
            envelope.job_id = Some(job_id);
        }

        rt.store.record_event(&target_machine, &envelope)?;

        match ControlSocket::send_to(&rt.control_prefix, &target_machine, &envelope) {
            Ok(()) => {
                tracing::debug!(target = %target_machine, event = %envelope.event_type, "event sent");
            }
            Err(err) => {
                tracing::warn!(
                    target = %target_machine,
                    error = %err,
                    "control socket unreachable, event waits in the log"
                );
            }
        }
        Ok(config.outcome("success"))
    }
}

#[cfg(test)]
#[path = "send_tests.rs"]
mod tests;
