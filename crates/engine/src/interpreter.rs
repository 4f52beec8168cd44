// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The interpreter loop.
//!
//! Single-threaded and cooperative: one engine owns one machine's
//! context, current state, event queue, and action executor. Events are
//! drained one at a time; a matching transition runs the *target* state's
//! entry actions in declared order, each receiving configuration that was
//! interpolated here and nowhere else. An action returning an event name
//! pushes it to the front of the internal queue and stops the list.

use crate::actions::{ActionConfig, ActionRuntime, Registry};
use crate::broadcast::BroadcastWriter;
use crate::control::ControlSocket;
use crate::error::EngineError;
use crate::scheduler::Scheduler;
use machina_core::{context, BroadcastRecord, Clock, Context, EventEnvelope, MachineStatus};
use machina_descriptor::MachineDef;
use machina_store::Store;
use serde_json::Value;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::signal::unix::{signal, SignalKind};

/// Event the engine seeds at boot so the initial state can be left (or
/// its entry actions run via a self-transition).
const START_EVENT: &str = "start";

/// Scheduler id for the current state's `timeout(N)` timer.
const STATE_TIMEOUT_TIMER: &str = "state-timeout";

/// Upper bound on idle blocking so timers fire promptly.
const IDLE_POLL: Duration = Duration::from_millis(500);

/// Heartbeat refresh cadence while idle.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(10);

/// Consumed event-log rows older than this are pruned at startup.
const EVENT_RETENTION: Duration = Duration::from_secs(24 * 3600);

/// Why a clean run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// SIGTERM/SIGINT: machine-state row written as `stopped`.
    Terminated,
}

/// Engine paths and identity.
pub struct EngineConfig {
    pub machine_name: String,
    pub database_path: PathBuf,
    pub event_socket_path: PathBuf,
    pub control_socket_prefix: PathBuf,
    /// Binary `start_fsm` execs for children (normally the current exe).
    pub engine_bin: PathBuf,
}

/// Queued event plus how the engine must treat it.
#[derive(Debug)]
struct QueuedEvent {
    envelope: EventEnvelope,
    /// Came from outside the interpreter (socket or durable log);
    /// external events cancel the state timeout timer.
    external: bool,
    /// Escalate to a fatal failure when no transition handles it
    /// (set for events derived from action errors).
    fatal_if_unhandled: bool,
}

pub struct Engine<C: Clock> {
    def: MachineDef,
    registry: Registry<C>,
    rt: ActionRuntime<C>,
    control: ControlSocket,
    scheduler: Scheduler,
    queue: VecDeque<QueuedEvent>,
    ctx: Context,
    state: String,
    started: bool,
}

impl<C: Clock> std::fmt::Debug for Engine<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("state", &self.state)
            .field("started", &self.started)
            .finish_non_exhaustive()
    }
}

impl<C: Clock + 'static> Engine<C> {
    pub fn new(
        def: MachineDef,
        config: EngineConfig,
        store: Arc<Store<C>>,
        registry: Registry<C>,
        clock: C,
        initial_context: Context,
    ) -> Result<Self, EngineError> {
        def.check_action_types(&registry.names())?;

        let control = ControlSocket::bind(&config.control_socket_prefix, &config.machine_name)?;
        let broadcast = Arc::new(BroadcastWriter::new(&config.event_socket_path));

        let mut ctx = initial_context;
        ctx.insert(
            context::MACHINE_NAME,
            Value::String(config.machine_name.clone()),
        );
        ctx.insert(
            context::CURRENT_STATE,
            Value::String(def.initial_state.clone()),
        );

        let state = def.initial_state.clone();
        let rt = ActionRuntime {
            store,
            broadcast,
            clock,
            machine_name: config.machine_name,
            control_prefix: config.control_socket_prefix,
            event_socket_path: config.event_socket_path,
            database_path: config.database_path,
            engine_bin: config.engine_bin,
        };

        Ok(Self {
            def,
            registry,
            rt,
            control,
            scheduler: Scheduler::new(),
            queue: VecDeque::new(),
            ctx,
            state,
            started: false,
        })
    }

    pub fn state(&self) -> &str {
        &self.state
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    pub fn machine_name(&self) -> &str {
        &self.rt.machine_name
    }

    /// Enqueue an external event (socket, durable log, or test injection).
    pub fn inject(&mut self, envelope: EventEnvelope) {
        self.queue.push_back(QueuedEvent {
            envelope,
            external: true,
            fatal_if_unhandled: false,
        });
    }

    fn push_front_internal(&mut self, envelope: EventEnvelope, fatal_if_unhandled: bool) {
        self.queue.push_front(QueuedEvent {
            envelope,
            external: false,
            fatal_if_unhandled,
        });
    }

    /// Startup sequence: announce the machine, recover durable events,
    /// arm the initial state's timeout, and seed the `start` event.
    pub fn startup(&mut self) -> Result<(), EngineError> {
        let name = self.rt.machine_name.clone();
        self.rt
            .store
            .upsert_machine_state(&name, &self.def.name, &self.state)?;

        // Crash recovery: events logged while this machine was down.
        let pending = self.rt.store.pull_events(&name, None)?;
        if !pending.is_empty() {
            tracing::info!(count = pending.len(), "recovered durable events");
        }
        for event in &pending {
            self.inject(event.to_envelope());
        }
        if let Err(err) = self.rt.store.prune_events(EVENT_RETENTION) {
            tracing::warn!(error = %err, "event log pruning failed");
        }

        self.arm_state_timeout();
        self.push_front_internal(EventEnvelope::new(START_EVENT).with_source("engine"), false);
        self.started = true;
        Ok(())
    }

    /// Process queued events until the queue is empty.
    pub async fn drain(&mut self) -> Result<(), EngineError> {
        while let Some(event) = self.queue.pop_front() {
            self.dispatch(event).await?;
        }
        Ok(())
    }

    /// Enqueue timers that have fired by `now`.
    pub fn fire_due_timers(&mut self, now: Instant) {
        for envelope in self.scheduler.fired_timers(now) {
            self.queue.push_back(QueuedEvent {
                envelope,
                external: false,
                fatal_if_unhandled: false,
            });
        }
    }

    /// The full loop: startup, then alternate between queue processing,
    /// socket draining, timers, and idle waiting until terminated.
    pub async fn run(mut self) -> Result<StopReason, EngineError> {
        if !self.started {
            self.startup()?;
        }
        let shutdown = spawn_signal_watcher()?;
        let mut last_heartbeat = Instant::now();

        loop {
            if shutdown.load(Ordering::Relaxed) {
                tracing::info!("termination signal, stopping");
                self.mark_stopped();
                return Ok(StopReason::Terminated);
            }

            if let Err(err) = self.drain().await {
                self.mark_failed();
                return Err(err);
            }

            for envelope in self.control.drain() {
                self.inject(envelope);
            }
            let now = self.rt.clock.now();
            self.fire_due_timers(now);
            if !self.queue.is_empty() {
                continue;
            }

            if last_heartbeat.elapsed() >= HEARTBEAT_INTERVAL {
                let name = self.rt.machine_name.clone();
                if let Err(err) =
                    self.rt
                        .store
                        .upsert_machine_state(&name, &self.def.name, &self.state)
                {
                    tracing::warn!(error = %err, "heartbeat write failed");
                }
                last_heartbeat = Instant::now();
            }

            // Block briefly for the next external event; bounded so the
            // state timeout timer can fire without traffic and shutdown
            // signals are noticed promptly.
            let wait = self
                .scheduler
                .next_deadline()
                .map(|deadline| deadline.saturating_duration_since(self.rt.clock.now()))
                .unwrap_or(IDLE_POLL)
                .min(IDLE_POLL);

            match self.control.recv_timeout(wait).await {
                Ok(Some(envelope)) => self.inject(envelope),
                Ok(None) => {}
                Err(err) => {
                    tracing::warn!(error = %err, "control socket read failed");
                }
            }
        }
    }

    async fn dispatch(&mut self, event: QueuedEvent) -> Result<(), EngineError> {
        let QueuedEvent {
            envelope,
            external,
            fatal_if_unhandled,
        } = event;

        // Any external event defuses the pending state timeout.
        if external {
            self.scheduler.cancel_timer(STATE_TIMEOUT_TIMER);
        }

        self.ctx.insert(context::EVENT_DATA, envelope.to_event_data());

        let Some(transition) = self
            .def
            .find_transition(&self.state, &envelope.event_type, &self.ctx)
            .cloned()
        else {
            if fatal_if_unhandled {
                tracing::error!(
                    state = %self.state,
                    event = %envelope.event_type,
                    "unhandled error event, failing machine"
                );
                self.mark_failed();
                return Err(EngineError::FatalTransition {
                    state: self.state.clone(),
                    event: envelope.event_type,
                });
            }
            tracing::debug!(
                state = %self.state,
                event = %envelope.event_type,
                "no transition, event discarded"
            );
            return Ok(());
        };

        self.accept_transition(&transition.to, &envelope.event_type);
        self.run_entry_actions().await;
        Ok(())
    }

    /// Commit a transition: flip state, publish the broadcast record,
    /// update the machine-state row, and append to the transition log.
    fn accept_transition(&mut self, to: &str, trigger: &str) {
        let from = std::mem::replace(&mut self.state, to.to_string());
        self.ctx
            .insert(context::CURRENT_STATE, Value::String(to.to_string()));

        tracing::info!(from = %from, to = %to, event = %trigger, "transition");

        self.rt.broadcast.send(&BroadcastRecord::state_change(
            self.rt.machine_name.clone(),
            &from,
            to,
            trigger,
            self.rt.clock.epoch_secs(),
        ));

        let name = self.rt.machine_name.clone();
        if let Err(err) = self
            .rt
            .store
            .upsert_machine_state(&name, &self.def.name, to)
        {
            tracing::warn!(error = %err, "machine-state update failed");
        }
        if let Err(err) = self.rt.store.record_transition(&name, &from, to, trigger) {
            tracing::warn!(error = %err, "transition log append failed");
        }

        self.scheduler.cancel_timer(STATE_TIMEOUT_TIMER);
        self.arm_state_timeout();
    }

    fn arm_state_timeout(&mut self) {
        if let Some((secs, event)) = self.def.state_timeout(&self.state) {
            let now = self.rt.clock.now();
            self.scheduler.set_timer(
                STATE_TIMEOUT_TIMER.to_string(),
                event.to_string(),
                Duration::from_secs(secs),
                now,
            );
        }
    }

    /// Run the current state's entry actions in declared order.
    ///
    /// Configuration is interpolated here, once, immediately before each
    /// action runs, so later actions see context written by earlier ones.
    async fn run_entry_actions(&mut self) {
        let specs = self.def.entry_actions(&self.state).to_vec();
        for spec in specs {
            let Some((action, defaults)) = self.registry.get(&spec.action_type) else {
                // Unreachable after check_action_types, but a registry
                // mismatch must not panic the loop.
                tracing::error!(action = %spec.action_type, "action vanished from registry");
                self.push_front_internal(error_event("error"), true);
                return;
            };

            let mut merged = defaults.clone();
            for (key, value) in &spec.config {
                merged.insert(key.clone(), value.clone());
            }
            let resolved =
                machina_core::resolve_tree(&Value::Object(merged), &self.ctx);
            let config = ActionConfig::new(resolved);

            match action.run(&config, &mut self.ctx, &self.rt).await {
                Ok(Some(event)) => {
                    tracing::debug!(action = %spec.action_type, event = %event, "action event");
                    self.push_front_internal(
                        EventEnvelope::new(event).with_source("action"),
                        false,
                    );
                    return;
                }
                Ok(None) => continue,
                Err(err) => {
                    tracing::warn!(
                        action = %spec.action_type,
                        error = %err,
                        "action failed"
                    );
                    let event = config.outcome("error").unwrap_or_else(|| "error".to_string());
                    self.push_front_internal(error_event(&event), true);
                    return;
                }
            }
        }
    }

    fn mark_failed(&self) {
        if let Err(err) = self
            .rt
            .store
            .set_machine_status(&self.rt.machine_name, MachineStatus::Failed)
        {
            tracing::warn!(error = %err, "failed-status write failed");
        }
    }

    fn mark_stopped(&self) {
        if let Err(err) = self
            .rt
            .store
            .set_machine_status(&self.rt.machine_name, MachineStatus::Stopped)
        {
            tracing::warn!(error = %err, "stopped-status write failed");
        }
    }
}

fn error_event(name: &str) -> EventEnvelope {
    EventEnvelope::new(name).with_source("engine")
}

/// Watch SIGTERM/SIGINT from a background task; the loop polls the flag
/// so the orderly machine-state write happens on the engine's own turn,
/// never mid-action.
fn spawn_signal_watcher() -> std::io::Result<Arc<AtomicBool>> {
    let flag = Arc::new(AtomicBool::new(false));
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    let watched = Arc::clone(&flag);
    tokio::spawn(async move {
        tokio::select! {
            _ = sigterm.recv() => {}
            _ = sigint.recv() => {}
        }
        watched.store(true, Ordering::Relaxed);
    });
    Ok(flag)
}

#[cfg(test)]
#[path = "interpreter_tests.rs"]
mod tests;
