/*
 *   Copyright (c) 2022 R3BL LLC
 *   All rights reserved.
 *
 *   Licensed under the Apache License, Version 2.0 (the "License");
 *   you may not use this file except in compliance with the License.
 *   You may obtain a copy of the License at
 *
 *   http://www.apache.org/licenses/LICENSE-2.0
 *
 *   Unless required by applicable law or agreed to in writing, software
 *   distributed under the License is distributed on an "AS IS" BASIS,
 *   WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *   See the License for the specific language governing permissions and
 *   limitations under the License.
 */

//! The orchestrator ties the registry, scheduler, breathing regulator,
//! payload state and metrics bus into the single entry point host code
//! calls: `register`, `subscribe`, `call`, `forget`, `tick`, `shutdown`.
//!
//! All of it lives behind one `Arc<tokio::sync::Mutex<OrchestratorState>>`,
//! the same shape as a thread-safe async store kept behind a
//! `Arc<RwLock<Store<S, A>>>` — except a plain `Mutex` here, not a
//! `RwLock`: the scheduling model is single-threaded cooperative (handlers
//! run to completion before the next tick), so there is never a case where
//! concurrent *readers* are wanted while a writer is excluded. One call or
//! tick holds the lock for its whole duration, including awaited handler
//! invocations, and a chain link recurses without re-acquiring it.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, trace, warn};

use crate::breathing::{BreathingConfig, BreathingRegulator, BreathingState, Pattern, StressInputs};
use crate::clock::{Clock, MonoMs, SystemClock};
use crate::config::ChannelConfig;
use crate::dispatch;
use crate::error::CyreResult;
use crate::handler::SharedHandler;
use crate::metrics::{ChannelCounters, MetricEvent, MetricKind, MetricsBus};
use crate::operators::{
    op_block, op_condition, op_debounce, op_detect_changes, op_required, op_schema, op_selector,
    op_system_recuperation, op_throttle, op_transform, reset_debounce, DebounceDecision,
};
use crate::payload_state::PayloadStateStore;
use crate::registry::{ActionRegistry, PipelineOp};
use crate::timekeeper::{TimeKeeper, TimerKind};
use crate::types::{CallMetadata, CallResult, DeclineReason, HandlerOutcome, Payload, Repeat};

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Soft ceiling (ms) above which p95 execution latency counts as maximal
/// stress input; the same "normalised to a soft ceiling" treatment applied
/// to call rate.
const LATENCY_SOFT_CEILING_MS: f64 = 250.0;
/// Soft ceiling (ms) above which observed scheduler drift counts as
/// maximal host-load stress input.
const DRIFT_SOFT_CEILING_MS: f64 = 500.0;

struct OrchestratorState {
    registry: ActionRegistry,
    timekeeper: TimeKeeper,
    payload_state: PayloadStateStore,
    metrics: MetricsBus,
    breathing: BreathingRegulator,
    clock: Arc<dyn Clock>,
    shutdown: bool,
}

/// Cheaply-cloneable handle to the orchestrator. Every method acquires the
/// shared lock for the duration of the operation.
#[derive(Clone)]
pub struct Orchestrator {
    state: Arc<Mutex<OrchestratorState>>,
}

/// Returned by [`Orchestrator::subscribe`]; dropping it does nothing — call
/// [`Unsubscribe::unsubscribe`] explicitly to detach the handler(s).
pub struct Unsubscribe {
    orchestrator: Orchestrator,
    channel_id: String,
}

impl Unsubscribe {
    pub async fn unsubscribe(self) {
        let mut state = self.orchestrator.state.lock().await;
        state.registry.set_handlers(&self.channel_id, Vec::new());
    }
}

impl Default for Orchestrator {
    fn default() -> Self { Self::new(Arc::new(SystemClock::new())) }
}

impl Orchestrator {
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Arc::new(Mutex::new(OrchestratorState {
                registry: ActionRegistry::new(),
                timekeeper: TimeKeeper::new(),
                payload_state: PayloadStateStore::new(),
                metrics: MetricsBus::new(4096),
                breathing: BreathingRegulator::new(BreathingConfig::default()),
                clock,
                shutdown: false,
            })),
        }
    }

    #[must_use]
    pub fn with_metrics_capacity(clock: Arc<dyn Clock>, capacity: usize) -> Self {
        let orchestrator = Self::new(clock);
        let mut guard = orchestrator.state.try_lock().expect("fresh orchestrator is uncontended");
        guard.metrics = MetricsBus::new(capacity);
        drop(guard);
        orchestrator
    }

    // ---- registration -----------------------------------------------

    pub async fn register(&self, config: ChannelConfig) -> CyreResult<()> {
        let mut state = self.state.lock().await;
        let id = config.id.clone();
        if let Err(err) = state.registry.register(config) {
            debug!(channel = %id, %err, "channel registration rejected");
            return Err(err);
        }
        // Re-registering replaces any previous timers/debounce state for
        // the id; a fresh id has nothing to cancel, so this is cheap.
        state.timekeeper.cancel_channel(&id);
        info!(channel = %id, "channel registered");
        Ok(())
    }

    pub async fn subscribe(&self, id: impl Into<String>, handler: SharedHandler) -> Unsubscribe {
        self.subscribe_many(id, vec![handler]).await
    }

    pub async fn subscribe_many(&self, id: impl Into<String>, handlers: Vec<SharedHandler>) -> Unsubscribe {
        let id = id.into();
        let mut state = self.state.lock().await;
        state.registry.set_handlers(&id, handlers);
        Unsubscribe {
            orchestrator: self.clone(),
            channel_id: id,
        }
    }

    pub async fn forget(&self, id: &str) -> bool {
        let mut state = self.state.lock().await;
        state.timekeeper.cancel_channel(id);
        state.payload_state.forget(id);
        state.metrics.forget_channel(id);
        let forgotten = state.registry.forget(id);
        info!(channel = %id, forgotten, "channel forgotten");
        forgotten
    }

    pub async fn clear(&self) {
        let mut state = self.state.lock().await;
        state.registry.clear();
        state.timekeeper = TimeKeeper::new();
        state.payload_state = PayloadStateStore::new();
        state.metrics.clear();
        state.breathing.reset();
    }

    pub async fn lock(&self) {
        self.state.lock().await.registry.lock();
        info!("registry locked: no new registrations accepted");
    }

    pub async fn unlock(&self) {
        self.state.lock().await.registry.unlock();
        info!("registry unlocked");
    }

    pub async fn is_locked(&self) -> bool { self.state.lock().await.registry.is_locked() }

    /// Cancels every outstanding timer, stops the metrics bus from
    /// accepting new events, and locks out new registrations. Pending
    /// debounce payloads are dropped, not drained — `shutdown` is a hard
    /// stop, not a flush.
    pub async fn shutdown(&self) {
        let mut state = self.state.lock().await;
        state.registry.lock();
        state.timekeeper = TimeKeeper::new();
        state.metrics.close();
        state.shutdown = true;
        info!("orchestrator shut down: timers cancelled, registrations locked out");
    }

    pub async fn is_shutdown(&self) -> bool { self.state.lock().await.shutdown }

    // ---- introspection ------------------------------------------------

    pub async fn get(&self, id: &str) -> Option<ChannelConfig> {
        self.state.lock().await.registry.config(id).cloned()
    }

    pub async fn has_changed(&self, id: &str, payload: &Payload) -> bool {
        self.state.lock().await.payload_state.has_changed(id, payload)
    }

    pub async fn get_metrics(&self, id: Option<&str>) -> ChannelCounters {
        let state = self.state.lock().await;
        match id {
            Some(id) => state.metrics.channel_counters(id),
            None => state.metrics.global_counters(),
        }
    }

    pub async fn get_breathing_state(&self) -> BreathingState {
        self.state.lock().await.breathing.snapshot()
    }

    // ---- the dispatcher entry point ------------------------------------

    /// Fires a call through the full pipeline: protections, scheduling
    /// deferral, handler invocation, and any resulting chain link.
    pub async fn call(&self, id: &str, payload: Option<Payload>) -> CallResult {
        let mut state = self.state.lock().await;
        let now = state.clock.now();
        self.sample_breathing(&mut state, now);
        Self::call_channel(&mut state, id, payload).await
    }

    /// Drives the scheduler forward to `now` (or the orchestrator's own
    /// clock if not supplied), firing every due timer.
    pub async fn tick(&self) -> Vec<CallResult> {
        let mut state = self.state.lock().await;
        let now = state.clock.now();

        let rate = state.breathing.snapshot().rate;
        let due = state.timekeeper.pop_due(now, rate);
        for record in &due {
            state.clock.observe_drift(record.due_ms, now);
        }
        self.sample_breathing(&mut state, now);

        trace!(now, due = due.len(), rate, "scheduler tick");
        let mut results = Vec::with_capacity(due.len());
        for record in due {
            let channel_id = record.channel_id().to_string();
            let kind = record.kind;
            let payload = record.payload;
            let result = match kind {
                TimerKind::DebounceTail => {
                    Self::resume_after_debounce_tail(&mut state, &channel_id, payload, now).await
                }
                TimerKind::Delay | TimerKind::Interval => {
                    Self::dispatch_handlers(&mut state, &channel_id, payload.unwrap_or(Payload::Null), now).await
                }
            };
            results.push(result);
        }
        results
    }

    /// Samples the breathing regulator from the current metrics snapshot
    /// and observed scheduler drift. Called on every `call` and `tick` so
    /// stress is reachable from either path, not just a host that happens
    /// to drive a background ticker.
    fn sample_breathing(&self, state: &mut OrchestratorState, now: MonoMs) {
        let global = state.metrics.global_counters();
        let latency = state
            .metrics
            .p95_execution_latency_ms()
            .map_or(0.0, |p95| (p95 as f64 / LATENCY_SOFT_CEILING_MS).min(1.0));
        let host_load = (state.clock.last_drift_ms() as f64 / DRIFT_SOFT_CEILING_MS).min(1.0);
        let inputs = StressInputs {
            call_rate: (global.calls as f64 / 100.0).min(1.0),
            latency,
            error_rate: if global.calls == 0 {
                0.0
            } else {
                (global.errors as f64 / global.calls as f64).min(1.0)
            },
            host_load,
        };
        if let Some(transition) = state.breathing.sample(inputs, now) {
            if transition.to == Pattern::Recovery {
                warn!(stress = state.breathing.snapshot().stress, "breathing pattern entering RECOVERY");
            } else {
                info!("breathing pattern returning to NORMAL");
            }
            state.metrics.record(MetricEvent {
                ts: now,
                channel_id: String::new(),
                kind: MetricKind::Intralink,
                duration_ms: None,
                reason: None,
                meta: Some(format!("breathing pattern {:?} -> {:?}", transition.from, transition.to)),
            });
        }
    }

    /// Runs the full protection pipeline for `id`, recursing through chain
    /// links via normal dispatch (the full pipeline applies to each hop).
    fn call_channel<'a>(
        state: &'a mut OrchestratorState,
        id: &'a str,
        payload: Option<Payload>,
    ) -> BoxFuture<'a, CallResult> {
        Box::pin(async move {
            let now = state.clock.now();
            state.metrics.record(MetricEvent {
                ts: now,
                channel_id: id.to_string(),
                kind: MetricKind::Call,
                duration_ms: None,
                reason: None,
                meta: None,
            });

            let Some(config) = state.registry.config(id).cloned() else {
                Self::record_skip(state, id, now, DeclineReason::ChannelMissing);
                return CallResult::decline(DeclineReason::ChannelMissing);
            };
            if config.is_repeat_zero_noop() {
                // `repeat: 0` is a permanent no-op regardless of whether a
                // `TimingGate` step was even compiled (it only compiles when
                // `delay`/`interval` is present) — every call short-circuits
                // here instead.
                return CallResult::no_op();
            }
            let pipeline: Vec<PipelineOp> = state.registry.pipeline(id).unwrap_or(&[]).to_vec();
            let is_recuperating = state.breathing.snapshot().is_recuperating;

            let mut working = payload.unwrap_or_else(|| config.payload.clone().unwrap_or(Payload::Null));

            for op in pipeline.iter() {
                match op {
                    PipelineOp::Block => {
                        if let Some(decline) = op_block(config.block) {
                            Self::record_skip(state, id, now, DeclineReason::Blocked);
                            return decline;
                        }
                    }
                    PipelineOp::SystemRecuperation => {
                        if let Some(decline) = op_system_recuperation(is_recuperating, config.priority) {
                            Self::record_skip(state, id, now, DeclineReason::SystemBusy);
                            return decline;
                        }
                    }
                    PipelineOp::Schema => {
                        let schema = config.schema.as_ref().expect("compiled because schema is Some");
                        match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| op_schema(schema, &working))) {
                            Ok(Ok(next)) => working = next,
                            Ok(Err(decline)) => {
                                Self::record_skip(state, id, now, DeclineReason::SchemaInvalid);
                                return decline;
                            }
                            Err(_) => {
                                Self::record_error(state, id, now);
                                return CallResult::decline_with_detail(DeclineReason::OperatorError, "schema panicked");
                            }
                        }
                    }
                    PipelineOp::Required => {
                        if let Some(decline) = op_required(config.required, &working) {
                            Self::record_skip(state, id, now, DeclineReason::RequiredEmpty);
                            return decline;
                        }
                    }
                    PipelineOp::Selector => {
                        let selector = config.selector.as_ref().expect("compiled because selector is Some");
                        match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| op_selector(selector, &working))) {
                            Ok(next) => working = next,
                            Err(_) => {
                                Self::record_error(state, id, now);
                                return CallResult::decline_with_detail(DeclineReason::OperatorError, "selector panicked");
                            }
                        }
                    }
                    PipelineOp::Condition => {
                        let condition = config.condition.as_ref().expect("compiled because condition is Some");
                        match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| op_condition(condition, &working))) {
                            Ok(Some(decline)) => {
                                Self::record_skip(state, id, now, DeclineReason::ConditionUnmet);
                                return decline;
                            }
                            Ok(None) => {}
                            Err(_) => {
                                Self::record_error(state, id, now);
                                return CallResult::decline_with_detail(DeclineReason::OperatorError, "condition panicked");
                            }
                        }
                    }
                    PipelineOp::DetectChanges => {
                        if let Some(decline) = op_detect_changes(config.detect_changes, &state.payload_state, id, &working) {
                            Self::record_skip(state, id, now, DeclineReason::Unchanged);
                            return decline;
                        }
                    }
                    PipelineOp::Throttle => {
                        let last_exec = state.registry.runtime(id).and_then(|r| r.last_exec);
                        if let Some(decline) = op_throttle(config.throttle, last_exec, now) {
                            Self::record_skip(state, id, now, DeclineReason::Throttled);
                            return decline;
                        }
                    }
                    PipelineOp::Debounce => {
                        let Some(runtime) = state.registry.runtime_mut(id) else {
                            Self::record_skip(state, id, now, DeclineReason::ChannelMissing);
                            return CallResult::decline(DeclineReason::ChannelMissing);
                        };
                        let decision = op_debounce(&mut runtime.debounce_state, now, config.max_wait);
                        match decision {
                            DebounceDecision::Deferred => {
                                let due = now + config.debounce.unwrap_or(0);
                                state.timekeeper.reschedule_debounce_tail(id, Some(working.clone()), due);
                                state.metrics.record(MetricEvent {
                                    ts: now,
                                    channel_id: id.to_string(),
                                    kind: MetricKind::Debounce,
                                    duration_ms: None,
                                    reason: Some(DeclineReason::DebouncedDeferred),
                                    meta: None,
                                });
                                return CallResult::debounced();
                            }
                            DebounceDecision::FireByMaxWait => {
                                state.timekeeper.cancel_debounce_tail(id);
                                // Fall through: the pipeline resumes at the
                                // next step with the latest payload.
                            }
                        }
                    }
                    PipelineOp::Transform => {
                        let transform = config.transform.as_ref().expect("compiled because transform is Some");
                        match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| op_transform(transform, &working))) {
                            Ok(Ok(next)) => working = next,
                            Ok(Err(decline)) => {
                                Self::record_error(state, id, now);
                                return decline;
                            }
                            Err(_) => {
                                Self::record_error(state, id, now);
                                return CallResult::decline_with_detail(DeclineReason::OperatorError, "transform panicked");
                            }
                        }
                    }
                    PipelineOp::TimingGate => {
                        // `is_repeat_zero_noop` configs never reach this op:
                        // `call_channel` short-circuits on them before the
                        // pipeline loop starts.
                        state.payload_state.record_request(id, &working);
                        let due = now + config.delay.unwrap_or(0);
                        let scheduled = if let Some(interval) = config.interval {
                            let repeat = config.repeat.unwrap_or(Repeat::Never);
                            state
                                .timekeeper
                                .schedule_interval(id, Some(working.clone()), due, interval, repeat, config.priority)
                                .is_some()
                        } else {
                            state.timekeeper.schedule_delay(id, Some(working.clone()), due);
                            true
                        };
                        return if scheduled { CallResult::scheduled() } else { CallResult::no_op() };
                    }
                }
            }

            state.payload_state.record_request(id, &working);
            Self::dispatch_handlers(state, id, working, now).await
        })
    }

    /// Re-enters the pipeline once a debounce tail timer fires: detectChanges
    /// and throttle still apply to the fired payload, then transform and the
    /// timing gate run normally. Checked directly off `config` rather than by
    /// slicing the compiled pipeline after `Debounce` — canonical order always
    /// places `DetectChanges`/`Throttle` *before* `Debounce`, so a slice taken
    /// after it would never contain them.
    fn resume_after_debounce_tail<'a>(
        state: &'a mut OrchestratorState,
        id: &'a str,
        payload: Option<Payload>,
        now: MonoMs,
    ) -> BoxFuture<'a, CallResult> {
        Box::pin(async move {
            let Some(config) = state.registry.config(id).cloned() else {
                return CallResult::decline(DeclineReason::ChannelMissing);
            };
            let mut working = payload.unwrap_or(Payload::Null);

            // The tail timer firing ends the debounce window regardless of
            // what the rest of the pipeline does with the fired payload —
            // reset now so a later, unrelated burst starts from Idle rather
            // than inheriting this one's `first_call_ms`.
            if let Some(runtime) = state.registry.runtime_mut(id) {
                reset_debounce(&mut runtime.debounce_state);
            }

            if let Some(decline) = op_detect_changes(config.detect_changes, &state.payload_state, id, &working) {
                Self::record_skip(state, id, now, DeclineReason::Unchanged);
                return decline;
            }

            let last_exec = state.registry.runtime(id).and_then(|r| r.last_exec);
            if let Some(decline) = op_throttle(config.throttle, last_exec, now) {
                Self::record_skip(state, id, now, DeclineReason::Throttled);
                return decline;
            }

            if let Some(transform) = config.transform.as_ref() {
                match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| op_transform(transform, &working))) {
                    Ok(Ok(next)) => working = next,
                    Ok(Err(decline)) => {
                        Self::record_error(state, id, now);
                        return decline;
                    }
                    Err(_) => {
                        Self::record_error(state, id, now);
                        return CallResult::decline_with_detail(DeclineReason::OperatorError, "transform panicked");
                    }
                }
            }

            if config.delay.is_some() || config.interval.is_some() {
                if config.is_repeat_zero_noop() {
                    return CallResult::no_op();
                }
                state.payload_state.record_request(id, &working);
                let due = now + config.delay.unwrap_or(0);
                let scheduled = if let Some(interval) = config.interval {
                    let repeat = config.repeat.unwrap_or(Repeat::Never);
                    state
                        .timekeeper
                        .schedule_interval(id, Some(working.clone()), due, interval, repeat, config.priority)
                        .is_some()
                } else {
                    state.timekeeper.schedule_delay(id, Some(working.clone()), due);
                    true
                };
                return if scheduled { CallResult::scheduled() } else { CallResult::no_op() };
            }

            state.payload_state.record_request(id, &working);
            Self::dispatch_handlers(state, id, working, now).await
        })
    }

    /// Invokes the channel's handlers against an already-accepted payload,
    /// records the execution, and recurses once for a chain link.
    fn dispatch_handlers<'a>(
        state: &'a mut OrchestratorState,
        id: &'a str,
        working: Payload,
        now: MonoMs,
    ) -> BoxFuture<'a, CallResult> {
        Box::pin(async move {
            let Some(config) = state.registry.config(id).cloned() else {
                return CallResult::decline(DeclineReason::ChannelMissing);
            };
            let invocation = config.invocation;
            let error_strategy = config.error_strategy;
            let handlers = state.registry.runtime(id).map(|r| r.handlers.clone()).unwrap_or_default();

            trace!(channel = %id, handlers = handlers.len(), ?invocation, "dispatching handlers");
            let results = dispatch::run_handlers(&handlers, working.clone(), invocation).await;
            let reconciled = dispatch::reconcile(&results, error_strategy);

            if let Some(runtime) = state.registry.runtime_mut(id) {
                runtime.last_exec = Some(now);
                reset_debounce(&mut runtime.debounce_state);
            }

            let finished_at = state.clock.now();
            let duration_ms = finished_at.saturating_sub(now);

            match reconciled {
                Err(fault) => {
                    Self::record_error(state, id, now);
                    CallResult {
                        ok: false,
                        payload: None,
                        message: format!("handler fault: {fault}"),
                        metadata: Some(CallMetadata {
                            duration_ms: Some(duration_ms),
                            ..Default::default()
                        }),
                    }
                }
                Ok(HandlerOutcome::Value(value)) => {
                    state.metrics.record(MetricEvent {
                        ts: now,
                        channel_id: id.to_string(),
                        kind: MetricKind::Execution,
                        duration_ms: Some(duration_ms),
                        reason: None,
                        meta: None,
                    });
                    state.payload_state.record_response(id, value.clone());
                    CallResult::executed(value, duration_ms)
                }
                Ok(HandlerOutcome::Link(link)) => {
                    // The handler ran to completion on this hop, which is an
                    // execution in its own right, and additionally enqueues
                    // a follow-up call, recorded as its own `Intralink`
                    // event.
                    state.metrics.record(MetricEvent {
                        ts: now,
                        channel_id: id.to_string(),
                        kind: MetricKind::Execution,
                        duration_ms: Some(duration_ms),
                        reason: None,
                        meta: None,
                    });
                    let response = serde_json::json!({"link": link.id, "payload": link.payload});
                    state.payload_state.record_response(id, response);
                    state.metrics.record(MetricEvent {
                        ts: now,
                        channel_id: id.to_string(),
                        kind: MetricKind::Intralink,
                        duration_ms: Some(duration_ms),
                        reason: None,
                        meta: Some(format!("-> {}", link.id)),
                    });
                    let chained = Self::call_channel(state, &link.id, link.payload).await;
                    CallResult {
                        ok: true,
                        payload: None,
                        message: "ok".to_string(),
                        metadata: Some(CallMetadata {
                            duration_ms: Some(duration_ms),
                            chain_result: Some(Box::new(chained)),
                            ..Default::default()
                        }),
                    }
                }
                Ok(HandlerOutcome::None) => {
                    state.metrics.record(MetricEvent {
                        ts: now,
                        channel_id: id.to_string(),
                        kind: MetricKind::Execution,
                        duration_ms: Some(duration_ms),
                        reason: None,
                        meta: None,
                    });
                    CallResult::no_op()
                }
            }
        })
    }

    fn record_skip(state: &mut OrchestratorState, id: &str, now: MonoMs, reason: DeclineReason) {
        debug!(channel = %id, reason = reason.message(), "call declined");
        state.metrics.record(MetricEvent {
            ts: now,
            channel_id: id.to_string(),
            kind: MetricKind::Skip,
            duration_ms: None,
            reason: Some(reason),
            meta: None,
        });
    }

    fn record_error(state: &mut OrchestratorState, id: &str, now: MonoMs) {
        debug!(channel = %id, "operator or handler fault");
        state.metrics.record(MetricEvent {
            ts: now,
            channel_id: id.to_string(),
            kind: MetricKind::Error,
            duration_ms: None,
            reason: Some(DeclineReason::OperatorError),
            meta: None,
        });
    }
}

/// Spawns a background task that calls [`Orchestrator::tick`] on a fixed
/// period until the orchestrator is shut down. Host applications that
/// don't want to drive ticking themselves can spawn this once at startup.
pub fn spawn_ticker(orchestrator: Orchestrator, period: std::time::Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(period).await;
            if orchestrator.is_shutdown().await {
                break;
            }
            orchestrator.tick().await;
        }
    })
}
