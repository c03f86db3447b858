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

//! Individual protection operators, each a small pure function. The
//! dispatch core walks these in the fixed canonical order: block,
//! system-recuperation, schema, required, selector, condition,
//! detect-changes, throttle, debounce, transform, timing gate, dispatch.
//! Keeping each operator free of the others' concerns is what lets the
//! pipeline compile itself from "only the operators whose config key is
//! present" without a chain-of-responsibility object graph.

use crate::clock::MonoMs;
use crate::config::{ConditionFn, SchemaFn, SelectorFn, TransformFn};
use crate::payload_state::{self, PayloadStateStore};
use crate::types::{CallResult, DeclineReason, Payload, Priority};

/// `true` if `block` is set. Always checked first: it is a fast, static
/// gate with no other inputs.
#[must_use]
pub fn op_block(block: bool) -> Option<CallResult> {
    block.then(|| CallResult::decline(DeclineReason::Blocked))
}

/// Declines non-critical calls while the breathing regulator is
/// recuperating. Critical-priority channels bypass this gate entirely —
/// the pipeline simply never compiles the operator in for them.
#[must_use]
pub fn op_system_recuperation(is_recuperating: bool, priority: Priority) -> Option<CallResult> {
    (is_recuperating && priority != Priority::Critical)
        .then(|| CallResult::decline(DeclineReason::SystemBusy))
}

/// Validates (and may transform) the payload. `Ok(payload)` is the
/// possibly-rewritten working payload; `Err` carries the decline.
pub fn op_schema(schema: &SchemaFn, payload: &Payload) -> Result<Payload, CallResult> {
    schema(payload).map_err(|detail| CallResult::decline_with_detail(DeclineReason::SchemaInvalid, detail))
}

/// Declines when the payload is considered empty (null, empty string,
/// empty array, empty object).
#[must_use]
pub fn op_required(required: bool, payload: &Payload) -> Option<CallResult> {
    (required && payload_state::is_empty_payload(payload))
        .then(|| CallResult::decline(DeclineReason::RequiredEmpty))
}

/// Narrows the payload to a derived projection. Infallible by type, but
/// the dispatch core still wraps the call in `catch_unwind` since a
/// selector closure is caller-supplied code.
#[must_use]
pub fn op_selector(selector: &SelectorFn, payload: &Payload) -> Payload {
    selector(payload)
}

/// Declines when the predicate returns `false`.
#[must_use]
pub fn op_condition(condition: &ConditionFn, payload: &Payload) -> Option<CallResult> {
    (!condition(payload)).then(|| CallResult::decline(DeclineReason::ConditionUnmet))
}

/// Declines when the working payload's fingerprint matches the last
/// accepted request fingerprint for this channel.
#[must_use]
pub fn op_detect_changes(
    detect_changes: bool,
    state: &PayloadStateStore,
    channel_id: &str,
    payload: &Payload,
) -> Option<CallResult> {
    (detect_changes && !state.has_changed(channel_id, payload))
        .then(|| CallResult::decline(DeclineReason::Unchanged))
}

/// Declines when less than `throttle` ms has elapsed since the channel's
/// last execution.
#[must_use]
pub fn op_throttle(throttle_ms: Option<u64>, last_exec: Option<MonoMs>, now: MonoMs) -> Option<CallResult> {
    let throttle_ms = throttle_ms?;
    let last_exec = last_exec?;
    (now.saturating_sub(last_exec) < throttle_ms).then(|| CallResult::decline(DeclineReason::Throttled))
}

/// Rewrites the payload unconditionally. Errors propagate as an operator
/// fault.
pub fn op_transform(transform: &TransformFn, payload: &Payload) -> Result<Payload, CallResult> {
    transform(payload).map_err(|detail| CallResult::decline_with_detail(DeclineReason::OperatorError, detail))
}

/// The debounce operator's tiny per-channel state machine: idle, armed
/// (waiting out the quiet period), or fired-by-maxwait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DebounceState {
    #[default]
    Idle,
    Armed {
        first_call_ms: MonoMs,
    },
}

/// What the debounce operator decided to do with this call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebounceDecision {
    /// Re-armed (or newly armed) the tail timer; caller gets a
    /// `debounced-deferred` status and the tail will fire later.
    Deferred,
    /// `maxWait` was exceeded: fire immediately with the latest payload
    /// and return to idle.
    FireByMaxWait,
}

/// Advances the debounce state machine for one incoming call. `state` is
/// mutated in place; the caller is responsible for (re)scheduling or
/// cancelling the actual tail timer based on the returned decision.
pub fn op_debounce(state: &mut DebounceState, now: MonoMs, max_wait_ms: Option<u64>) -> DebounceDecision {
    match *state {
        DebounceState::Idle => {
            *state = DebounceState::Armed { first_call_ms: now };
            DebounceDecision::Deferred
        }
        DebounceState::Armed { first_call_ms } => {
            if let Some(max_wait) = max_wait_ms {
                if now.saturating_sub(first_call_ms) >= max_wait {
                    *state = DebounceState::Idle;
                    return DebounceDecision::FireByMaxWait;
                }
            }
            DebounceDecision::Deferred
        }
    }
}

/// Resets the debounce state machine to idle, e.g. once the tail fires or
/// the channel is forgotten.
pub fn reset_debounce(state: &mut DebounceState) {
    *state = DebounceState::Idle;
}
