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

//! Shared data model: payload, priority, repeat count, decline reasons and
//! the call result shape.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum_macros::{Display, EnumString};

/// The payload carried by a call. Cyre is payload-shape-agnostic; `Value`
/// gives producers/consumers the same "any JSON-like value" flexibility,
/// while still being structurally hashable for change detection
/// (`crate::payload_state::fingerprint`).
pub type Payload = Value;

/// A channel's scheduling priority. Ordering of variants is
/// low-to-critical, which makes `Priority::Critical` the max on
/// `#[derive(PartialOrd, Ord)]`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum Priority {
    Background,
    Low,
    Medium,
    High,
    Critical,
}

impl Default for Priority {
    fn default() -> Self { Priority::Medium }
}

/// How many times a periodic channel should fire: `repeat: true` /
/// `Infinity` runs forever, `repeat: n` runs `n` times, `repeat: 0` never
/// schedules at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Repeat {
    /// `repeat: 0` — channel registers but never schedules.
    Never,
    /// `repeat: n` — exactly `n` fires counting the first.
    Times(u32),
    /// `repeat: true` / `Infinity` — periodic forever.
    Forever,
}

impl Repeat {
    /// `Times(0)` is the same permanent no-op as `Never` — there's no fire
    /// left to schedule either way.
    #[must_use]
    pub fn is_never(self) -> bool { matches!(self, Repeat::Never | Repeat::Times(0)) }
}

/// The fixed set of decline reason codes. `message` on a [`CallResult`]
/// always matches one of these when `ok == false`, or is
/// `"debounced-deferred"` on the one case (debounce) where `ok == true` but
/// execution was deferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum DeclineReason {
    Blocked,
    SystemBusy,
    SchemaInvalid,
    RequiredEmpty,
    ConditionUnmet,
    Unchanged,
    Throttled,
    DebouncedDeferred,
    OperatorError,
    ChannelMissing,
    TimerFailed,
}

impl DeclineReason {
    #[must_use]
    pub fn message(self) -> &'static str {
        match self {
            DeclineReason::Blocked => "blocked",
            DeclineReason::SystemBusy => "system-busy",
            DeclineReason::SchemaInvalid => "schema-invalid",
            DeclineReason::RequiredEmpty => "required-empty",
            DeclineReason::ConditionUnmet => "condition-unmet",
            DeclineReason::Unchanged => "unchanged",
            DeclineReason::Throttled => "throttled",
            DeclineReason::DebouncedDeferred => "debounced-deferred",
            DeclineReason::OperatorError => "operator-error",
            DeclineReason::ChannelMissing => "channel-missing",
            DeclineReason::TimerFailed => "timer failed",
        }
    }
}

/// Extra detail attached to a [`CallResult`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CallMetadata {
    /// `true` when the working payload was handed off to the scheduler
    /// instead of executing synchronously.
    pub scheduled: bool,
    /// Result of a chain link enqueued by a handler's return value.
    pub chain_result: Option<Box<CallResult>>,
    pub duration_ms: Option<u64>,
}

/// `{ok, payload?, message, metadata?}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallResult {
    pub ok: bool,
    pub payload: Option<Payload>,
    pub message: String,
    pub metadata: Option<CallMetadata>,
}

impl CallResult {
    #[must_use]
    pub fn executed(payload: Payload, duration_ms: u64) -> Self {
        Self {
            ok: true,
            payload: Some(payload),
            message: "ok".to_string(),
            metadata: Some(CallMetadata {
                duration_ms: Some(duration_ms),
                ..Default::default()
            }),
        }
    }

    #[must_use]
    pub fn no_op() -> Self {
        Self {
            ok: true,
            payload: None,
            message: "did not execute".to_string(),
            metadata: None,
        }
    }

    #[must_use]
    pub fn scheduled() -> Self {
        Self {
            ok: true,
            payload: None,
            message: "scheduled".to_string(),
            metadata: Some(CallMetadata {
                scheduled: true,
                ..Default::default()
            }),
        }
    }

    #[must_use]
    pub fn debounced() -> Self {
        Self {
            ok: true,
            payload: None,
            message: DeclineReason::DebouncedDeferred.message().to_string(),
            metadata: Some(CallMetadata {
                scheduled: true,
                ..Default::default()
            }),
        }
    }

    #[must_use]
    pub fn decline(reason: DeclineReason) -> Self {
        Self {
            ok: false,
            payload: None,
            message: reason.message().to_string(),
            metadata: None,
        }
    }

    #[must_use]
    pub fn decline_with_detail(reason: DeclineReason, detail: impl Into<String>) -> Self {
        Self {
            ok: false,
            payload: None,
            message: format!("{}: {}", reason.message(), detail.into()),
            metadata: None,
        }
    }
}

/// A handler return value recognised as enqueuing a follow-up call
/// (chain links). Handlers return
/// `HandlerOutcome::Value` for a plain result or `HandlerOutcome::Link` to
/// chain into another channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkCommand {
    pub id: String,
    pub payload: Option<Payload>,
}

#[derive(Debug, Clone)]
pub enum HandlerOutcome {
    Value(Payload),
    Link(LinkCommand),
    None,
}
