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

//! Channel configuration: an explicit, enumerated record with coherence
//! checks, built fluently the way the rest of this crate's builders read.
//! `schema`/`selector`/`condition`/`transform` are pure functions of the
//! payload and carry no useful wire representation, so they are
//! `#[serde(skip)]`: a deserialized config never reconstructs them, only
//! the builder API does.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{CyreError, CyreResult};
use crate::types::{Payload, Priority, Repeat};

pub type SchemaFn = Arc<dyn Fn(&Payload) -> Result<Payload, String> + Send + Sync>;
pub type SelectorFn = Arc<dyn Fn(&Payload) -> Payload + Send + Sync>;
pub type ConditionFn = Arc<dyn Fn(&Payload) -> bool + Send + Sync>;
pub type TransformFn = Arc<dyn Fn(&Payload) -> Result<Payload, String> + Send + Sync>;

/// How a channel's subscribed handlers are invoked for one accepted call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InvocationStrategy {
    /// All handlers run concurrently against the same payload.
    #[default]
    Parallel,
    /// Handlers run one after another against the same payload.
    Sequential,
    /// Handlers run one after another, each fed the previous handler's
    /// output.
    Waterfall,
    /// All handlers run concurrently; the first to complete wins.
    Race,
}

/// How multiple handler errors are aggregated for `Sequential`/`Parallel`
/// invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorStrategy {
    /// The first handler error decides the outcome for the whole call.
    #[default]
    FailFast,
    /// Collect every handler's outcome; the call only fails if all of them
    /// failed.
    Continue,
}

/// Per-channel declarative configuration (immutable after registration;
/// replaced wholesale by re-registering the same id).
#[derive(Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChannelConfig {
    pub id: String,
    pub channel_type: Option<String>,

    pub delay: Option<u64>,
    pub interval: Option<u64>,
    pub repeat: Option<Repeat>,

    pub throttle: Option<u64>,
    pub debounce: Option<u64>,
    pub max_wait: Option<u64>,
    #[serde(default)]
    pub detect_changes: bool,
    #[serde(default)]
    pub block: bool,

    #[serde(default)]
    pub required: bool,
    #[serde(skip)]
    pub schema: Option<SchemaFn>,
    #[serde(skip)]
    pub selector: Option<SelectorFn>,
    #[serde(skip)]
    pub condition: Option<ConditionFn>,
    #[serde(skip)]
    pub transform: Option<TransformFn>,

    #[serde(default)]
    pub priority: Priority,
    pub path: Option<String>,
    pub payload: Option<Payload>,

    #[serde(default)]
    pub invocation: InvocationStrategy,
    #[serde(default)]
    pub error_strategy: ErrorStrategy,
}

impl fmt::Debug for ChannelConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelConfig")
            .field("id", &self.id)
            .field("channel_type", &self.channel_type)
            .field("delay", &self.delay)
            .field("interval", &self.interval)
            .field("repeat", &self.repeat)
            .field("throttle", &self.throttle)
            .field("debounce", &self.debounce)
            .field("max_wait", &self.max_wait)
            .field("detect_changes", &self.detect_changes)
            .field("block", &self.block)
            .field("required", &self.required)
            .field("has_schema", &self.schema.is_some())
            .field("has_selector", &self.selector.is_some())
            .field("has_condition", &self.condition.is_some())
            .field("has_transform", &self.transform.is_some())
            .field("priority", &self.priority)
            .field("path", &self.path)
            .field("invocation", &self.invocation)
            .field("error_strategy", &self.error_strategy)
            .finish()
    }
}

impl ChannelConfig {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            channel_type: None,
            delay: None,
            interval: None,
            repeat: None,
            throttle: None,
            debounce: None,
            max_wait: None,
            detect_changes: false,
            block: false,
            required: false,
            schema: None,
            selector: None,
            condition: None,
            transform: None,
            priority: Priority::default(),
            path: None,
            payload: None,
            invocation: InvocationStrategy::default(),
            error_strategy: ErrorStrategy::default(),
        }
    }

    #[must_use]
    pub fn channel_type(mut self, value: impl Into<String>) -> Self {
        self.channel_type = Some(value.into());
        self
    }

    #[must_use]
    pub fn delay(mut self, ms: u64) -> Self {
        self.delay = Some(ms);
        self
    }

    #[must_use]
    pub fn interval(mut self, ms: u64) -> Self {
        self.interval = Some(ms);
        self
    }

    #[must_use]
    pub fn repeat(mut self, repeat: Repeat) -> Self {
        self.repeat = Some(repeat);
        self
    }

    #[must_use]
    pub fn throttle(mut self, ms: u64) -> Self {
        self.throttle = Some(ms);
        self
    }

    #[must_use]
    pub fn debounce(mut self, ms: u64) -> Self {
        self.debounce = Some(ms);
        self
    }

    #[must_use]
    pub fn max_wait(mut self, ms: u64) -> Self {
        self.max_wait = Some(ms);
        self
    }

    #[must_use]
    pub fn detect_changes(mut self, enabled: bool) -> Self {
        self.detect_changes = enabled;
        self
    }

    #[must_use]
    pub fn block(mut self, enabled: bool) -> Self {
        self.block = enabled;
        self
    }

    #[must_use]
    pub fn required(mut self, enabled: bool) -> Self {
        self.required = enabled;
        self
    }

    #[must_use]
    pub fn schema(mut self, f: impl Fn(&Payload) -> Result<Payload, String> + Send + Sync + 'static) -> Self {
        self.schema = Some(Arc::new(f));
        self
    }

    #[must_use]
    pub fn selector(mut self, f: impl Fn(&Payload) -> Payload + Send + Sync + 'static) -> Self {
        self.selector = Some(Arc::new(f));
        self
    }

    #[must_use]
    pub fn condition(mut self, f: impl Fn(&Payload) -> bool + Send + Sync + 'static) -> Self {
        self.condition = Some(Arc::new(f));
        self
    }

    #[must_use]
    pub fn transform(mut self, f: impl Fn(&Payload) -> Result<Payload, String> + Send + Sync + 'static) -> Self {
        self.transform = Some(Arc::new(f));
        self
    }

    #[must_use]
    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    #[must_use]
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    #[must_use]
    pub fn payload(mut self, payload: Payload) -> Self {
        self.payload = Some(payload);
        self
    }

    #[must_use]
    pub fn invocation(mut self, strategy: InvocationStrategy) -> Self {
        self.invocation = strategy;
        self
    }

    #[must_use]
    pub fn error_strategy(mut self, strategy: ErrorStrategy) -> Self {
        self.error_strategy = strategy;
        self
    }

    /// Check the coherence invariants a config must satisfy before it is
    /// accepted into the registry. Does not mutate `self`.
    pub fn validate(&self) -> CyreResult<()> {
        if self.id.trim().is_empty() {
            return Err(CyreError::EmptyChannelId);
        }

        if self.throttle.is_some() && self.debounce.is_some() {
            return Err(CyreError::ThrottleDebounceConflict { id: self.id.clone() });
        }

        if let Some(max_wait) = self.max_wait {
            let Some(debounce) = self.debounce else {
                return Err(CyreError::MaxWaitRequiresDebounce { id: self.id.clone() });
            };
            if max_wait <= debounce {
                return Err(CyreError::MaxWaitNotGreaterThanDebounce {
                    id: self.id.clone(),
                    debounce,
                    max_wait,
                });
            }
        }

        if self.interval.is_some() && self.repeat.is_none() {
            return Err(CyreError::IntervalRequiresRepeat { id: self.id.clone() });
        }

        Ok(())
    }

    /// `true` when this config's timing means every call is a registered
    /// no-op: `repeat: 0`, unconditionally — a `delay` alongside it doesn't
    /// carve out an exception, since nothing would ever be scheduled to
    /// consume that delay anyway.
    #[must_use]
    pub fn is_repeat_zero_noop(&self) -> bool {
        matches!(self.repeat, Some(r) if r.is_never())
    }
}
