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

//! Configuration-time errors. Everything that happens once a channel is
//! registered (declines, operator faults, handler faults) is reported as a
//! value through [`crate::types::CallResult`], never as a [`CyreError`].

use thiserror::Error;

pub type CyreResult<T> = Result<T, CyreError>;

/// Configuration-coherence errors raised by [`crate::config::ChannelConfig::validate`]
/// at registration time.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CyreError {
    #[error("channel id must be a non-empty string")]
    EmptyChannelId,

    #[error("channel {id:?}: `throttle` and `debounce` are mutually exclusive")]
    ThrottleDebounceConflict { id: String },

    #[error("channel {id:?}: `maxWait` requires `debounce` to be set")]
    MaxWaitRequiresDebounce { id: String },

    #[error("channel {id:?}: `maxWait` ({max_wait}ms) must exceed `debounce` ({debounce}ms)")]
    MaxWaitNotGreaterThanDebounce {
        id: String,
        debounce: u64,
        max_wait: u64,
    },

    #[error("channel {id:?}: `interval` requires `repeat` to be set")]
    IntervalRequiresRepeat { id: String },

    #[error("channel {id:?}: `{field}` must be a non-negative integer")]
    NegativeTiming { id: String, field: &'static str },

    #[error("channel {id:?} is not registered")]
    UnknownChannel { id: String },

    #[error("registry is locked: no new channels may be registered")]
    RegistryLocked,
}
