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

//! Cyre is an in-process reactive action dispatcher. Producers register
//! named channels carrying a declarative configuration (protections,
//! timing, validation, transformation, priority); consumers subscribe
//! handlers against those channel names; callers fire payloads through the
//! channels and the dispatcher decides, per call, whether, when, how, and
//! with what payload the handlers execute.
//!
//! ```ignore
//! use cyre::{ChannelConfig, FnHandler, HandlerOutcome, Orchestrator};
//! use std::sync::Arc;
//!
//! # async fn demo() {
//! let cyre = Orchestrator::default();
//! cyre.register(ChannelConfig::new("greet").throttle(100)).await.unwrap();
//! cyre.subscribe("greet", Arc::new(FnHandler::new(|p| async move { HandlerOutcome::Value(p) }))).await;
//! let result = cyre.call("greet", Some(serde_json::json!({"name": "world"}))).await;
//! assert!(result.ok);
//! # }
//! ```
//!
//! Logging is off by default; call [`logging::init`] to enable a `tracing`
//! `fmt` subscriber for local debugging.

#![warn(clippy::all)]
#![warn(rust_2018_idioms)]
#![cfg_attr(not(test), deny(clippy::unwrap_in_result))]

pub mod breathing;
pub mod clock;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod handler;
pub mod logging;
pub mod metrics;
pub mod operators;
pub mod orchestrator;
pub mod payload_state;
pub mod registry;
pub mod timekeeper;
pub mod types;

pub use breathing::{BreathingConfig, BreathingRegulator, BreathingState, Pattern, StressInputs};
pub use clock::{Clock, MonoMs, SystemClock, TestClock};
pub use config::{ChannelConfig, ErrorStrategy, InvocationStrategy};
pub use error::{CyreError, CyreResult};
pub use handler::{BoxedFnHandler, FnHandler, Handler, SharedHandler};
pub use metrics::{ChannelCounters, MetricEvent, MetricKind, MetricsBus, StreamHandle};
pub use orchestrator::{spawn_ticker, Orchestrator, Unsubscribe};
pub use types::{CallMetadata, CallResult, DeclineReason, HandlerOutcome, LinkCommand, Payload, Priority, Repeat};
