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

//! Structured logging, off by default. This crate emits `tracing` events
//! at the usual seams (registration, declines, timer fires, pattern
//! transitions) but never installs a subscriber itself — host applications
//! wire up their own, or call [`init`] for a quick `fmt` subscriber during
//! local debugging or tests.

use tracing_subscriber::EnvFilter;

/// Installs a process-wide `tracing-subscriber` `fmt` layer at `level`.
/// Safe to call more than once; later calls are no-ops if a global
/// subscriber is already set.
pub fn init(level: &str) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
