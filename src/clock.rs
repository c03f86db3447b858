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

//! Monotonic time source.
//!
//! `now()` is injected everywhere else in this crate through the [`Clock`]
//! trait so that [`crate::timekeeper::TimeKeeper`] and
//! [`crate::breathing::BreathingRegulator`] tests can drive virtual time
//! deterministically instead of sleeping on the wall clock.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use std::time::Instant;

/// Monotonic millisecond timestamp. Never wraps in any process lifetime we
/// care about; plain `u64` keeps timer-heap ordering arithmetic simple.
pub type MonoMs = u64;

/// A source of monotonic time and a drift sample. Implementations must be
/// cheap to call repeatedly (every tick) and must never go backwards.
pub trait Clock: Send + Sync + std::fmt::Debug {
    /// Current time in monotonic milliseconds.
    fn now(&self) -> MonoMs;

    /// Records how far a tick fired after its scheduled deadline, in
    /// milliseconds. The default implementation discards the sample;
    /// implementations that back [`last_drift_ms`](Clock::last_drift_ms)
    /// should store it instead.
    fn observe_drift(&self, scheduled: MonoMs, fired: MonoMs) {
        let _ = (scheduled, fired);
    }

    /// Most recently observed scheduler drift, in milliseconds. Fed into
    /// [`crate::breathing::BreathingRegulator`] as the "host load" input.
    /// Defaults to zero for clocks that never call `observe_drift`.
    fn last_drift_ms(&self) -> MonoMs { 0 }
}

/// Real wall-clock-derived monotonic clock, backed by [`std::time::Instant`].
#[derive(Debug, Clone)]
pub struct SystemClock {
    epoch: Instant,
    drift_ms: Arc<AtomicU64>,
}

impl SystemClock {
    #[must_use]
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
            drift_ms: Arc::new(AtomicU64::new(0)),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self { Self::new() }
}

impl Clock for SystemClock {
    fn now(&self) -> MonoMs {
        self.epoch.elapsed().as_millis() as MonoMs
    }

    fn observe_drift(&self, scheduled: MonoMs, fired: MonoMs) {
        self.drift_ms.store(fired.saturating_sub(scheduled), Ordering::SeqCst);
    }

    fn last_drift_ms(&self) -> MonoMs { self.drift_ms.load(Ordering::SeqCst) }
}

/// A manually-advanced virtual clock for deterministic tests of throttle,
/// debounce, interval/repeat and drift-compensation behaviour.
#[derive(Debug, Clone)]
pub struct TestClock {
    millis: Arc<AtomicU64>,
    drift_ms: Arc<AtomicU64>,
}

impl TestClock {
    #[must_use]
    pub fn new() -> Self {
        Self {
            millis: Arc::new(AtomicU64::new(0)),
            drift_ms: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Move the clock forward by `delta_ms`, returning the new time.
    pub fn advance(&self, delta_ms: MonoMs) -> MonoMs {
        self.millis.fetch_add(delta_ms, Ordering::SeqCst) + delta_ms
    }

    /// Jump directly to an absolute time. Panics if it would move backwards —
    /// a monotonic clock only ever goes forward.
    pub fn set(&self, absolute_ms: MonoMs) {
        let prev = self.millis.swap(absolute_ms, Ordering::SeqCst);
        assert!(absolute_ms >= prev, "TestClock must not move backwards");
    }
}

impl Default for TestClock {
    fn default() -> Self { Self::new() }
}

impl Clock for TestClock {
    fn now(&self) -> MonoMs {
        self.millis.load(Ordering::SeqCst)
    }

    fn observe_drift(&self, scheduled: MonoMs, fired: MonoMs) {
        self.drift_ms.store(fired.saturating_sub(scheduled), Ordering::SeqCst);
    }

    fn last_drift_ms(&self) -> MonoMs { self.drift_ms.load(Ordering::SeqCst) }
}
