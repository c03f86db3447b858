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

//! Metrics bus.
//!
//! An append-only ring buffer of [`MetricEvent`]s plus derived per-channel /
//! global counters. [`crate::breathing::BreathingRegulator`] is the one
//! built-in consumer and samples the counters, not the raw stream. External
//! consumers can still register a predicate + callback the way an
//! `AsyncSubscriber` lets a store notify observers — see
//! [`MetricsBus::subscribe`].

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use crate::clock::MonoMs;
use crate::types::DeclineReason;

/// A single recorded metric event.
#[derive(Debug, Clone)]
pub struct MetricEvent {
    pub ts: MonoMs,
    pub channel_id: String,
    pub kind: MetricKind,
    pub duration_ms: Option<u64>,
    pub reason: Option<DeclineReason>,
    pub meta: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Call,
    Execution,
    Skip,
    Throttle,
    Debounce,
    Error,
    Intralink,
}

/// Per-channel counters: calls, executions, skips, and their breakdown.
#[derive(Debug, Clone, Default)]
pub struct ChannelCounters {
    pub calls: u64,
    pub executions: u64,
    pub skips: u64,
    pub skips_by_reason: HashMap<DeclineReason, u64>,
    pub errors: u64,
    pub debounced: u64,
    pub throttled: u64,
}

type StreamPredicate = Arc<dyn Fn(&MetricEvent) -> bool + Send + Sync>;
type StreamCallback = Arc<dyn Fn(&MetricEvent) + Send + Sync>;

struct Stream {
    predicate: StreamPredicate,
    callback: StreamCallback,
}

/// A bounded ring buffer of events plus derived counters.
pub struct MetricsBus {
    capacity: usize,
    events: VecDeque<MetricEvent>,
    per_channel: HashMap<String, ChannelCounters>,
    global: ChannelCounters,
    streams: HashMap<u64, Stream>,
    next_stream_id: u64,
    closed: bool,
}

/// Handle returned by [`MetricsBus::subscribe`], used to unsubscribe later.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamHandle(u64);

impl MetricsBus {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            events: VecDeque::with_capacity(capacity.min(1024)),
            per_channel: HashMap::new(),
            global: ChannelCounters::default(),
            streams: HashMap::new(),
            next_stream_id: 0,
            closed: false,
        }
    }

    pub fn record(&mut self, event: MetricEvent) {
        if self.closed {
            return;
        }

        let counters = self.per_channel.entry(event.channel_id.clone()).or_default();
        Self::apply(counters, &event);
        Self::apply(&mut self.global, &event);

        for stream in self.streams.values() {
            if (stream.predicate)(&event) {
                (stream.callback)(&event);
            }
        }

        if self.events.len() >= self.capacity {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    fn apply(counters: &mut ChannelCounters, event: &MetricEvent) {
        match event.kind {
            MetricKind::Call => counters.calls += 1,
            MetricKind::Execution => counters.executions += 1,
            MetricKind::Skip => {
                counters.skips += 1;
                if let Some(reason) = event.reason {
                    *counters.skips_by_reason.entry(reason).or_insert(0) += 1;
                    match reason {
                        DeclineReason::Throttled => counters.throttled += 1,
                        DeclineReason::DebouncedDeferred => counters.debounced += 1,
                        _ => {}
                    }
                }
            }
            MetricKind::Error => counters.errors += 1,
            MetricKind::Throttle => counters.throttled += 1,
            MetricKind::Debounce => counters.debounced += 1,
            MetricKind::Intralink => {}
        }
    }

    #[must_use]
    pub fn channel_counters(&self, channel_id: &str) -> ChannelCounters {
        self.per_channel.get(channel_id).cloned().unwrap_or_default()
    }

    #[must_use]
    pub fn global_counters(&self) -> ChannelCounters { self.global.clone() }

    #[must_use]
    pub fn recent_events(&self) -> impl Iterator<Item = &MetricEvent> { self.events.iter() }

    /// p95 execution latency, in milliseconds, over the events currently
    /// retained in the ring buffer. `None` until at least one execution has
    /// been recorded.
    #[must_use]
    pub fn p95_execution_latency_ms(&self) -> Option<u64> {
        let mut durations: Vec<u64> = self
            .events
            .iter()
            .filter(|e| e.kind == MetricKind::Execution)
            .filter_map(|e| e.duration_ms)
            .collect();
        if durations.is_empty() {
            return None;
        }
        durations.sort_unstable();
        let idx = (((durations.len() - 1) as f64) * 0.95).round() as usize;
        Some(durations[idx.min(durations.len() - 1)])
    }

    /// Register a live filter → callback stream.
    pub fn subscribe(
        &mut self,
        predicate: impl Fn(&MetricEvent) -> bool + Send + Sync + 'static,
        callback: impl Fn(&MetricEvent) + Send + Sync + 'static,
    ) -> StreamHandle {
        let id = self.next_stream_id;
        self.next_stream_id += 1;
        self.streams.insert(
            id,
            Stream {
                predicate: Arc::new(predicate),
                callback: Arc::new(callback),
            },
        );
        StreamHandle(id)
    }

    pub fn unsubscribe(&mut self, handle: StreamHandle) {
        self.streams.remove(&handle.0);
    }

    pub fn forget_channel(&mut self, channel_id: &str) {
        self.per_channel.remove(channel_id);
    }

    /// Stop accepting new events. Used during shutdown once the bus has
    /// been drained to its subscribers.
    pub fn close(&mut self) { self.closed = true; }

    pub fn clear(&mut self) {
        self.events.clear();
        self.per_channel.clear();
        self.global = ChannelCounters::default();
        self.streams.clear();
        self.closed = false;
    }
}

impl std::fmt::Debug for MetricsBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsBus")
            .field("capacity", &self.capacity)
            .field("len", &self.events.len())
            .field("streams", &self.streams.len())
            .field("closed", &self.closed)
            .finish()
    }
}
