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

//! Cooperative timer scheduler.
//!
//! A pure data structure: a min-heap of cancellable timer records keyed by
//! due time, with no back-reference to the orchestrator that drives it.
//! Deliberately so — an `Orchestrator` holding both a `TimeKeeper` and a
//! handle back to itself invites the same circular-ownership problem a
//! `Store` avoids by keeping reducers, middleware and subscribers as
//! free-standing trait objects it calls out to rather than structures that
//! call back in. The caller (`crate::orchestrator::Orchestrator::tick`)
//! pops due records and dispatches them directly: pop all records whose due
//! time has arrived, then call the dispatch core to run the channel.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};

use crate::clock::MonoMs;
use crate::types::{Payload, Priority, Repeat};

/// What kind of recurrence a timer represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    /// `delay` only: fires once.
    Delay,
    /// `interval` (+ optional `repeat`): reschedules itself on pop until
    /// its repeat budget is exhausted.
    Interval,
    /// The trailing edge of a debounce window; reschedules itself whenever
    /// a new call arrives before it fires.
    DebounceTail,
}

/// A single pending fire, identified by a monotonically increasing
/// sequence number so two timers due at the same millisecond still order
/// deterministically and can still be told apart after a reschedule.
#[derive(Debug, Clone)]
pub struct TimerRecord {
    pub seq: u64,
    pub channel_id: String,
    pub due_ms: MonoMs,
    pub kind: TimerKind,
    pub payload: Option<Payload>,
    period_ms: MonoMs,
    remaining: Repeat,
    priority: Priority,
}

impl TimerRecord {
    #[must_use]
    pub fn channel_id(&self) -> &str { &self.channel_id }
}

/// Heap entry: reverse-ordered on `due_ms` so [`BinaryHeap`] (a max-heap)
/// pops the earliest deadline first; ties broken by `seq` for determinism.
#[derive(Debug, Clone)]
struct HeapEntry {
    due_ms: MonoMs,
    seq: u64,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.due_ms == other.due_ms && self.seq == other.seq
    }
}
impl Eq for HeapEntry {}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .due_ms
            .cmp(&self.due_ms)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> { Some(self.cmp(other)) }
}

/// The scheduler itself: a min-heap of [`HeapEntry`] plus the authoritative
/// [`TimerRecord`] table, and a per-channel index of the single live
/// debounce-tail or throttle-cooldown timer: a channel has at most one
/// pending debounce timer at a time.
#[derive(Debug, Default)]
pub struct TimeKeeper {
    heap: BinaryHeap<HeapEntry>,
    records: HashMap<u64, TimerRecord>,
    /// channel_id -> seq, for kinds that must stay unique per channel
    /// (debounce tail). Lets a new call cancel-and-replace the old timer.
    singleton_by_channel: HashMap<String, u64>,
    next_seq: u64,
}

impl TimeKeeper {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    fn insert(&mut self, record: TimerRecord) -> u64 {
        let seq = record.seq;
        self.heap.push(HeapEntry {
            due_ms: record.due_ms,
            seq,
        });
        self.records.insert(seq, record);
        seq
    }

    fn take_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    /// Schedule a one-shot `delay` fire: fires once after `delay` ms.
    pub fn schedule_delay(&mut self, channel_id: &str, payload: Option<Payload>, due_ms: MonoMs) -> u64 {
        let seq = self.take_seq();
        self.insert(TimerRecord {
            seq,
            channel_id: channel_id.to_string(),
            due_ms,
            kind: TimerKind::Delay,
            payload,
            period_ms: 0,
            remaining: Repeat::Never,
            priority: Priority::default(),
        })
    }

    /// Schedule a recurring `interval` (+ `repeat`) fire. `priority` governs
    /// whether the breathing regulator's rate multiplier stretches this
    /// timer's cadence in `pop_due`: `Priority::Critical` fires are never
    /// stretched.
    /// `repeat` counts the first fire: `Repeat::Times(1)` behaves like
    /// `Delay`, `Repeat::Never` schedules nothing and returns `None`.
    pub fn schedule_interval(
        &mut self,
        channel_id: &str,
        payload: Option<Payload>,
        first_due_ms: MonoMs,
        period_ms: MonoMs,
        repeat: Repeat,
        priority: Priority,
    ) -> Option<u64> {
        if repeat.is_never() {
            return None;
        }
        let seq = self.take_seq();
        Some(self.insert(TimerRecord {
            seq,
            channel_id: channel_id.to_string(),
            due_ms: first_due_ms,
            kind: TimerKind::Interval,
            payload,
            period_ms,
            remaining: repeat,
            priority,
        }))
    }

    /// (Re)schedule a channel's debounce trailing-edge timer, cancelling any
    /// previous one: each new call resets the debounce timer, so only the
    /// last call in a burst fires.
    pub fn reschedule_debounce_tail(
        &mut self,
        channel_id: &str,
        payload: Option<Payload>,
        due_ms: MonoMs,
    ) -> u64 {
        if let Some(old_seq) = self.singleton_by_channel.remove(channel_id) {
            self.records.remove(&old_seq);
            // The stale heap entry for old_seq is left in place; `pop_due`
            // skips it because it is no longer present in `records`.
        }
        let seq = self.take_seq();
        self.insert(TimerRecord {
            seq,
            channel_id: channel_id.to_string(),
            due_ms,
            kind: TimerKind::DebounceTail,
            payload,
            period_ms: 0,
            remaining: Repeat::Never,
            priority: Priority::default(),
        });
        self.singleton_by_channel.insert(channel_id.to_string(), seq);
        seq
    }

    /// Cancel every pending timer for a channel, used by `forget`/shutdown.
    pub fn cancel_channel(&mut self, channel_id: &str) {
        self.records.retain(|_, r| r.channel_id != channel_id);
        self.singleton_by_channel.remove(channel_id);
        // Heap entries for removed records are pruned lazily in `pop_due`.
    }

    /// Cancel a channel's live debounce-tail timer, if any, without
    /// touching its other timers. Used when `maxWait` fires a call
    /// synchronously and the pending tail becomes moot.
    pub fn cancel_debounce_tail(&mut self, channel_id: &str) {
        if let Some(seq) = self.singleton_by_channel.remove(channel_id) {
            self.records.remove(&seq);
        }
    }

    pub fn cancel(&mut self, seq: u64) {
        if let Some(record) = self.records.remove(&seq) {
            if self.singleton_by_channel.get(&record.channel_id) == Some(&seq) {
                self.singleton_by_channel.remove(&record.channel_id);
            }
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool { self.records.is_empty() }

    #[must_use]
    pub fn pending_count(&self) -> usize { self.records.len() }

    /// Earliest due time across all live timers, if any (used by the
    /// orchestrator to decide how long it can safely sleep before the next
    /// tick).
    #[must_use]
    pub fn next_due(&self) -> Option<MonoMs> {
        self.heap
            .iter()
            .filter(|e| self.records.contains_key(&e.seq))
            .map(|e| e.due_ms)
            .min()
    }

    /// Pop every record due at or before `now`, rescheduling `Interval`
    /// timers whose repeat budget isn't exhausted. `breathing_rate` (≥ 1.0)
    /// is the regulator's current rate multiplier: non-critical periodic
    /// fires have their next period multiplied by it, stretching cadence
    /// while the regulator is in RECOVERY; critical-priority timers are
    /// never stretched. The next due time is computed from the *scheduled*
    /// deadline, not the observed fire time, and advances by exactly one
    /// period per pop — this is the "at-most-one catch-up per tick" the
    /// scheduler owes a host that paused and resumed far in the past.
    /// Returned records are removed from the live set; a rescheduled
    /// interval gets a *new* `seq` so callers never confuse the fired
    /// record with its successor.
    pub fn pop_due(&mut self, now: MonoMs, breathing_rate: f64) -> Vec<TimerRecord> {
        let mut fired = Vec::new();
        let mut caught_up_channels: HashSet<String> = HashSet::new();
        let mut deferred: Vec<TimerRecord> = Vec::new();

        while let Some(top) = self.heap.peek() {
            if top.due_ms > now {
                break;
            }
            let entry = self.heap.pop().expect("peeked Some");
            let Some(record) = self.records.remove(&entry.seq) else {
                // Stale entry from a cancellation/reschedule; skip it.
                continue;
            };
            if self.singleton_by_channel.get(&record.channel_id) == Some(&entry.seq) {
                self.singleton_by_channel.remove(&record.channel_id);
            }

            if record.kind == TimerKind::Interval && !caught_up_channels.insert(record.channel_id.clone()) {
                // This channel already caught up once in this call: hold
                // the rest of its backlog for the next `pop_due` instead of
                // cascading every missed period back-to-back.
                deferred.push(record);
                continue;
            }

            if record.kind == TimerKind::Interval {
                let next_remaining = match record.remaining {
                    Repeat::Never => None,
                    Repeat::Times(1) => None,
                    Repeat::Times(n) => Some(Repeat::Times(n - 1)),
                    Repeat::Forever => Some(Repeat::Forever),
                };
                if let Some(remaining) = next_remaining {
                    let rate = if record.priority == Priority::Critical {
                        1.0
                    } else {
                        breathing_rate.max(1.0)
                    };
                    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                    let stretched_period = ((record.period_ms.max(1) as f64) * rate) as MonoMs;
                    let seq = self.take_seq();
                    self.insert(TimerRecord {
                        seq,
                        channel_id: record.channel_id.clone(),
                        due_ms: record.due_ms + stretched_period.max(1),
                        kind: TimerKind::Interval,
                        payload: record.payload.clone(),
                        period_ms: record.period_ms,
                        remaining,
                        priority: record.priority,
                    });
                }
            }

            fired.push(record);
        }

        for record in deferred {
            self.insert(record);
        }

        fired
    }
}
