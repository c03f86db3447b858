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

//! Process-wide adaptive load regulator.
//!
//! A process-wide, continuously-sampled stress estimator. It never blocks a
//! caller: [`BreathingRegulator::sample`] is a cheap synchronous update
//! driven from [`crate::metrics::MetricsBus`] counters on every tick, and
//! [`BreathingRegulator::snapshot`] is a plain read of the last computed
//! state.

use crate::clock::MonoMs;

/// Stress-score thresholds separating the four named bands (low, medium,
/// high, critical).
#[derive(Debug, Clone, Copy)]
pub struct BreathingThresholds {
    pub low: f64,
    pub medium: f64,
    pub high: f64,
    pub critical: f64,
}

impl Default for BreathingThresholds {
    fn default() -> Self {
        Self {
            low: 0.33,
            medium: 0.5,
            high: 0.75,
            critical: 0.9,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pattern {
    Normal,
    Recovery,
}

/// The four raw inputs blended into the stress score.
#[derive(Debug, Clone, Copy, Default)]
pub struct StressInputs {
    /// Calls/sec over a short window, already normalised to a soft ceiling
    /// (0.0 = idle, 1.0 = at or above the ceiling).
    pub call_rate: f64,
    /// p95 execution latency over a short window, normalised the same way.
    pub latency: f64,
    /// Errors / calls over a short window.
    pub error_rate: f64,
    /// Host load: resident memory growth + scheduler drift, normalised.
    pub host_load: f64,
}

/// Tunable blend + smoothing parameters.
#[derive(Debug, Clone, Copy)]
pub struct BreathingConfig {
    pub thresholds: BreathingThresholds,
    /// Exponential-moving-average smoothing factor in `(0, 1]`; higher
    /// reacts faster, lower is smoother.
    pub smoothing: f64,
    /// Upper bound on the periodic-fire rate multiplier; mirrors the
    /// scheduler's own floor on how slow a tick is allowed to run.
    pub max_rate_multiplier: f64,
    /// How long stress must stay below `low` before recuperation clears.
    /// Recuperation is an absorbing state until this cooldown elapses.
    pub recovery_cooldown_ms: MonoMs,
    pub weight_call_rate: f64,
    pub weight_latency: f64,
    pub weight_error_rate: f64,
    pub weight_host_load: f64,
}

impl Default for BreathingConfig {
    fn default() -> Self {
        Self {
            thresholds: BreathingThresholds::default(),
            smoothing: 0.3,
            max_rate_multiplier: 4.0,
            recovery_cooldown_ms: 2_000,
            weight_call_rate: 0.3,
            weight_latency: 0.3,
            weight_error_rate: 0.25,
            weight_host_load: 0.15,
        }
    }
}

/// Published, queryable regulator state: stress score, the resulting rate
/// multiplier, whether recuperation is active, the named pattern, and a
/// running count of samples taken.
#[derive(Debug, Clone, Copy)]
pub struct BreathingState {
    pub stress: f64,
    pub rate: f64,
    pub is_recuperating: bool,
    pub pattern: Pattern,
    pub breath_count: u64,
}

impl Default for BreathingState {
    fn default() -> Self {
        Self {
            stress: 0.0,
            rate: 1.0,
            is_recuperating: false,
            pattern: Pattern::Normal,
            breath_count: 0,
        }
    }
}

/// Pattern transition, emitted as a metric event by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatternTransition {
    pub from: Pattern,
    pub to: Pattern,
}

pub struct BreathingRegulator {
    config: BreathingConfig,
    state: BreathingState,
    below_low_since: Option<MonoMs>,
}

impl BreathingRegulator {
    #[must_use]
    pub fn new(config: BreathingConfig) -> Self {
        Self {
            config,
            state: BreathingState::default(),
            below_low_since: None,
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> BreathingState { self.state }

    /// Blend the four inputs into a new stress score via EMA, update the
    /// pattern and recuperation flag, and return a transition if the
    /// pattern changed this sample. The response is monotone
    /// non-decreasing in the inputs.
    pub fn sample(&mut self, inputs: StressInputs, now: MonoMs) -> Option<PatternTransition> {
        let raw = (inputs.call_rate * self.config.weight_call_rate
            + inputs.latency * self.config.weight_latency
            + inputs.error_rate * self.config.weight_error_rate
            + inputs.host_load * self.config.weight_host_load)
            .clamp(0.0, 1.0);

        let alpha = self.config.smoothing.clamp(0.0, 1.0);
        self.state.stress = alpha * raw + (1.0 - alpha) * self.state.stress;
        self.state.breath_count += 1;

        let t = &self.config.thresholds;
        self.state.rate = if self.state.stress >= t.high {
            // Linearly scale toward the ceiling between HIGH and CRITICAL.
            let span = (t.critical - t.high).max(f64::EPSILON);
            let over = ((self.state.stress - t.high) / span).clamp(0.0, 1.0);
            1.0 + over * (self.config.max_rate_multiplier - 1.0)
        } else {
            1.0
        };

        let previous_pattern = self.state.pattern;

        if self.state.stress >= t.critical {
            self.state.is_recuperating = true;
            self.below_low_since = None;
        } else if self.state.is_recuperating {
            // Absorbing until stress has been below LOW continuously for the
            // cooldown window.
            if self.state.stress < t.low {
                let since = *self.below_low_since.get_or_insert(now);
                if now.saturating_sub(since) >= self.config.recovery_cooldown_ms {
                    self.state.is_recuperating = false;
                    self.below_low_since = None;
                }
            } else {
                self.below_low_since = None;
            }
        }

        self.state.pattern = if self.state.is_recuperating {
            Pattern::Recovery
        } else {
            Pattern::Normal
        };

        if self.state.pattern != previous_pattern {
            Some(PatternTransition {
                from: previous_pattern,
                to: self.state.pattern,
            })
        } else {
            None
        }
    }

    /// Reset to a fresh idle state (used by `shutdown`/test isolation).
    pub fn reset(&mut self) {
        self.state = BreathingState::default();
        self.below_low_since = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stress_response_is_monotone_in_inputs() {
        let mut reg = BreathingRegulator::new(BreathingConfig::default());
        reg.sample(StressInputs::default(), 0);
        let low_stress = reg.snapshot().stress;
        reg.sample(
            StressInputs {
                call_rate: 1.0,
                latency: 1.0,
                error_rate: 1.0,
                host_load: 1.0,
            },
            10,
        );
        assert!(reg.snapshot().stress > low_stress);
    }

    #[test]
    fn critical_stress_flips_recuperation_and_blocks_until_cooldown_elapses() {
        let mut reg = BreathingRegulator::new(BreathingConfig::default());
        let hot = StressInputs {
            call_rate: 1.0,
            latency: 1.0,
            error_rate: 1.0,
            host_load: 1.0,
        };
        for t in 0..20 {
            reg.sample(hot, t);
        }
        assert!(reg.snapshot().is_recuperating);
        assert_eq!(reg.snapshot().pattern, Pattern::Recovery);

        // Keep sampling idle until the EMA actually decays below LOW; at
        // `smoothing = 0.3` a single sample only pulls stress from ~0.999
        // to ~0.7, well above the 0.33 threshold, so this takes a handful
        // of samples, not one.
        let idle = StressInputs::default();
        let mut t = 20;
        while reg.snapshot().stress >= BreathingThresholds::default().low {
            t += 10;
            assert!(reg.sample(idle, t).is_none(), "still recuperating while stress stays at/above LOW");
        }
        let below_low_at = t;
        assert!(reg.snapshot().is_recuperating, "dropping below LOW starts the cooldown, it doesn't clear instantly");

        // Cooldown window hasn't elapsed yet: still recuperating.
        let transition = reg.sample(idle, below_low_at + 1);
        assert!(transition.is_none());
        assert!(reg.snapshot().is_recuperating);

        // Cooldown window elapses while staying below LOW.
        let transition = reg.sample(idle, below_low_at + 2_000);
        assert!(!reg.snapshot().is_recuperating);
        assert_eq!(
            transition,
            Some(PatternTransition {
                from: Pattern::Recovery,
                to: Pattern::Normal
            })
        );
    }

    #[test]
    fn rate_multiplier_is_bounded() {
        let mut reg = BreathingRegulator::new(BreathingConfig::default());
        let hot = StressInputs {
            call_rate: 1.0,
            latency: 1.0,
            error_rate: 1.0,
            host_load: 1.0,
        };
        for t in 0..50 {
            reg.sample(hot, t);
        }
        assert!(reg.snapshot().rate <= BreathingConfig::default().max_rate_multiplier);
    }
}
