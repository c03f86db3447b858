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

//! Component E — the action registry. Owns channel configs and their
//! runtime state exclusively; compiles the ordered protection pipeline
//! once at registration instead of re-checking `Option` fields on every
//! call.

use std::collections::HashMap;

use crate::clock::MonoMs;
use crate::config::ChannelConfig;
use crate::error::{CyreError, CyreResult};
use crate::handler::SharedHandler;
use crate::operators::DebounceState;
use crate::types::Priority;

/// One step of a channel's compiled pipeline, in canonical order. Only
/// the steps whose config key is present are instantiated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineOp {
    Block,
    SystemRecuperation,
    Schema,
    Required,
    Selector,
    Condition,
    DetectChanges,
    Throttle,
    Debounce,
    Transform,
    TimingGate,
}

/// Mutable per-channel state that changes call-to-call (as opposed to
/// [`ChannelConfig`], which is replaced wholesale on re-registration).
#[derive(Default)]
pub struct ChannelRuntime {
    pub last_exec: Option<MonoMs>,
    pub debounce_state: DebounceState,
    pub handlers: Vec<SharedHandler>,
}

impl std::fmt::Debug for ChannelRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelRuntime")
            .field("last_exec", &self.last_exec)
            .field("debounce_state", &self.debounce_state)
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

struct RegisteredChannel {
    config: ChannelConfig,
    pipeline: Vec<PipelineOp>,
    runtime: ChannelRuntime,
}

fn compile_pipeline(config: &ChannelConfig) -> Vec<PipelineOp> {
    let mut ops = Vec::with_capacity(8);
    if config.block {
        ops.push(PipelineOp::Block);
    }
    if config.priority != Priority::Critical {
        ops.push(PipelineOp::SystemRecuperation);
    }
    if config.schema.is_some() {
        ops.push(PipelineOp::Schema);
    }
    if config.required {
        ops.push(PipelineOp::Required);
    }
    if config.selector.is_some() {
        ops.push(PipelineOp::Selector);
    }
    if config.condition.is_some() {
        ops.push(PipelineOp::Condition);
    }
    if config.detect_changes {
        ops.push(PipelineOp::DetectChanges);
    }
    if config.throttle.is_some() {
        ops.push(PipelineOp::Throttle);
    }
    if config.debounce.is_some() {
        ops.push(PipelineOp::Debounce);
    }
    if config.transform.is_some() {
        ops.push(PipelineOp::Transform);
    }
    if config.delay.is_some() || config.interval.is_some() {
        ops.push(PipelineOp::TimingGate);
    }
    ops
}

/// Stores every registered channel by id. A global lock blocks new
/// registrations while letting existing channels keep running.
#[derive(Default)]
pub struct ActionRegistry {
    channels: HashMap<String, RegisteredChannel>,
    locked: bool,
}

impl ActionRegistry {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Validate, compile, and store `config`. Re-registering an existing id
    /// replaces its config and pipeline and resets its debounce state and
    /// last-execution timestamp, but preserves its subscribed handlers —
    /// callers typically `subscribe` once and `register`/re-`register`
    /// independently.
    pub fn register(&mut self, config: ChannelConfig) -> CyreResult<()> {
        if self.locked {
            return Err(CyreError::RegistryLocked);
        }
        config.validate()?;

        let pipeline = compile_pipeline(&config);
        let handlers = self
            .channels
            .remove(&config.id)
            .map(|previous| previous.runtime.handlers)
            .unwrap_or_default();

        self.channels.insert(
            config.id.clone(),
            RegisteredChannel {
                config,
                pipeline,
                runtime: ChannelRuntime {
                    handlers,
                    ..ChannelRuntime::default()
                },
            },
        );
        Ok(())
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool { self.channels.contains_key(id) }

    #[must_use]
    pub fn config(&self, id: &str) -> Option<&ChannelConfig> {
        self.channels.get(id).map(|c| &c.config)
    }

    #[must_use]
    pub fn pipeline(&self, id: &str) -> Option<&[PipelineOp]> {
        self.channels.get(id).map(|c| c.pipeline.as_slice())
    }

    #[must_use]
    pub fn runtime(&self, id: &str) -> Option<&ChannelRuntime> {
        self.channels.get(id).map(|c| &c.runtime)
    }

    pub fn runtime_mut(&mut self, id: &str) -> Option<&mut ChannelRuntime> {
        self.channels.get_mut(id).map(|c| &mut c.runtime)
    }

    /// Replace the handler list for `id` wholesale (spec: "a new
    /// subscription on the same id replaces the previous list").
    pub fn set_handlers(&mut self, id: &str, handlers: Vec<SharedHandler>) -> bool {
        match self.channels.get_mut(id) {
            Some(channel) => {
                channel.runtime.handlers = handlers;
                true
            }
            None => false,
        }
    }

    /// Purge config, pipeline, runtime state, for `id`. Callers are
    /// responsible for also cancelling any outstanding timers and metrics
    /// keyed on `id` (owned by other subsystems).
    pub fn forget(&mut self, id: &str) -> bool { self.channels.remove(id).is_some() }

    pub fn clear(&mut self) { self.channels.clear(); }

    #[must_use]
    pub fn channel_ids(&self) -> Vec<String> { self.channels.keys().cloned().collect() }

    pub fn lock(&mut self) { self.locked = true; }
    pub fn unlock(&mut self) { self.locked = false; }
    #[must_use]
    pub fn is_locked(&self) -> bool { self.locked }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_compiles_only_present_operators() {
        let mut registry = ActionRegistry::new();
        registry.register(ChannelConfig::new("c1").throttle(100)).unwrap();
        let pipeline = registry.pipeline("c1").unwrap();
        assert!(pipeline.contains(&PipelineOp::Throttle));
        assert!(!pipeline.contains(&PipelineOp::Debounce));
        assert!(pipeline.contains(&PipelineOp::SystemRecuperation));
    }

    #[test]
    fn critical_priority_omits_recuperation_gate() {
        let mut registry = ActionRegistry::new();
        registry
            .register(ChannelConfig::new("c1").priority(Priority::Critical))
            .unwrap();
        let pipeline = registry.pipeline("c1").unwrap();
        assert!(!pipeline.contains(&PipelineOp::SystemRecuperation));
    }

    #[test]
    fn reregistering_preserves_handlers_but_resets_runtime() {
        let mut registry = ActionRegistry::new();
        registry.register(ChannelConfig::new("c1")).unwrap();
        registry.runtime_mut("c1").unwrap().last_exec = Some(500);

        registry.register(ChannelConfig::new("c1").throttle(50)).unwrap();
        assert_eq!(registry.runtime("c1").unwrap().last_exec, None);
    }

    #[test]
    fn locked_registry_rejects_new_registrations() {
        let mut registry = ActionRegistry::new();
        registry.lock();
        assert_eq!(
            registry.register(ChannelConfig::new("c1")),
            Err(CyreError::RegistryLocked)
        );
    }

    #[test]
    fn forget_removes_channel_entirely() {
        let mut registry = ActionRegistry::new();
        registry.register(ChannelConfig::new("c1")).unwrap();
        assert!(registry.forget("c1"));
        assert!(!registry.contains("c1"));
        assert!(!registry.forget("c1"), "second forget is a no-op, not an error");
    }

    #[test]
    fn channel_runtime_debug_reports_handler_count_not_the_trait_objects() {
        let mut registry = ActionRegistry::new();
        registry.register(ChannelConfig::new("c1")).unwrap();
        let formatted = format!("{:?}", registry.runtime("c1").unwrap());
        assert!(formatted.contains("handlers: 0"));
    }
}
