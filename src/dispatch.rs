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

//! Component G — handler invocation strategies.
//!
//! Pure with respect to registry/scheduler/breathing state: given a
//! resolved handler list, a payload, and a strategy, runs the handlers and
//! returns one outcome per handler. The caller (`crate::orchestrator`)
//! owns everything stateful — resolving the handler list, reconciling the
//! per-handler results against the channel's error strategy, and acting on
//! a returned chain link.

use futures::future::{join_all, select_all};
use futures::FutureExt;

use crate::config::{ErrorStrategy, InvocationStrategy};
use crate::handler::SharedHandler;
use crate::types::{HandlerOutcome, Payload};

/// Runs one handler, converting a panic inside it into a handler fault
/// instead of unwinding through the dispatcher.
async fn call_one(handler: &SharedHandler, payload: Payload) -> Result<HandlerOutcome, String> {
    std::panic::AssertUnwindSafe(handler.handle(payload))
        .catch_unwind()
        .await
        .map_err(|_| "handler panicked".to_string())
}

/// Runs every handler according to `strategy`, returning one outcome per
/// handler in the order they were passed (for `Waterfall`, in the order
/// they actually ran).
pub async fn run_handlers(
    handlers: &[SharedHandler],
    payload: Payload,
    strategy: InvocationStrategy,
) -> Vec<Result<HandlerOutcome, String>> {
    if handlers.is_empty() {
        return Vec::new();
    }

    match strategy {
        InvocationStrategy::Parallel => {
            join_all(handlers.iter().map(|h| call_one(h, payload.clone()))).await
        }

        InvocationStrategy::Sequential => {
            let mut results = Vec::with_capacity(handlers.len());
            for handler in handlers {
                results.push(call_one(handler, payload.clone()).await);
            }
            results
        }

        InvocationStrategy::Waterfall => {
            let mut results = Vec::with_capacity(handlers.len());
            let mut current = payload;
            for handler in handlers {
                let outcome = call_one(handler, current.clone()).await;
                if let Ok(HandlerOutcome::Value(ref next)) = outcome {
                    current = next.clone();
                }
                results.push(outcome);
            }
            results
        }

        InvocationStrategy::Race => {
            let futures: Vec<_> = handlers.iter().map(|h| Box::pin(call_one(h, payload.clone()))).collect();
            let (first, _index, _rest) = select_all(futures).await;
            vec![first]
        }
    }
}

/// Reconciles per-handler results into a single outcome according to the
/// channel's error strategy: `FailFast` surfaces the first error (if any)
/// ahead of any success, `Continue` only fails when every handler failed.
#[must_use]
pub fn reconcile(
    results: &[Result<HandlerOutcome, String>],
    error_strategy: ErrorStrategy,
) -> Result<HandlerOutcome, String> {
    if results.is_empty() {
        return Ok(HandlerOutcome::None);
    }

    match error_strategy {
        ErrorStrategy::FailFast => {
            if let Some(Err(e)) = results.iter().find(|r| r.is_err()) {
                return Err(e.clone());
            }
            results[0].clone()
        }
        ErrorStrategy::Continue => {
            if let Some(ok) = results.iter().find(|r| r.is_ok()) {
                return ok.clone();
            }
            let joined = results
                .iter()
                .filter_map(|r| r.as_ref().err())
                .cloned()
                .collect::<Vec<_>>()
                .join("; ");
            Err(joined)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::FnHandler;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn value_handler(n: i64) -> SharedHandler {
        Arc::new(FnHandler::new(move |_p: Payload| async move { HandlerOutcome::Value(json!(n)) }))
    }

    #[tokio::test]
    async fn parallel_runs_all_handlers_against_same_payload() {
        let handlers = vec![value_handler(1), value_handler(2)];
        let results = run_handlers(&handlers, json!("p"), InvocationStrategy::Parallel).await;
        assert_eq!(results.len(), 2);
    }

    #[tokio::test]
    async fn waterfall_threads_payload_through_handlers() {
        let handlers: Vec<SharedHandler> = vec![
            Arc::new(FnHandler::new(|p: Payload| async move {
                let n = p.as_i64().unwrap_or(0);
                HandlerOutcome::Value(json!(n + 1))
            })),
            Arc::new(FnHandler::new(|p: Payload| async move {
                let n = p.as_i64().unwrap_or(0);
                HandlerOutcome::Value(json!(n * 10))
            })),
        ];
        let results = run_handlers(&handlers, json!(1), InvocationStrategy::Waterfall).await;
        match &results[1] {
            Ok(HandlerOutcome::Value(v)) => assert_eq!(v, &json!(20)),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn sequential_runs_in_order() {
        let order = Arc::new(AtomicUsize::new(0));
        let mut handlers: Vec<SharedHandler> = Vec::new();
        for expected in 0..3 {
            let order = order.clone();
            handlers.push(Arc::new(FnHandler::new(move |_p: Payload| {
                let order = order.clone();
                async move {
                    let seen = order.fetch_add(1, Ordering::SeqCst);
                    assert_eq!(seen, expected);
                    HandlerOutcome::None
                }
            })));
        }
        run_handlers(&handlers, json!(null), InvocationStrategy::Sequential).await;
        assert_eq!(order.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn panicking_handler_becomes_a_fault_not_an_unwind() {
        let handlers: Vec<SharedHandler> = vec![Arc::new(FnHandler::new(|_p: Payload| async move {
            panic!("boom");
            #[allow(unreachable_code)]
            HandlerOutcome::None
        }))];
        let results = run_handlers(&handlers, json!(null), InvocationStrategy::Sequential).await;
        assert!(results[0].is_err());
    }

    #[test]
    fn fail_fast_surfaces_first_error_over_any_success() {
        let results = vec![Ok(HandlerOutcome::None), Err("boom".to_string())];
        assert!(reconcile(&results, ErrorStrategy::FailFast).is_err());
    }

    #[test]
    fn continue_only_fails_when_everything_failed() {
        let results = vec![Err("a".to_string()), Ok(HandlerOutcome::None)];
        assert!(reconcile(&results, ErrorStrategy::Continue).is_ok());

        let all_failed = vec![Err("a".to_string()), Err("b".to_string())];
        assert!(reconcile(&all_failed, ErrorStrategy::Continue).is_err());
    }
}
