//! Integration tests against the six literal scenarios and the universal
//! invariants: throttle, debounce, debounce+maxWait, interval+repeat,
//! change detection, and chain links. All timing is driven by a
//! [`TestClock`] advanced by hand — nothing here sleeps on the wall clock.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use cyre::{BoxedFnHandler, ChannelConfig, FnHandler, HandlerOutcome, Orchestrator, Payload, Repeat, SharedHandler, TestClock};
use pretty_assertions::assert_eq;
use serde_json::json;
use test_case::test_case;

/// Pushes `p` onto `calls` and echoes it back. A standalone fn (rather than
/// an inline closure) so its boxed-future return type is an explicit
/// coercion site instead of something the closure has to infer.
fn record_and_echo(calls: Arc<Mutex<Vec<Payload>>>, p: Payload) -> Pin<Box<dyn Future<Output = HandlerOutcome> + Send>> {
    Box::pin(async move {
        calls.lock().unwrap().push(p.clone());
        HandlerOutcome::Value(p)
    })
}

/// A handler that counts invocations and records every payload it saw, for
/// asserting both "how many times" and "with what".
fn counting_handler(calls: Arc<Mutex<Vec<Payload>>>) -> SharedHandler {
    Arc::new(BoxedFnHandler::new(move |p: Payload| record_and_echo(calls.clone(), p)))
}

#[tokio::test]
async fn throttle_admits_first_call_then_one_after_the_window() {
    let clock = Arc::new(TestClock::new());
    let cyre = Orchestrator::new(clock.clone());
    cyre.register(ChannelConfig::new("T").throttle(100)).await.unwrap();
    let calls = Arc::new(Mutex::new(Vec::new()));
    cyre.subscribe("T", counting_handler(calls.clone())).await;

    for (t, label) in [(0u64, "a"), (10, "b"), (20, "c"), (30, "d"), (200, "e")] {
        clock.set(t);
        let result = cyre.call("T", Some(json!(label))).await;
        match t {
            0 | 200 => assert!(result.ok, "expected execution at t={t}"),
            _ => assert_eq!(result.message, "throttled", "expected decline at t={t}"),
        }
    }

    let seen = calls.lock().unwrap();
    assert_eq!(*seen, vec![json!("a"), json!("e")]);
}

#[test_case(50, false; "well within the window")]
#[test_case(99, false; "just under the window")]
#[test_case(100, true; "exactly at the window")]
#[test_case(250, true; "well past the window")]
#[tokio::test]
async fn throttle_window_boundary(second_call_at: u64, expect_admitted: bool) {
    let clock = Arc::new(TestClock::new());
    let cyre = Orchestrator::new(clock.clone());
    cyre.register(ChannelConfig::new("T").throttle(100)).await.unwrap();

    clock.set(0);
    assert!(cyre.call("T", Some(json!(0))).await.ok);

    clock.set(second_call_at);
    let result = cyre.call("T", Some(json!(1))).await;
    assert_eq!(result.ok, expect_admitted);
}

#[tokio::test]
async fn debounce_fires_once_after_the_burst_with_the_latest_payload() {
    let clock = Arc::new(TestClock::new());
    let cyre = Orchestrator::new(clock.clone());
    cyre.register(ChannelConfig::new("D").debounce(300)).await.unwrap();
    let calls = Arc::new(Mutex::new(Vec::new()));
    cyre.subscribe("D", counting_handler(calls.clone())).await;

    for (t, label) in [(0u64, "A"), (50, "B"), (100, "C"), (150, "D")] {
        clock.set(t);
        let result = cyre.call("D", Some(json!(label))).await;
        assert_eq!(result.message, "debounced-deferred");
    }

    clock.set(449);
    assert!(cyre.tick().await.is_empty(), "tail must not fire before its due time");

    clock.set(450);
    let fired = cyre.tick().await;
    assert_eq!(fired.len(), 1);
    assert!(fired[0].ok);

    let seen = calls.lock().unwrap();
    assert_eq!(*seen, vec![json!("D")], "only the last payload in the burst executes");
}

#[tokio::test]
async fn debounce_with_max_wait_forces_an_execution_mid_burst() {
    let clock = Arc::new(TestClock::new());
    let cyre = Orchestrator::new(clock.clone());
    cyre.register(ChannelConfig::new("DM").debounce(300).max_wait(800)).await.unwrap();
    let calls = Arc::new(Mutex::new(Vec::new()));
    cyre.subscribe("DM", counting_handler(calls.clone())).await;

    // A continuous burst every 100ms from t=0 to t=1000.
    for t in (0u64..=1000).step_by(100) {
        clock.set(t);
        let result = cyre.call("DM", Some(json!(t))).await;
        if t == 800 {
            // maxWait exceeded: this call fires synchronously with its own payload.
            assert!(result.ok, "maxWait should force an execution at t=800");
        } else {
            assert_eq!(result.message, "debounced-deferred", "t={t} should defer");
        }
    }

    // Nothing pending until the post-burst tail (armed at t=900, last
    // refreshed at t=1000) comes due at 1000+300=1300.
    clock.set(1299);
    assert!(cyre.tick().await.is_empty());

    clock.set(1300);
    let fired = cyre.tick().await;
    assert_eq!(fired.len(), 1);
    assert!(fired[0].ok);

    let seen = calls.lock().unwrap();
    assert_eq!(*seen, vec![json!(800), json!(1000)]);
}

#[tokio::test]
async fn debounce_tail_declined_by_a_failing_operator_still_resets_to_idle() {
    // `transform` runs after `Debounce` in canonical order, so it's only
    // ever evaluated at tail-fire time for a debounced channel, never on
    // the deferring call itself — the cleanest way to force a decline
    // inside `resume_after_debounce_tail` specifically.
    let clock = Arc::new(TestClock::new());
    let cyre = Orchestrator::new(clock.clone());
    cyre.register(
        ChannelConfig::new("DE")
            .debounce(300)
            .max_wait(800)
            .transform(|p: &Payload| if p == &json!("bad") { Err("boom".to_string()) } else { Ok(p.clone()) }),
    )
    .await
    .unwrap();
    let calls = Arc::new(Mutex::new(Vec::new()));
    cyre.subscribe("DE", counting_handler(calls.clone())).await;

    // This burst's tail fire fails the transform and never reaches
    // dispatch — the only place debounce state used to get reset.
    clock.set(1000);
    let result = cyre.call("DE", Some(json!("bad"))).await;
    assert_eq!(result.message, "debounced-deferred");
    clock.set(1300);
    let fired = cyre.tick().await;
    assert_eq!(fired.len(), 1);
    assert!(!fired[0].ok, "a failing transform should decline the tail");

    // A genuinely new burst starting at t=1700 must get its own fresh
    // maxWait window rather than inheriting the failed burst's
    // first_call_ms=1000: a stale `Armed{1000}` would force an execution
    // the moment a call lands 800ms after *that*, i.e. by t=1800.
    clock.set(1700);
    let result = cyre.call("DE", Some(json!("ok"))).await;
    assert_eq!(result.message, "debounced-deferred");

    clock.set(1810);
    let result = cyre.call("DE", Some(json!("ok2"))).await;
    assert_eq!(
        result.message, "debounced-deferred",
        "only 110ms into the fresh burst; stale debounce state must not force an early fire by maxWait"
    );

    clock.set(2109);
    assert!(cyre.tick().await.is_empty(), "tail must not fire before its due time");

    clock.set(2110);
    let fired = cyre.tick().await;
    assert_eq!(fired.len(), 1);
    assert!(fired[0].ok);

    let seen = calls.lock().unwrap();
    assert_eq!(*seen, vec![json!("ok2")]);
}

#[tokio::test]
async fn interval_with_finite_repeat_fires_exactly_n_times() {
    let clock = Arc::new(TestClock::new());
    let cyre = Orchestrator::new(clock.clone());
    cyre.register(
        ChannelConfig::new("I")
            .delay(1000)
            .interval(1000)
            .repeat(Repeat::Times(3)),
    )
    .await
    .unwrap();
    let calls = Arc::new(Mutex::new(Vec::new()));
    cyre.subscribe("I", counting_handler(calls.clone())).await;

    clock.set(0);
    let scheduled = cyre.call("I", Some(json!("p"))).await;
    assert_eq!(scheduled.message, "scheduled");

    for t in [1000, 2000, 3000] {
        clock.set(t);
        let fired = cyre.tick().await;
        assert_eq!(fired.len(), 1, "expected one execution at t={t}");
    }

    // No further executions after the repeat budget is exhausted.
    clock.set(4000);
    assert!(cyre.tick().await.is_empty());

    assert_eq!(calls.lock().unwrap().len(), 3);
}

#[tokio::test]
async fn change_detection_skips_a_repeated_payload() {
    let clock = Arc::new(TestClock::new());
    let cyre = Orchestrator::new(clock.clone());
    cyre.register(ChannelConfig::new("C").detect_changes(true)).await.unwrap();
    let calls = Arc::new(Mutex::new(Vec::new()));
    cyre.subscribe("C", counting_handler(calls.clone())).await;

    let first = cyre.call("C", Some(json!({"v": 1}))).await;
    assert!(first.ok);

    let second = cyre.call("C", Some(json!({"v": 1}))).await;
    assert_eq!(second.message, "unchanged");

    let third = cyre.call("C", Some(json!({"v": 2}))).await;
    assert!(third.ok);

    let seen = calls.lock().unwrap();
    assert_eq!(*seen, vec![json!({"v": 1}), json!({"v": 2})]);
}

#[tokio::test]
async fn chain_link_propagates_through_three_channels_in_order() {
    let clock = Arc::new(TestClock::new());
    let cyre = Orchestrator::new(clock.clone());

    cyre.register(ChannelConfig::new("A")).await.unwrap();
    cyre.register(ChannelConfig::new("B")).await.unwrap();
    cyre.register(ChannelConfig::new("C")).await.unwrap();

    let order = Arc::new(Mutex::new(Vec::new()));

    let order_a = order.clone();
    cyre.subscribe(
        "A",
        Arc::new(FnHandler::new(move |p: Payload| {
            let order_a = order_a.clone();
            async move {
                order_a.lock().unwrap().push(("A", p));
                HandlerOutcome::Link(cyre::LinkCommand {
                    id: "B".to_string(),
                    payload: Some(json!("p1")),
                })
            }
        })),
    )
    .await;

    let order_b = order.clone();
    cyre.subscribe(
        "B",
        Arc::new(FnHandler::new(move |p: Payload| {
            let order_b = order_b.clone();
            async move {
                order_b.lock().unwrap().push(("B", p));
                HandlerOutcome::Link(cyre::LinkCommand {
                    id: "C".to_string(),
                    payload: Some(json!("p2")),
                })
            }
        })),
    )
    .await;

    let order_c = order.clone();
    cyre.subscribe(
        "C",
        Arc::new(FnHandler::new(move |p: Payload| {
            let order_c = order_c.clone();
            async move {
                order_c.lock().unwrap().push(("C", p));
                HandlerOutcome::Value(p)
            }
        })),
    )
    .await;

    let result = cyre.call("A", Some(json!("p0"))).await;
    assert!(result.ok);

    let seen = order.lock().unwrap();
    assert_eq!(
        *seen,
        vec![("A", json!("p0")), ("B", json!("p1")), ("C", json!("p2"))]
    );

    // C's result is reachable through the nested chain metadata.
    let chain_to_b = result.metadata.as_ref().and_then(|m| m.chain_result.as_ref()).expect("A linked to B");
    let chain_to_c = chain_to_b.metadata.as_ref().and_then(|m| m.chain_result.as_ref()).expect("B linked to C");
    assert_eq!(chain_to_c.payload, Some(json!("p2")));

    // A and B both ran their handler before enqueuing the next hop, so both
    // are executions, not just intralinks; only C (which doesn't link
    // further) is the one hop lacking a follow-up intralink event.
    assert_eq!(cyre.get_metrics(Some("A")).await.executions, 1);
    assert_eq!(cyre.get_metrics(Some("B")).await.executions, 1);
    assert_eq!(cyre.get_metrics(Some("C")).await.executions, 1);
}

#[tokio::test]
async fn repeat_zero_without_timing_is_still_a_permanent_noop() {
    let clock = Arc::new(TestClock::new());
    let cyre = Orchestrator::new(clock.clone());
    cyre.register(ChannelConfig::new("Z").repeat(Repeat::Never)).await.unwrap();
    let calls = Arc::new(Mutex::new(Vec::new()));
    cyre.subscribe("Z", counting_handler(calls.clone())).await;

    let result = cyre.call("Z", Some(json!("p"))).await;
    assert_eq!(result.message, "did not execute");
    assert!(result.ok, "a repeat:0 no-op is success-shaped, not a decline");
    assert!(calls.lock().unwrap().is_empty(), "the handler must never run");
}

#[tokio::test]
async fn forget_makes_subsequent_calls_decline_channel_missing() {
    let clock = Arc::new(TestClock::new());
    let cyre = Orchestrator::new(clock.clone());
    cyre.register(ChannelConfig::new("X").delay(1000)).await.unwrap();

    clock.set(0);
    assert_eq!(cyre.call("X", Some(json!(1))).await.message, "scheduled");
    assert!(cyre.forget("X").await);

    let result = cyre.call("X", Some(json!(2))).await;
    assert_eq!(result.message, "channel-missing");

    // The pending delay timer was cancelled by forget; ticking past its
    // original due time fires nothing.
    clock.set(1000);
    assert!(cyre.tick().await.is_empty());
}

#[tokio::test]
async fn fresh_orchestrator_starts_out_of_recuperation() {
    let clock = Arc::new(TestClock::new());
    let cyre = Orchestrator::new(clock.clone());
    cyre.register(ChannelConfig::new("M")).await.unwrap();

    clock.set(0);
    let result = cyre.call("M", Some(json!(1))).await;
    assert!(result.ok);
    assert!(!cyre.get_breathing_state().await.is_recuperating);
}

/// Drives the breathing regulator into recuperation through real `call`
/// and `tick` traffic rather than poking `BreathingRegulator` directly:
/// a channel whose handler is slow and mostly fails (real p95 latency and
/// error rate), plus a backlogged timer whose late tick registers real
/// scheduler drift (host load). Once all four stress inputs are live, a
/// non-critical call should decline with "system-busy".
#[tokio::test]
async fn sustained_load_drives_recuperation_through_real_calls_and_ticks() {
    let clock = Arc::new(TestClock::new());
    let cyre = Orchestrator::new(clock.clone());

    // A one-shot probe whose handler advances the clock well past the
    // latency soft ceiling, so p95 execution latency reads as saturated.
    cyre.register(ChannelConfig::new("probe")).await.unwrap();
    let probe_clock = clock.clone();
    cyre.subscribe(
        "probe",
        Arc::new(FnHandler::new(move |p: Payload| {
            let probe_clock = probe_clock.clone();
            async move {
                probe_clock.advance(400);
                HandlerOutcome::Value(p)
            }
        })),
    )
    .await;
    assert!(cyre.call("probe", Some(json!(1))).await.ok);

    // A delayed channel whose tick fires long after its due time, so
    // scheduler drift (host load) is observed too.
    cyre.register(ChannelConfig::new("drifter").delay(10)).await.unwrap();
    cyre.subscribe("drifter", Arc::new(FnHandler::new(|p: Payload| async move { HandlerOutcome::Value(p) }))).await;
    assert_eq!(cyre.call("drifter", Some(json!(1))).await.message, "scheduled");
    clock.advance(600);
    cyre.tick().await;

    // A hot channel that fails almost every call, saturating error rate
    // and (via repeated calls) call rate.
    cyre.register(ChannelConfig::new("hot")).await.unwrap();
    cyre.subscribe(
        "hot",
        Arc::new(FnHandler::new(|_p: Payload| async move {
            panic!("handler fails under load");
            #[allow(unreachable_code)]
            HandlerOutcome::None
        })),
    )
    .await;

    for i in 0..200u64 {
        cyre.call("hot", Some(json!(i))).await;
    }

    assert!(
        cyre.get_breathing_state().await.is_recuperating,
        "sustained latency, errors, call volume and drift should push stress past CRITICAL"
    );

    let declined = cyre.call("hot", Some(json!("after"))).await;
    assert_eq!(declined.message, "system-busy");
}
