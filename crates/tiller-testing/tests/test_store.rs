//! Integration tests for the exhaustive test store.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tiller_core::{Effect, TestScheduler, TokioScheduler};
use tiller_testing::{TestStore, TestStoreError, Tolerance};

// ============================================================================
// Fixtures
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
struct Counter {
    number: i32,
    name: String,
}

impl Default for Counter {
    fn default() -> Self {
        Self {
            number: 0,
            name: "initial name".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Action {
    Add,
    Chain,
    DelayedAdd,
    Cancel,
}

/// Cancellation key, unique per store so parallel tests never share one.
#[derive(Debug, Hash, PartialEq, Eq)]
struct DelayedAddId(u64);

struct Env<S> {
    scheduler: S,
    id: u64,
}

impl<S> Env<S> {
    fn new(scheduler: S) -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(0);
        Self {
            scheduler,
            id: NEXT.fetch_add(1, Ordering::Relaxed),
        }
    }
}

fn reducer<S: tiller_core::Scheduler + Clone>(
    state: &mut Counter,
    action: Action,
    env: &Env<S>,
) -> Effect<Action> {
    match action {
        Action::Add => {
            state.number += 1;
            Effect::none()
        }
        Action::Chain => {
            state.name = "custom name".into();
            Effect::send(Action::Add)
        }
        Action::DelayedAdd => Effect::send(Action::Add)
            .deferred(Duration::from_secs(5), &env.scheduler)
            .cancellable(DelayedAddId(env.id)),
        Action::Cancel => Effect::cancel(DelayedAddId(env.id)),
    }
}

fn test_store() -> (TestStore<Counter, Action, Env<TestScheduler>>, TestScheduler) {
    let scheduler = TestScheduler::new();
    let store = TestStore::new(
        Counter::default(),
        reducer::<TestScheduler>,
        Env::new(scheduler.clone()),
    )
    .with_scheduler(scheduler.clone());
    (store, scheduler)
}

// ============================================================================
// Happy paths
// ============================================================================

#[test]
fn send_and_receive_account_for_every_change() {
    let (mut store, _) = test_store();

    store.send(Action::Add, |s| s.number = 1);
    store.send(Action::Chain, |s| s.name = "custom name".into());
    store.receive(Action::Add, |s| s.number = 2);

    assert_eq!(store.state().number, 2);
    store.finish();
}

#[test]
fn deferred_effect_is_received_after_the_clock_moves() {
    let (mut store, scheduler) = test_store();

    store.send(Action::DelayedAdd, |_| {});
    assert_eq!(store.in_flight_effects(), 1);

    scheduler.advance_by(Duration::from_secs(4));
    assert_eq!(store.received_actions(), 0);

    scheduler.advance_by(Duration::from_secs(1));
    store.receive(Action::Add, |s| s.number += 1);
    store.finish();
}

#[test]
fn cancellation_from_the_test_store() {
    let (mut store, scheduler) = test_store();

    store.send(Action::Add, |s| s.number += 1);
    store.send(Action::DelayedAdd, |_| {});
    store.send(Action::Cancel, |_| {});
    store.send(Action::Cancel, |_| {});

    scheduler.advance_by(Duration::from_secs(5));
    assert_eq!(store.state().number, 1);
    assert_eq!(store.received_actions(), 0);
    store.finish();
}

#[test]
fn cancelled_effect_is_no_longer_in_flight() {
    let (mut store, scheduler) = test_store();

    store.send(Action::DelayedAdd, |_| {});
    assert_eq!(store.in_flight_effects(), 1);

    store.send(Action::Cancel, |_| {});
    assert_eq!(store.in_flight_effects(), 0);
    assert_eq!(scheduler.pending_timers(), 0);
    assert!(store.try_finish().is_ok());
}

#[tokio::test(start_paused = true)]
async fn tokio_scheduler_delivers_into_the_received_queue() {
    let scheduler = TokioScheduler::current().unwrap();
    let mut store = TestStore::new(
        Counter::default(),
        reducer::<TokioScheduler>,
        Env::new(scheduler.clone()),
    )
    .with_scheduler(scheduler);

    store.send(Action::DelayedAdd, |_| {});
    tokio::time::advance(Duration::from_secs(5)).await;
    for _ in 0..3 {
        tokio::task::yield_now().await;
    }

    store.receive(Action::Add, |s| s.number += 1);
    store.finish();
}

// ============================================================================
// Failures
// ============================================================================

#[test]
fn wrong_expectation_reports_a_diff() {
    let (mut store, _) = test_store();

    let error = store.try_send(Action::Add, |s| s.number = 2).unwrap_err();
    match &error {
        TestStoreError::UnexpectedMutation { action, diff } => {
            assert_eq!(action, "Add");
            assert!(diff.contains("number"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(store.state().number, 1);
    store.finish();
}

#[test]
fn sending_with_unreceived_actions_fails() {
    let (mut store, _) = test_store();
    store.send(Action::Chain, |s| s.name = "custom name".into());

    let error = store.try_send(Action::Add, |s| s.number += 1).unwrap_err();
    assert!(matches!(
        error,
        TestStoreError::UnhandledReceivedActions { count: 1, .. }
    ));
    store.receive(Action::Add, |s| s.number += 1);
    store.finish();
}

#[test]
fn receiving_nothing_or_the_wrong_action_fails() {
    let (mut store, _) = test_store();

    assert!(matches!(
        store.try_receive(Action::Add, |_| {}),
        Err(TestStoreError::NoReceivedAction { .. })
    ));

    store.send(Action::Chain, |s| s.name = "custom name".into());
    let error = store.try_receive(Action::Chain, |_| {}).unwrap_err();
    assert_eq!(
        error.to_string(),
        "expected to receive Chain, but received Add"
    );
    store.finish();
}

#[test]
fn finish_reports_effects_still_in_flight() {
    let (mut store, _) = test_store();
    store.send(Action::DelayedAdd, |_| {});

    let error = store.try_finish().unwrap_err();
    assert!(matches!(
        error,
        TestStoreError::UnfinishedEffects {
            count: 1,
            tolerance: 0
        }
    ));
    assert_eq!(store.in_flight_effects(), 0);
}

#[test]
fn finish_reports_unreceived_actions() {
    let (mut store, _) = test_store();
    store.send(Action::Chain, |s| s.name = "custom name".into());

    let error = store.try_finish().unwrap_err();
    match error {
        TestStoreError::UnreceivedActions { count, actions, .. } => {
            assert_eq!(count, 1);
            assert!(actions.contains("Add"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn tolerance_forgives_unfinished_work() {
    let (store, _) = test_store();
    let mut store = store.with_tolerance(Tolerance {
        in_flight_effects: 1,
        received_actions: 1,
    });

    store.send(Action::Chain, |s| s.name = "custom name".into());
    store.try_send(Action::Add, |_| {}).unwrap_err();
    store.skip_received_actions();

    store.send(Action::DelayedAdd, |_| {});
    store.send(Action::Chain, |s| s.name = "custom name".into());
    assert_eq!(store.in_flight_effects(), 1);
    assert_eq!(store.received_actions(), 1);
    assert!(store.try_finish().is_ok());
}

#[test]
fn tolerance_is_a_ceiling() {
    let (store, _) = test_store();
    let mut store = store.with_tolerance(Tolerance {
        in_flight_effects: 1,
        received_actions: 0,
    });

    store.send(Action::DelayedAdd, |_| {});
    store.send(Action::DelayedAdd, |_| {});
    assert!(matches!(
        store.try_finish(),
        Err(TestStoreError::UnfinishedEffects {
            count: 2,
            tolerance: 1
        })
    ));
}

#[test]
fn skipping_and_cancelling_clear_outstanding_work() {
    let (mut store, _) = test_store();
    store.send(Action::Chain, |s| s.name = "custom name".into());
    assert_eq!(store.skip_received_actions(), 1);

    store.send(Action::DelayedAdd, |_| {});
    assert_eq!(store.cancel_in_flight_effects(), 1);
    store.finish();
}

#[test]
#[should_panic(expected = "never asserted")]
fn dropping_with_unreceived_actions_panics() {
    let (mut store, _) = test_store();
    store.send(Action::Chain, |s| s.name = "custom name".into());
}

#[test]
#[should_panic(expected = "does not match the expected mutation")]
fn send_panics_on_unexpected_mutation() {
    let (mut store, _) = test_store();
    store.send(Action::Add, |_| {});
}
