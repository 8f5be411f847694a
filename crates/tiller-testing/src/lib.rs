//! # Tiller Testing
//!
//! [`TestStore`] runs a reducer the way a [`Store`](tiller_core::Store) does,
//! but makes every step explicit. Each sent action must come with the exact
//! state change it causes. Each action an effect feeds back must be
//! acknowledged with [`receive`](TestStore::receive). Nothing may still be
//! running when the test ends.
//!
//! ```text
//! send(action, |s| expected change)
//!     │
//!     ├─► reducer ─► state == expected?          ── else UnexpectedMutation
//!     │
//!     └─► effect ─► received queue
//!                       │
//! receive(action, |s| expected change)  ◄────────┘  ── else NoReceivedAction
//!                                                      / UnexpectedReceivedAction
//! finish()  ── received queue empty, no effect in flight
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use tiller_core::TestScheduler;
//! use tiller_testing::TestStore;
//!
//! let scheduler = TestScheduler::new();
//! let mut store = TestStore::new(0, reducer, scheduler.clone())
//!     .with_scheduler(scheduler.clone());
//!
//! store.send(Action::DelayedIncrement, |_| {});
//! scheduler.advance_by(Duration::from_secs(5));
//! store.receive(Action::Increment, |n| *n += 1);
//! store.finish();
//! ```
//!
//! The panicking methods (`send`, `receive`, `finish`) are for tests; the
//! `try_` variants return a [`TestStoreError`] instead. Dropping an
//! unfinished store runs the `finish` checks.

use std::collections::VecDeque;
use std::fmt::Debug;
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tiller_core::{diff, launch, EffectHandles, ImmediateScheduler, Reducer, Scheduler};

// ============================================================================
// Errors
// ============================================================================

/// A test store assertion that did not hold.
#[derive(Debug, Error)]
pub enum TestStoreError {
    /// The reducer produced a different state than the test declared.
    #[error("state after {action} does not match the expected mutation:\n{diff}")]
    UnexpectedMutation { action: String, diff: String },

    /// `send` was called while effect output was still waiting to be received.
    #[error("{count} received action(s) must be handled before sending another action: {actions}")]
    UnhandledReceivedActions { count: usize, actions: String },

    /// `receive` was called but no effect has emitted anything.
    #[error("expected to receive {expected}, but no action was received")]
    NoReceivedAction { expected: String },

    /// The oldest received action is not the one the test expected.
    #[error("expected to receive {expected}, but received {received}")]
    UnexpectedReceivedAction { expected: String, received: String },

    /// Effects were still running when the test finished.
    #[error("{count} effect(s) still in flight at the end of the test (tolerance {tolerance})")]
    UnfinishedEffects { count: usize, tolerance: usize },

    /// Effect output was never acknowledged with `receive`.
    #[error("{count} received action(s) were never asserted (tolerance {tolerance}): {actions}")]
    UnreceivedActions {
        count: usize,
        tolerance: usize,
        actions: String,
    },
}

// ============================================================================
// Configuration
// ============================================================================

/// How much unfinished work `finish` forgives. The default forgives nothing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tolerance {
    pub in_flight_effects: usize,
    pub received_actions: usize,
}

// ============================================================================
// TestStore
// ============================================================================

/// Store for tests that accounts for every state change and every effect.
pub struct TestStore<S, A, E> {
    state: S,
    reducer: Box<dyn Reducer<S, A, E>>,
    environment: E,
    scheduler: Arc<dyn Scheduler>,
    received: Arc<Mutex<VecDeque<A>>>,
    effects: EffectHandles,
    tolerance: Tolerance,
    finished: bool,
    /// Renders unreceived actions from `Drop`, which cannot require `Debug`.
    describe: fn(&VecDeque<A>) -> String,
}

impl<S, A, E> TestStore<S, A, E>
where
    S: Clone + PartialEq + Debug + Send + 'static,
    A: PartialEq + Debug + Send + 'static,
    E: Send + Sync + 'static,
{
    pub fn new(initial_state: S, reducer: impl Reducer<S, A, E>, environment: E) -> Self {
        Self {
            state: initial_state,
            reducer: Box::new(reducer),
            environment,
            scheduler: Arc::new(ImmediateScheduler),
            received: Arc::new(Mutex::new(VecDeque::new())),
            effects: EffectHandles::new(),
            tolerance: Tolerance::default(),
            finished: false,
            describe: |actions| format!("{actions:?}"),
        }
    }

    /// Scheduler that runs effects past their synchronous prefix. Pass the
    /// same [`TestScheduler`](tiller_core::TestScheduler) the reducer's
    /// environment uses, then step it from the test.
    pub fn with_scheduler(mut self, scheduler: impl Scheduler) -> Self {
        self.scheduler = Arc::new(scheduler);
        self
    }

    pub fn with_tolerance(mut self, tolerance: Tolerance) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn state(&self) -> &S {
        &self.state
    }

    pub fn environment(&self) -> &E {
        &self.environment
    }

    /// Effect outputs waiting for `receive`.
    pub fn received_actions(&self) -> usize {
        self.received.lock().len()
    }

    pub fn in_flight_effects(&self) -> usize {
        self.effects.active()
    }

    /// Send `action` and assert that it changes the state exactly as
    /// `update` does to a copy of the previous state.
    #[track_caller]
    pub fn send(&mut self, action: A, update: impl FnOnce(&mut S)) {
        if let Err(error) = self.try_send(action, update) {
            panic!("{error}");
        }
    }

    pub fn try_send(&mut self, action: A, update: impl FnOnce(&mut S)) -> Result<(), TestStoreError> {
        let pending = self.received.lock();
        if !pending.is_empty() {
            return Err(TestStoreError::UnhandledReceivedActions {
                count: pending.len(),
                actions: (self.describe)(&pending),
            });
        }
        drop(pending);

        tracing::trace!(action = ?action, "test store send");
        self.reduce(action, update)
    }

    /// Take the oldest action an effect emitted, require it to equal
    /// `expected`, and assert its state change.
    #[track_caller]
    pub fn receive(&mut self, expected: A, update: impl FnOnce(&mut S)) {
        if let Err(error) = self.try_receive(expected, update) {
            panic!("{error}");
        }
    }

    pub fn try_receive(
        &mut self,
        expected: A,
        update: impl FnOnce(&mut S),
    ) -> Result<(), TestStoreError> {
        let next = self.received.lock().pop_front();
        let Some(action) = next else {
            return Err(TestStoreError::NoReceivedAction {
                expected: format!("{expected:?}"),
            });
        };
        if action != expected {
            return Err(TestStoreError::UnexpectedReceivedAction {
                expected: format!("{expected:?}"),
                received: format!("{action:?}"),
            });
        }

        tracing::trace!(action = ?action, "test store receive");
        self.reduce(action, update)
    }

    /// Drop every received action without asserting it. Returns how many.
    pub fn skip_received_actions(&mut self) -> usize {
        let mut received = self.received.lock();
        let skipped = received.len();
        received.clear();
        skipped
    }

    /// Abort every effect still running. Returns how many were active.
    pub fn cancel_in_flight_effects(&mut self) -> usize {
        self.effects.abort_all()
    }

    /// Assert that all effect output was received and no effect is running.
    #[track_caller]
    pub fn finish(mut self) {
        if let Err(error) = self.try_finish() {
            panic!("{error}");
        }
    }

    /// Run the end-of-test checks. Effects still running afterwards are
    /// aborted either way.
    pub fn try_finish(&mut self) -> Result<(), TestStoreError> {
        self.finished = true;
        let result = self.check_finished();
        self.effects.abort_all();
        result
    }

    fn check_finished(&self) -> Result<(), TestStoreError> {
        let received = self.received.lock();
        if received.len() > self.tolerance.received_actions {
            return Err(TestStoreError::UnreceivedActions {
                count: received.len(),
                tolerance: self.tolerance.received_actions,
                actions: (self.describe)(&received),
            });
        }
        drop(received);

        let in_flight = self.effects.active();
        if in_flight > self.tolerance.in_flight_effects {
            return Err(TestStoreError::UnfinishedEffects {
                count: in_flight,
                tolerance: self.tolerance.in_flight_effects,
            });
        }
        Ok(())
    }

    fn reduce(&mut self, action: A, update: impl FnOnce(&mut S)) -> Result<(), TestStoreError> {
        let description = format!("{action:?}");
        let mut expected = self.state.clone();
        update(&mut expected);

        let effect = self
            .reducer
            .reduce(&mut self.state, action, &self.environment);
        let received = self.received.clone();
        launch(effect, self.scheduler.as_ref(), &self.effects, move |action| {
            received.lock().push_back(action);
        });

        if expected != self.state {
            return Err(TestStoreError::UnexpectedMutation {
                action: description,
                diff: diff(&expected, &self.state),
            });
        }
        Ok(())
    }
}

impl<S, A, E> Drop for TestStore<S, A, E> {
    fn drop(&mut self) {
        if self.finished || std::thread::panicking() {
            self.effects.abort_all();
            return;
        }
        self.finished = true;
        let (unreceived, actions) = {
            let received = self.received.lock();
            (received.len(), (self.describe)(&received))
        };
        let in_flight = self.effects.active();
        self.effects.abort_all();
        if unreceived > self.tolerance.received_actions {
            panic!(
                "{}",
                TestStoreError::UnreceivedActions {
                    count: unreceived,
                    tolerance: self.tolerance.received_actions,
                    actions,
                }
            );
        }
        if in_flight > self.tolerance.in_flight_effects {
            panic!(
                "{}",
                TestStoreError::UnfinishedEffects {
                    count: in_flight,
                    tolerance: self.tolerance.in_flight_effects,
                }
            );
        }
    }
}
