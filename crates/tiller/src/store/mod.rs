//! The store: state, reducer, environment and the action-processing loop.
//!
//! `send` appends to a FIFO queue. Whoever finds the store idle drains the
//! queue; everyone else (a reducer, an effect callback, an observer, another
//! thread) just enqueues and returns. Once the queue is empty the working
//! state is published in one commit, so observers see one notification per
//! batch no matter how many actions the batch held.

mod binding;
mod builder;
mod derive;

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::debug::{self, DebugOptions};
use crate::effect::Effect;
use crate::observable::{Observable, Subscription};
use crate::runtime::{self, EffectHandles};
use crate::scheduler::Scheduler;

pub use binding::Binding;
pub use builder::StoreBuilder;

/// Pure state transition: mutate `state` for `action` and describe any
/// follow-up work as an [`Effect`].
///
/// Reducers must be total and synchronous. Implemented for every matching
/// closure or `fn`.
pub trait Reducer<S, A, E>: Send + Sync + 'static {
    fn reduce(&self, state: &mut S, action: A, env: &E) -> Effect<A>;
}

impl<S, A, E, F> Reducer<S, A, E> for F
where
    F: Fn(&mut S, A, &E) -> Effect<A> + Send + Sync + 'static,
{
    fn reduce(&self, state: &mut S, action: A, env: &E) -> Effect<A> {
        self(state, action, env)
    }
}

type ActionHook<A> = Arc<dyn Fn(&A) + Send + Sync>;
type StateHook<S> = Arc<dyn Fn(&S, &S) + Send + Sync>;

struct DebugHooks<S, A> {
    on_action: Option<ActionHook<A>>,
    on_state_change: Option<StateHook<S>>,
}

impl<S, A> Clone for DebugHooks<S, A> {
    fn clone(&self) -> Self {
        Self {
            on_action: self.on_action.clone(),
            on_state_change: self.on_state_change.clone(),
        }
    }
}

impl<S, A> Default for DebugHooks<S, A> {
    fn default() -> Self {
        Self {
            on_action: None,
            on_state_change: None,
        }
    }
}

/// Handle to a store. Cloning is cheap and every clone drives the same state.
///
/// Dropping the last handle aborts the store's in-flight effects.
pub struct Store<S, A, E> {
    shared: Arc<Shared<S, A, E>>,
}

impl<S, A, E> Clone for Store<S, A, E> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

struct Shared<S, A, E> {
    label: Arc<str>,
    reducer: Box<dyn Reducer<S, A, E>>,
    environment: E,
    /// Working copy; only the draining thread mutates it.
    state: Mutex<S>,
    /// Last committed snapshot.
    published: Observable<S>,
    queue: Mutex<VecDeque<A>>,
    processing: AtomicBool,
    /// Working state may differ from the published snapshot.
    dirty: AtomicBool,
    effects: EffectHandles,
    scheduler: Arc<dyn Scheduler>,
    hooks: Mutex<DebugHooks<S, A>>,
    /// Registration on the parent's commits, for derived stores.
    upstream: Mutex<Option<Subscription>>,
}

impl<S, A, E> Store<S, A, E>
where
    S: Clone + PartialEq + Send + 'static,
    A: Send + 'static,
    E: Send + Sync + 'static,
{
    /// Store on the [`ImmediateScheduler`](crate::ImmediateScheduler).
    pub fn new(initial_state: S, reducer: impl Reducer<S, A, E>, environment: E) -> Self {
        Self::builder(initial_state, reducer, environment).build()
    }

    pub fn builder(
        initial_state: S,
        reducer: impl Reducer<S, A, E>,
        environment: E,
    ) -> StoreBuilder<S, A, E> {
        StoreBuilder::new(initial_state, reducer, environment)
    }

    fn from_parts(
        label: Arc<str>,
        initial_state: S,
        reducer: Box<dyn Reducer<S, A, E>>,
        environment: E,
        scheduler: Arc<dyn Scheduler>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                label,
                reducer,
                environment,
                state: Mutex::new(initial_state.clone()),
                published: Observable::new(initial_state),
                queue: Mutex::new(VecDeque::new()),
                processing: AtomicBool::new(false),
                dirty: AtomicBool::new(false),
                effects: EffectHandles::new(),
                scheduler,
                hooks: Mutex::new(DebugHooks::default()),
                upstream: Mutex::new(None),
            }),
        }
    }

    /// Queue `action` and, unless the store is already processing, drain the
    /// queue before returning.
    ///
    /// Actions are reduced in the order they were sent, including actions
    /// sent re-entrantly by effects and observers.
    pub fn send(&self, action: A) {
        self.shared.queue.lock().push_back(action);
        self.shared.drain();
    }

    /// Send `action`, then panic unless the committed state meets
    /// `expectation`. Returns `self` so checks can be chained in tests.
    #[track_caller]
    pub fn assert(&self, action: A, expectation: impl FnOnce(&S) -> bool) -> &Self
    where
        S: fmt::Debug,
    {
        self.send(action);
        self.with_state(|state| {
            if !expectation(state) {
                panic!(
                    "store {}: state {state:?} does not meet the expectation",
                    self.shared.label
                );
            }
        });
        self
    }

    /// Clone of the last committed state. Never a partially processed batch.
    pub fn state(&self) -> S {
        self.shared.published.get()
    }

    /// Borrow the last committed state.
    pub fn with_state<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        self.shared.published.with(f)
    }

    pub fn environment(&self) -> &E {
        &self.shared.environment
    }

    pub fn label(&self) -> &str {
        &self.shared.label
    }

    pub fn scheduler(&self) -> Arc<dyn Scheduler> {
        self.shared.scheduler.clone()
    }

    /// Effects launched by this store that are still running.
    pub fn active_effects(&self) -> usize {
        self.shared.effects.active()
    }

    /// Abort every effect this store is running. Returns how many were active.
    pub fn cancel_effects(&self) -> usize {
        self.shared.effects.abort_all()
    }

    /// Call `on_change` with `projection` of the current state now, and again
    /// after every commit where the projected value changed.
    pub fn observe<L, P, F>(&self, projection: P, mut on_change: F) -> Subscription
    where
        L: PartialEq + Send + 'static,
        P: Fn(&S) -> L + Send + 'static,
        F: FnMut(&L) + Send + 'static,
    {
        let mut last = self.shared.published.with(|state| projection(state));
        on_change(&last);
        self.shared.published.subscribe(move |state| {
            let next = projection(state);
            if next != last {
                on_change(&next);
                last = next;
            }
        })
    }

    /// Install debug callbacks: `on_action` before each action is reduced,
    /// `on_state_change(old, new)` after each reduction that changed state.
    pub fn set_debug_handlers<FA, FS>(&self, on_action: FA, on_state_change: FS)
    where
        FA: Fn(&A) + Send + Sync + 'static,
        FS: Fn(&S, &S) + Send + Sync + 'static,
    {
        *self.shared.hooks.lock() = DebugHooks {
            on_action: Some(Arc::new(on_action)),
            on_state_change: Some(Arc::new(on_state_change)),
        };
    }

    pub fn clear_debug_handlers(&self) {
        *self.shared.hooks.lock() = DebugHooks::default();
    }

    /// Overwrite the working state and publish it, as a derived store does
    /// when its parent changes.
    fn replace_state(&self, state: S) {
        *self.shared.state.lock() = state;
        self.shared.dirty.store(true, Ordering::Release);
        self.shared.drain();
    }
}

impl<S, A, E> Store<S, A, E>
where
    S: Clone + PartialEq + fmt::Debug + Send + 'static,
    A: fmt::Debug + Send + 'static,
    E: Send + Sync + 'static,
{
    /// Log actions and state diffs through `tracing` at the chosen levels.
    pub fn debug(&self, options: DebugOptions) {
        let label = self.shared.label.clone();
        let on_action: Option<ActionHook<A>> = options.actions.map(|level| {
            let label = label.clone();
            Arc::new(move |action: &A| {
                debug::log(level, &label, &format!("action: {action:?}"));
            }) as ActionHook<A>
        });
        let on_state_change: Option<StateHook<S>> = options.state_changes.map(|level| {
            let label = label.clone();
            Arc::new(move |old: &S, new: &S| {
                debug::log(level, &label, &format!("state:\n{}", debug::diff(old, new)));
            }) as StateHook<S>
        });
        *self.shared.hooks.lock() = DebugHooks {
            on_action,
            on_state_change,
        };
    }
}

impl<S, A, E> Shared<S, A, E>
where
    S: Clone + PartialEq + Send + 'static,
    A: Send + 'static,
    E: Send + Sync + 'static,
{
    fn drain(self: &Arc<Self>) {
        loop {
            if self
                .processing
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                return;
            }

            loop {
                let next = self.queue.lock().pop_front();
                let Some(action) = next else {
                    break;
                };
                self.process(action);
            }

            // Observers run while `processing` is still set, so anything they
            // send is queued and picked up by the re-check below.
            if self.dirty.swap(false, Ordering::AcqRel) {
                let snapshot = self.state.lock().clone();
                self.published.set(snapshot);
            }

            self.processing.store(false, Ordering::Release);
            if self.queue.lock().is_empty() && !self.dirty.load(Ordering::Acquire) {
                return;
            }
        }
    }

    fn process(self: &Arc<Self>, action: A) {
        let hooks = self.hooks.lock().clone();
        if let Some(on_action) = &hooks.on_action {
            on_action(&action);
        }
        tracing::trace!(store = %self.label, "processing action");

        let (effect, change) = {
            let mut state = self.state.lock();
            let before = hooks.on_state_change.is_some().then(|| state.clone());
            let effect = self.reducer.reduce(&mut state, action, &self.environment);
            let change = before
                .filter(|old| *old != *state)
                .map(|old| (old, state.clone()));
            (effect, change)
        };
        self.dirty.store(true, Ordering::Release);

        if let (Some(on_state_change), Some((old, new))) = (&hooks.on_state_change, change) {
            on_state_change(&old, &new);
        }

        let weak = Arc::downgrade(self);
        let label = self.label.clone();
        runtime::launch(
            effect,
            self.scheduler.as_ref(),
            &self.effects,
            move |action| match weak.upgrade() {
                Some(shared) => {
                    shared.queue.lock().push_back(action);
                    shared.drain();
                }
                None => tracing::debug!(store = %label, "dropping effect output for a released store"),
            },
        );
    }
}

impl<S, A, E> Drop for Shared<S, A, E> {
    fn drop(&mut self) {
        let aborted = self.effects.abort_all();
        if aborted > 0 {
            tracing::debug!(store = %self.label, aborted, "store released with running effects");
        }
    }
}

impl<S, A, E> fmt::Debug for Store<S, A, E>
where
    S: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.shared.published.with(|state| {
            f.debug_struct("Store")
                .field("label", &self.shared.label)
                .field("state", state)
                .field("active_effects", &self.shared.effects.tracked())
                .finish()
        })
    }
}
