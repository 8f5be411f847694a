//! Derived stores: a child view over a slice of a parent's state.
//!
//! ```text
//!   child.send(la) ──► embed(la) ──► parent.send(a)
//!                                       │
//!   child.state ◄── project(parent) ◄───┘  (pulled once, on the way back)
//!
//!   parent commit ──► project ──► child.replace_state  (pushed, unless the
//!                                                      child is mid-send)
//! ```
//!
//! A child keeps its parent alive; the parent only holds a weak reference to
//! the child. Dropping a child detaches it from the parent's commits.

use std::convert::Infallible;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::{Store, StoreBuilder};
use crate::effect::Effect;

/// Set while a child forwards an action upward, so the parent's commit
/// does not also push the new slice down.
struct SendingUp<'a>(&'a AtomicBool);

impl<'a> SendingUp<'a> {
    fn raise(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::Release);
        Self(flag)
    }
}

impl Drop for SendingUp<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

type Projection<S, L> = Arc<dyn Fn(&S) -> Option<L> + Send + Sync>;

impl<S, A, E> Store<S, A, E>
where
    S: Clone + PartialEq + Send + 'static,
    A: Send + 'static,
    E: Send + Sync + 'static,
{
    /// Child store over `project(state)`. Child actions are wrapped with
    /// `embed` and sent to this store.
    pub fn derive<LS, LA, LE>(
        &self,
        project: impl Fn(&S) -> LS + Send + Sync + 'static,
        embed: impl Fn(LA) -> A + Send + Sync + 'static,
        environment: impl FnOnce(&E) -> LE,
    ) -> Store<LS, LA, LE>
    where
        LS: Clone + PartialEq + Send + 'static,
        LA: Send + 'static,
        LE: Send + Sync + 'static,
    {
        let initial = self.with_state(&project);
        self.derive_from(Arc::new(move |state: &S| Some(project(state))), embed, environment, initial)
    }

    /// Child store over an optional slice. Returns `None` while the slice is
    /// absent. Once created, actions sent while the slice is absent are
    /// dropped and the child keeps its last value.
    pub fn derive_optional<LS, LA, LE>(
        &self,
        project: impl Fn(&S) -> Option<LS> + Send + Sync + 'static,
        embed: impl Fn(LA) -> A + Send + Sync + 'static,
        environment: impl FnOnce(&E) -> LE,
    ) -> Option<Store<LS, LA, LE>>
    where
        LS: Clone + PartialEq + Send + 'static,
        LA: Send + 'static,
        LE: Send + Sync + 'static,
    {
        let initial = self.with_state(&project)?;
        Some(self.derive_from(Arc::new(project), embed, environment, initial))
    }

    /// Read-only child that follows `project(state)`. It accepts no actions.
    pub fn derive_state<LS>(
        &self,
        project: impl Fn(&S) -> LS + Send + Sync + 'static,
    ) -> Store<LS, Infallible, ()>
    where
        LS: Clone + PartialEq + Send + 'static,
    {
        self.derive(project, |never: Infallible| match never {}, |_| ())
    }

    /// Child whose state is `get(state)` and whose actions are new values,
    /// turned into parent actions by `set`.
    pub fn binding_store<L>(
        &self,
        get: impl Fn(&S) -> L + Send + Sync + 'static,
        set: impl Fn(L) -> A + Send + Sync + 'static,
    ) -> Store<L, L, ()>
    where
        L: Clone + PartialEq + Send + 'static,
    {
        self.derive(get, set, |_| ())
    }

    fn derive_from<LS, LA, LE>(
        &self,
        project: Projection<S, LS>,
        embed: impl Fn(LA) -> A + Send + Sync + 'static,
        environment: impl FnOnce(&E) -> LE,
        initial: LS,
    ) -> Store<LS, LA, LE>
    where
        LS: Clone + PartialEq + Send + 'static,
        LA: Send + 'static,
        LE: Send + Sync + 'static,
    {
        let sending_up = Arc::new(AtomicBool::new(false));
        let parent = self.clone();

        let reducer = {
            let project = project.clone();
            let sending_up = sending_up.clone();
            move |local: &mut LS, action: LA, _: &LE| -> Effect<LA> {
                if parent.with_state(|state| project(state)).is_none() {
                    tracing::debug!(store = %parent.label(), "dropping action for an absent child state");
                    return Effect::none();
                }
                let _raised = SendingUp::raise(&sending_up);
                parent.send(embed(action));
                if let Some(next) = parent.with_state(|state| project(state)) {
                    *local = next;
                }
                Effect::none()
            }
        };

        let child = StoreBuilder::new(initial, reducer, environment(self.environment()))
            .with_scheduler(self.scheduler())
            .with_label(format!("{}/derived", self.label()))
            .build();

        let weak_child = Arc::downgrade(&child.shared);
        let upstream = self.shared.published.subscribe(move |state: &S| {
            if sending_up.load(Ordering::Acquire) {
                return;
            }
            let Some(shared) = weak_child.upgrade() else {
                return;
            };
            if let Some(local) = project(state) {
                Store { shared }.replace_state(local);
            }
        });
        *child.shared.upstream.lock() = Some(upstream);
        child
    }
}
