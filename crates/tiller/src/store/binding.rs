use std::fmt;
use std::sync::Arc;

use super::Store;
use crate::effect::Effect;

/// Two-way handle onto one value of a store's state.
///
/// `get` reads the current committed value; `set` sends the action built
/// from the new value.
pub struct Binding<L> {
    get: Arc<dyn Fn() -> L + Send + Sync>,
    set: Arc<dyn Fn(L) + Send + Sync>,
}

impl<L> Clone for Binding<L> {
    fn clone(&self) -> Self {
        Self {
            get: self.get.clone(),
            set: self.set.clone(),
        }
    }
}

impl<L: 'static> Binding<L> {
    pub fn new(
        get: impl Fn() -> L + Send + Sync + 'static,
        set: impl Fn(L) + Send + Sync + 'static,
    ) -> Self {
        Self {
            get: Arc::new(get),
            set: Arc::new(set),
        }
    }

    /// Binding that always reads `value` and ignores writes.
    pub fn constant(value: L) -> Self
    where
        L: Clone + Send + Sync,
    {
        Self::new(move || value.clone(), |_| {})
    }

    pub fn get(&self) -> L {
        (self.get)()
    }

    pub fn set(&self, value: L) {
        (self.set)(value)
    }
}

impl<L> fmt::Debug for Binding<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding").finish_non_exhaustive()
    }
}

impl<S, A, E> Store<S, A, E>
where
    S: Clone + PartialEq + Send + 'static,
    A: Send + 'static,
    E: Send + Sync + 'static,
{
    /// Bind `get(state)` for reading and `to_action(value)` for writing.
    pub fn binding<L: 'static>(
        &self,
        get: impl Fn(&S) -> L + Send + Sync + 'static,
        to_action: impl Fn(L) -> A + Send + Sync + 'static,
    ) -> Binding<L> {
        let reader = self.clone();
        let writer = self.clone();
        Binding::new(
            move || reader.with_state(&get),
            move |value| writer.send(to_action(value)),
        )
    }

    /// Bind `get(state)` for reading and hand writes to `on_set` instead of
    /// sending an action.
    pub fn binding_with<L: 'static>(
        &self,
        get: impl Fn(&S) -> L + Send + Sync + 'static,
        on_set: impl Fn(L) + Send + Sync + 'static,
    ) -> Binding<L> {
        let reader = self.clone();
        Binding::new(move || reader.with_state(&get), on_set)
    }
}

impl<S> Store<S, S, ()>
where
    S: Clone + PartialEq + Send + 'static,
{
    /// Store that never changes; every action is ignored.
    pub fn constant(value: S) -> Self {
        Store::new(value, |_: &mut S, _: S, _: &()| Effect::none(), ())
    }
}
