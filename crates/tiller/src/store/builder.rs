use std::sync::Arc;

use super::{Reducer, Store};
use crate::scheduler::{ImmediateScheduler, Scheduler};

/// Builder for configuring a [`Store`].
///
/// ```ignore
/// let store = Store::builder(State::default(), reducer, env)
///     .with_scheduler(TokioScheduler::current()?)
///     .with_label("search")
///     .build();
/// ```
pub struct StoreBuilder<S, A, E> {
    initial_state: S,
    reducer: Box<dyn Reducer<S, A, E>>,
    environment: E,
    scheduler: Arc<dyn Scheduler>,
    label: String,
}

impl<S, A, E> StoreBuilder<S, A, E>
where
    S: Clone + PartialEq + Send + 'static,
    A: Send + 'static,
    E: Send + Sync + 'static,
{
    pub fn new(initial_state: S, reducer: impl Reducer<S, A, E>, environment: E) -> Self {
        Self {
            initial_state,
            reducer: Box::new(reducer),
            environment,
            scheduler: Arc::new(ImmediateScheduler),
            label: "store".to_string(),
        }
    }

    /// Scheduler that runs effects past their synchronous prefix.
    ///
    /// Defaults to [`ImmediateScheduler`].
    pub fn with_scheduler(mut self, scheduler: impl Scheduler) -> Self {
        self.scheduler = Arc::new(scheduler);
        self
    }

    /// Name used in log output. Derived stores append `/derived`.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn build(self) -> Store<S, A, E> {
        tracing::debug!(store = %self.label, "store created");
        Store::from_parts(
            self.label.into(),
            self.initial_state,
            self.reducer,
            self.environment,
            self.scheduler,
        )
    }
}
