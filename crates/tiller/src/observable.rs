//! Observable value: the published half of a store's state.
//!
//! Holds the last committed value and a list of subscribers. `set` replaces
//! the value and notifies every subscriber, but only when the new value
//! differs from the old one.
//!
//! Subscribers run outside the internal locks, so they may subscribe,
//! unsubscribe or read the value. Calls to `set` must be serialized by the
//! owner; the store guarantees this through its processing flag.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

type Callback<T> = Arc<Mutex<Box<dyn FnMut(&T) + Send>>>;

pub(crate) struct Observable<T> {
    inner: Arc<Inner<T>>,
}

struct Inner<T> {
    value: Mutex<T>,
    subscribers: Mutex<Vec<(u64, Callback<T>)>>,
    next_id: AtomicU64,
}

impl<T> Observable<T> {
    pub(crate) fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.value.lock())
    }
}

impl<T: Clone + PartialEq + Send + 'static> Observable<T> {
    pub(crate) fn new(value: T) -> Self {
        Self {
            inner: Arc::new(Inner {
                value: Mutex::new(value),
                subscribers: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(0),
            }),
        }
    }

    pub(crate) fn get(&self) -> T {
        self.inner.value.lock().clone()
    }

    /// Publish `value`. Returns whether subscribers were notified.
    pub(crate) fn set(&self, value: T) -> bool {
        {
            let mut current = self.inner.value.lock();
            if *current == value {
                return false;
            }
            *current = value.clone();
        }
        let subscribers: Vec<Callback<T>> = self
            .inner
            .subscribers
            .lock()
            .iter()
            .map(|(_, callback)| callback.clone())
            .collect();
        for callback in subscribers {
            let mut callback = callback.lock();
            (*callback)(&value);
        }
        true
    }

    /// Register `callback` for future changes. It is not called with the
    /// current value.
    pub(crate) fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: FnMut(&T) + Send + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let callback: Callback<T> = Arc::new(Mutex::new(Box::new(callback)));
        self.inner.subscribers.lock().push((id, callback));

        let inner: Weak<Inner<T>> = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = inner.upgrade() {
                inner.subscribers.lock().retain(|(other, _)| *other != id);
            }
        })
    }

    #[cfg(test)]
    pub(crate) fn subscriber_count(&self) -> usize {
        self.inner.subscribers.lock().len()
    }
}

/// Handle to a registered observer.
///
/// Dropping the handle (or calling [`cancel`](Self::cancel)) removes the
/// observer. [`detach`](Self::detach) keeps it registered for as long as the
/// observed store lives.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    pub(crate) fn new(cancel: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn cancel(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }

    pub fn detach(mut self) {
        self.cancel = None;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}
