//! Process-wide registry of cancellable effects.
//!
//! Every effect wrapped with [`Effect::cancellable`](crate::Effect::cancellable)
//! registers its abort handle here under its [`CancelToken`] when a store
//! subscribes to it, and removes itself when it completes or is dropped.
//! [`Effect::cancel`](crate::Effect::cancel) aborts every handle registered
//! under a token.
//!
//! The registry is shared across stores and threads, so all access goes
//! through a single mutex. Contention is low: registration, removal and
//! cancellation are short map operations.
//!
//! ## Known benign race
//!
//! Cancellation is immediate at the registry level, but an effect that is
//! mid-emission on another thread may still deliver one in-flight value
//! before its abort is observed. The registry only guarantees that each
//! handle is removed exactly once.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use futures::future::AbortHandle;
use parking_lot::Mutex;
use smallvec::SmallVec;
use uuid::Uuid;

use crate::cancel::CancelToken;

/// Unique identity of one running effect instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EffectId(Uuid);

impl EffectId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EffectId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EffectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

type Entry = SmallVec<[(EffectId, AbortHandle); 2]>;

/// Mapping from cancellation token to the effects currently running under it.
///
/// Invariant: an entry exists only while its handle set is non-empty.
#[derive(Default)]
pub struct EffectRegistry {
    entries: Mutex<HashMap<CancelToken, Entry>>,
}

static GLOBAL: OnceLock<Arc<EffectRegistry>> = OnceLock::new();

impl EffectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry used by [`Effect::cancellable`](crate::Effect::cancellable)
    /// and [`Effect::cancel`](crate::Effect::cancel).
    ///
    /// Initialised on first use and never torn down.
    pub fn global() -> Arc<EffectRegistry> {
        GLOBAL.get_or_init(|| Arc::new(EffectRegistry::new())).clone()
    }

    /// Register a running effect under `token`.
    pub fn register(&self, token: CancelToken, id: EffectId, handle: AbortHandle) {
        tracing::trace!(?token, effect = %id, "registering cancellable effect");
        self.entries
            .lock()
            .entry(token)
            .or_default()
            .push((id, handle));
    }

    /// Remove one effect from `token`'s entry, deleting the entry once empty.
    ///
    /// Returns `false` if the effect was not registered (already cancelled or
    /// already removed).
    pub fn remove(&self, token: &CancelToken, id: EffectId) -> bool {
        let mut entries = self.entries.lock();
        let Some(entry) = entries.get_mut(token) else {
            return false;
        };
        let before = entry.len();
        entry.retain(|(registered, _)| *registered != id);
        let removed = entry.len() != before;
        if entry.is_empty() {
            entries.remove(token);
        }
        removed
    }

    /// Abort every effect registered under `token` and drop the entry.
    ///
    /// Returns how many effects were aborted. Cancelling an unknown token, or
    /// cancelling twice, is a no-op.
    pub fn cancel(&self, token: &CancelToken) -> usize {
        let entry = self.entries.lock().remove(token);
        let Some(entry) = entry else {
            return 0;
        };
        for (_, handle) in &entry {
            handle.abort();
        }
        tracing::debug!(?token, cancelled = entry.len(), "cancelled effects");
        entry.len()
    }

    pub fn contains(&self, token: &CancelToken) -> bool {
        self.entries.lock().contains_key(token)
    }

    /// Number of effects currently registered under `token`.
    pub fn count(&self, token: &CancelToken) -> usize {
        self.entries.lock().get(token).map_or(0, |entry| entry.len())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl fmt::Debug for EffectRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = self.entries.lock();
        f.debug_map()
            .entries(entries.iter().map(|(token, entry)| (token, entry.len())))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Hash, PartialEq, Eq)]
    struct Token;

    fn handle() -> AbortHandle {
        AbortHandle::new_pair().0
    }

    #[test]
    fn entry_is_deleted_when_last_effect_is_removed() {
        let registry = EffectRegistry::new();
        let token = CancelToken::new(Token);
        let (a, b) = (EffectId::new(), EffectId::new());

        registry.register(token.clone(), a, handle());
        registry.register(token.clone(), b, handle());
        assert_eq!(registry.count(&token), 2);

        assert!(registry.remove(&token, a));
        assert!(registry.contains(&token));
        assert!(registry.remove(&token, b));
        assert!(!registry.contains(&token));
        assert!(registry.is_empty());
    }

    #[test]
    fn cancel_aborts_every_shared_handle() {
        let registry = EffectRegistry::new();
        let token = CancelToken::new(Token);
        let first = handle();
        let second = handle();

        registry.register(token.clone(), EffectId::new(), first.clone());
        registry.register(token.clone(), EffectId::new(), second.clone());

        assert_eq!(registry.cancel(&token), 2);
        assert!(first.is_aborted());
        assert!(second.is_aborted());
        assert!(registry.is_empty());
    }

    #[test]
    fn cancel_is_idempotent() {
        let registry = EffectRegistry::new();
        let token = CancelToken::new(Token);
        registry.register(token.clone(), EffectId::new(), handle());

        assert_eq!(registry.cancel(&token), 1);
        assert_eq!(registry.cancel(&token), 0);
    }

    #[test]
    fn removing_after_cancel_is_a_noop() {
        let registry = EffectRegistry::new();
        let token = CancelToken::new(Token);
        let id = EffectId::new();
        registry.register(token.clone(), id, handle());

        registry.cancel(&token);
        assert!(!registry.remove(&token, id));
        assert!(registry.is_empty());
    }

    #[test]
    fn global_registry_is_shared() {
        let a = EffectRegistry::global();
        let b = EffectRegistry::global();
        assert!(Arc::ptr_eq(&a, &b));
    }
}
