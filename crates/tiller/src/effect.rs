//! Effects: lazy, cancellable producers of follow-up actions.
//!
//! A reducer returns an [`Effect`] describing work to do after the state
//! transition. Nothing runs until a store subscribes to it. Every action the
//! effect emits is fed back into the store that ran it.
//!
//! ```ignore
//! fn reducer(state: &mut Search, action: Action, env: &Env) -> Effect<Action> {
//!     match action {
//!         Action::QueryChanged(query) => {
//!             state.query = query.clone();
//!             Effect::future(env.client.search(query))
//!                 .map(Action::Results)
//!                 .debounce(SearchRequest, Duration::from_millis(300), &env.scheduler)
//!         }
//!         Action::Results(results) => {
//!             state.results = results;
//!             Effect::none()
//!         }
//!     }
//! }
//! ```

use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::future::{AbortHandle, Abortable};
use futures::stream::{self, BoxStream, Stream, StreamExt};

use crate::cancel::CancelToken;
use crate::registry::{EffectId, EffectRegistry};
use crate::scheduler::Scheduler;

/// A lazy stream of follow-up actions.
///
/// `Effect::none()` is distinguished from an empty stream so the store can
/// skip subscription entirely.
#[must_use = "effects do nothing unless returned to a store"]
pub struct Effect<A> {
    stream: Option<BoxStream<'static, A>>,
}

impl<A: Send + 'static> Effect<A> {
    /// No follow-up work.
    pub fn none() -> Self {
        Self { stream: None }
    }

    /// Emit `action` synchronously and complete.
    pub fn send(action: A) -> Self {
        Self::stream(stream::once(futures::future::ready(action)))
    }

    /// Emit the output of `future` once it resolves.
    pub fn future<F>(future: F) -> Self
    where
        F: Future<Output = A> + Send + 'static,
    {
        Self::stream(stream::once(future))
    }

    /// Emit every item of `stream`.
    pub fn stream<S>(stream: S) -> Self
    where
        S: Stream<Item = A> + Send + 'static,
    {
        Self {
            stream: Some(stream.boxed()),
        }
    }

    /// Run `future` for its side effect; emits nothing.
    pub fn fire_and_forget<F>(future: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Self::stream(stream::once(future).filter_map(|()| async { None }))
    }

    /// Run all effects concurrently, interleaving their actions.
    pub fn merge(effects: impl IntoIterator<Item = Effect<A>>) -> Self {
        let streams: Vec<_> = effects.into_iter().filter_map(|e| e.stream).collect();
        match streams.len() {
            0 => Self::none(),
            1 => Self {
                stream: streams.into_iter().next(),
            },
            _ => Self::stream(stream::select_all(streams)),
        }
    }

    /// Run effects one after another; each starts when the previous completes.
    pub fn concat(effects: impl IntoIterator<Item = Effect<A>>) -> Self {
        let streams: Vec<_> = effects.into_iter().filter_map(|e| e.stream).collect();
        match streams.len() {
            0 => Self::none(),
            1 => Self {
                stream: streams.into_iter().next(),
            },
            _ => Self::stream(stream::iter(streams).flatten()),
        }
    }

    /// Translate emitted actions, typically to lift a child reducer's effect
    /// into the parent's action type.
    pub fn map<B, F>(self, f: F) -> Effect<B>
    where
        B: Send + 'static,
        F: FnMut(A) -> B + Send + 'static,
    {
        Effect {
            stream: self.stream.map(|s| s.map(f).boxed()),
        }
    }

    /// Make this effect cancellable through the global registry.
    pub fn cancellable<K>(self, token: K) -> Self
    where
        K: Hash + Eq + fmt::Debug + Send + Sync + 'static,
    {
        self.cancellable_in(token, EffectRegistry::global())
    }

    /// Make this effect cancellable through `registry`.
    ///
    /// On subscription the effect registers its abort handle under `token`;
    /// it removes itself on completion, cancellation or drop.
    pub fn cancellable_in<K>(self, token: K, registry: Arc<EffectRegistry>) -> Self
    where
        K: Hash + Eq + fmt::Debug + Send + Sync + 'static,
    {
        match self.stream {
            None => self,
            Some(stream) => Self::stream(Cancellable {
                state: CancellableState::Idle {
                    stream,
                    token: CancelToken::new(token),
                    registry,
                },
            }),
        }
    }

    /// Cancel every effect registered under `token` in the global registry.
    ///
    /// Cancellation happens when the store subscribes to the returned effect,
    /// which is synchronous within the `send` that produced it. The effect
    /// emits nothing.
    pub fn cancel<K>(token: K) -> Self
    where
        K: Hash + Eq + fmt::Debug + Send + Sync + 'static,
    {
        Self::cancel_in(token, EffectRegistry::global())
    }

    /// Cancel every effect registered under `token` in `registry`.
    pub fn cancel_in<K>(token: K, registry: Arc<EffectRegistry>) -> Self
    where
        K: Hash + Eq + fmt::Debug + Send + Sync + 'static,
    {
        let token = CancelToken::new(token);
        Self::stream(stream::poll_fn(move |_| {
            registry.cancel(&token);
            Poll::Ready(None)
        }))
    }

    /// Delay the start of this effect by `duration` on `scheduler`'s clock.
    pub fn deferred<S>(self, duration: Duration, scheduler: &S) -> Self
    where
        S: Scheduler + Clone,
    {
        let Some(inner) = self.stream else {
            return self;
        };
        let scheduler = scheduler.clone();
        let delayed = async move {
            scheduler.sleep(duration).await;
            inner
        };
        Self::stream(stream::once(delayed).flatten())
    }

    /// Cancel any in-flight effect under `token`, then run this one after
    /// `duration`. Repeated sends within the window only let the last through.
    pub fn debounce<K, S>(self, token: K, duration: Duration, scheduler: &S) -> Self
    where
        K: Hash + Eq + fmt::Debug + Send + Sync + 'static,
        S: Scheduler + Clone,
    {
        let token = CancelToken::new(token);
        Self::concat([
            Self::cancel(token.clone()),
            self.deferred(duration, scheduler).cancellable(token),
        ])
    }

    pub fn is_none(&self) -> bool {
        self.stream.is_none()
    }

    pub fn into_stream(self) -> Option<BoxStream<'static, A>> {
        self.stream
    }
}

impl<A: Send + 'static> Default for Effect<A> {
    fn default() -> Self {
        Self::none()
    }
}

impl<A> fmt::Debug for Effect<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.stream {
            None => f.write_str("Effect::none"),
            Some(_) => f.write_str("Effect(..)"),
        }
    }
}

impl<A: Send + 'static> FromIterator<Effect<A>> for Effect<A> {
    fn from_iter<I: IntoIterator<Item = Effect<A>>>(iter: I) -> Self {
        Self::merge(iter)
    }
}

// ============================================================================
// Cancellable stream
// ============================================================================

struct Cancellable<A> {
    state: CancellableState<A>,
}

enum CancellableState<A> {
    Idle {
        stream: BoxStream<'static, A>,
        token: CancelToken,
        registry: Arc<EffectRegistry>,
    },
    Running {
        stream: Abortable<BoxStream<'static, A>>,
        _registration: Registration,
    },
    Done,
}

/// Removes the registry entry exactly once, whichever way the effect ends.
struct Registration {
    token: CancelToken,
    id: EffectId,
    registry: Arc<EffectRegistry>,
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.registry.remove(&self.token, self.id);
    }
}

impl<A> Stream for Cancellable<A> {
    type Item = A;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<A>> {
        let this = &mut *self;
        if matches!(this.state, CancellableState::Idle { .. }) {
            let CancellableState::Idle {
                stream,
                token,
                registry,
            } = std::mem::replace(&mut this.state, CancellableState::Done)
            else {
                return Poll::Ready(None);
            };
            let (handle, abort_registration) = AbortHandle::new_pair();
            let id = EffectId::new();
            registry.register(token.clone(), id, handle);
            this.state = CancellableState::Running {
                stream: Abortable::new(stream, abort_registration),
                _registration: Registration {
                    token,
                    id,
                    registry,
                },
            };
        }

        let CancellableState::Running { stream, .. } = &mut this.state else {
            return Poll::Ready(None);
        };
        match stream.poll_next_unpin(cx) {
            Poll::Ready(Some(action)) => Poll::Ready(Some(action)),
            Poll::Ready(None) => {
                this.state = CancellableState::Done;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::channel::mpsc;
    use futures::executor::block_on_stream;
    use futures::FutureExt;

    #[derive(Debug, Hash, PartialEq, Eq)]
    struct Token;

    fn collect<A: Send + 'static>(effect: Effect<A>) -> Vec<A> {
        effect
            .into_stream()
            .map(|s| block_on_stream(s).collect())
            .unwrap_or_default()
    }

    #[test]
    fn none_has_no_stream() {
        assert!(Effect::<u8>::none().is_none());
        assert!(Effect::<u8>::merge([]).is_none());
        assert!(Effect::<u8>::none().map(u16::from).is_none());
    }

    #[test]
    fn concat_preserves_order() {
        let effect = Effect::concat([Effect::send(1), Effect::none(), Effect::send(2)]);
        assert_eq!(collect(effect), vec![1, 2]);
    }

    #[test]
    fn map_lifts_actions() {
        let effect = Effect::send(3).map(|n: i32| n * 10);
        assert_eq!(collect(effect), vec![30]);
    }

    #[test]
    fn fire_and_forget_emits_nothing() {
        let effect = Effect::<u8>::fire_and_forget(async {});
        assert!(!effect.is_none());
        assert!(collect(effect).is_empty());
    }

    #[test]
    fn cancel_stops_further_emissions() {
        let registry = Arc::new(EffectRegistry::new());
        let (tx, rx) = mpsc::unbounded::<i32>();
        let mut stream = Effect::stream(rx)
            .cancellable_in(Token, registry.clone())
            .into_stream()
            .unwrap();

        let mut values = Vec::new();
        assert!(stream.next().now_or_never().is_none());
        assert!(registry.contains(&CancelToken::new(Token)));

        tx.unbounded_send(1).unwrap();
        values.extend(stream.next().now_or_never().flatten());
        tx.unbounded_send(2).unwrap();
        values.extend(stream.next().now_or_never().flatten());
        assert_eq!(values, vec![1, 2]);

        let cancel = Effect::<()>::cancel_in(Token, registry.clone());
        assert!(collect(cancel).is_empty());
        assert!(!registry.contains(&CancelToken::new(Token)));

        tx.unbounded_send(3).unwrap();
        assert_eq!(stream.next().now_or_never(), Some(None));
        assert_eq!(values, vec![1, 2]);
    }

    #[test]
    fn completed_effect_leaves_registry() {
        let registry = Arc::new(EffectRegistry::new());
        let effect = Effect::send(1).cancellable_in(Token, registry.clone());
        assert_eq!(collect(effect), vec![1]);
        assert!(registry.is_empty());

        let cancel = Effect::<()>::cancel_in(Token, registry.clone());
        assert!(collect(cancel).is_empty());
    }

    #[test]
    fn dropping_a_running_effect_unregisters_it() {
        let registry = Arc::new(EffectRegistry::new());
        let (_tx, rx) = mpsc::unbounded::<i32>();
        let mut stream = Effect::stream(rx)
            .cancellable_in(Token, registry.clone())
            .into_stream()
            .unwrap();
        assert!(stream.next().now_or_never().is_none());
        assert!(!registry.is_empty());

        drop(stream);
        assert!(registry.is_empty());
    }

    #[test]
    fn unsubscribed_cancellable_does_not_register() {
        let registry = Arc::new(EffectRegistry::new());
        let _effect = Effect::send(1).cancellable_in(Token, registry.clone());
        assert!(registry.is_empty());
    }
}
