//! # Tiller
//!
//! A unidirectional state container: a [`Store`] owns state, a reducer
//! decides how actions change it, and [`Effect`]s carry the follow-up work.
//!
//! ## Core Concepts
//!
//! - **Action** = what happened (a user tap, a response, a timer)
//! - **Reducer** = pure `(state, action, env) -> Effect`
//! - **Effect** = lazy, cancellable stream of further actions
//!
//! The key principle: **state only changes inside the reducer**, one action
//! at a time, in the order actions were sent.
//!
//! ## Architecture
//!
//! ```text
//! send(action)
//!     │
//!     ▼
//! queue (FIFO) ◄───────────────────────────────────┐
//!     │                                            │
//!     ▼ drain loop (one thread at a time)          │
//! reducer(&mut state, action, &env) ─► Effect      │
//!     │                                  │         │
//!     │                      launch: sync prefix ──┤
//!     │                                  │         │
//!     │                      Scheduler: the rest ──┘
//!     ▼
//! commit (once per drain, only if changed)
//!     │
//!     ├─► observers   observe(projection, on_change)
//!     └─► children    derive(project, embed, env)
//! ```
//!
//! ## Key Invariants
//!
//! 1. **FIFO** - Actions are reduced in submission order, including those
//!    sent from reducers' effects and observers
//! 2. **No reentrancy** - `send` during processing enqueues; it never recurses
//! 3. **Committed reads** - `state()` never shows a partially drained batch
//! 4. **Batched notification** - Observers fire once per drain, not per action
//! 5. **Exactly-once derivation** - A child sees its own upward send once
//!
//! ## Example
//!
//! ```ignore
//! use tiller_core::{Effect, Store};
//!
//! #[derive(Debug, Clone, PartialEq, Default)]
//! struct Counter { number: i32, name: String }
//!
//! #[derive(Debug)]
//! enum Action { Add, Chain }
//!
//! fn reducer(state: &mut Counter, action: Action, _: &()) -> Effect<Action> {
//!     match action {
//!         Action::Add => {
//!             state.number += 1;
//!             Effect::none()
//!         }
//!         Action::Chain => {
//!             state.name = "custom name".into();
//!             Effect::send(Action::Add)
//!         }
//!     }
//! }
//!
//! let store = Store::new(Counter::default(), reducer, ());
//! let _subscription = store.observe(|s| s.number, |n| println!("number = {n}"));
//! store.send(Action::Chain);
//! assert_eq!(store.state().number, 1);
//! ```
//!
//! Open collections ([`OpenArray`], [`NavigationalArray`]) are plain state
//! types for tab- and history-style UIs; they are meant to live inside a
//! store's state.

// Core modules
mod cancel;
mod debug;
mod effect;
mod error;
mod observable;
mod registry;
mod runtime;
mod store;

pub mod collection;
pub mod scheduler;



// Serde round-trip tests (test-only)
#[cfg(test)]
mod serde_tests;

// Re-export store types
pub use store::{Binding, Reducer, Store, StoreBuilder};

// Re-export effect types
pub use effect::Effect;
pub use observable::Subscription;

// Re-export cancellation types
pub use cancel::CancelToken;
pub use registry::{EffectId, EffectRegistry};

// Re-export runtime types (shared with test stores)
pub use runtime::{launch, EffectHandles, Launch};

// Re-export scheduler types
pub use scheduler::{ImmediateScheduler, Scheduler, TestScheduler, TokioScheduler};

// Re-export collection types
pub use collection::{
    Identifiable, ItemId, NavigationalArray, OpenArray, OpenCollection, Specifier,
};

// Re-export debug types
pub use debug::{diff, DebugOptions};

// Re-export error types
pub use error::SchedulerError;
