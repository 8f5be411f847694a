//! Schedulers decide where effects run and how time passes for them.
//!
//! A store hands every effect that does not finish synchronously to its
//! scheduler. Delayed effects ask the scheduler for a timer, so swapping the
//! scheduler swaps the clock:
//!
//! - [`ImmediateScheduler`] (default): runs tasks inline on whichever thread
//!   spawns or wakes them; delays complete immediately.
//! - [`TokioScheduler`]: runs tasks on a tokio runtime with tokio timers.
//! - [`TestScheduler`]: virtual time that only moves when a test advances it.

mod immediate;
mod tokio_scheduler;
mod virtual_time;

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;

pub use immediate::ImmediateScheduler;
pub use tokio_scheduler::TokioScheduler;
pub use virtual_time::TestScheduler;

/// Executor and clock for effects.
pub trait Scheduler: Send + Sync + 'static {
    /// Start driving `task` to completion.
    ///
    /// Implementations must poll a newly spawned task at least once, even if
    /// it was already polled by the caller.
    fn spawn(&self, task: BoxFuture<'static, ()>);

    /// A future that completes once `duration` has elapsed on this
    /// scheduler's clock, measured from this call.
    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()>;
}

impl<T: Scheduler + ?Sized> Scheduler for Arc<T> {
    fn spawn(&self, task: BoxFuture<'static, ()>) {
        (**self).spawn(task)
    }

    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()> {
        (**self).sleep(duration)
    }
}
