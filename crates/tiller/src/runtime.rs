//! Effect execution shared by [`Store`](crate::Store) and test stores.
//!
//! [`launch`] subscribes to an effect: it drains whatever the effect can
//! produce synchronously, and hands the remainder to a [`Scheduler`] while
//! tracking it in [`EffectHandles`].
//!
//! A launched effect's stream sits behind a lock shared by the scheduler's
//! task and the store. Whichever side sees a wake first drives it, so an
//! effect ended by [`Effect::cancel`](crate::Effect::cancel) is settled
//! inside the `send` that cancelled it instead of whenever the scheduler
//! next polls.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

use futures::future::{self, AbortHandle, Abortable, FutureExt};
use futures::stream::{BoxStream, StreamExt};
use futures::task::{waker_ref, ArcWake};
use parking_lot::Mutex;

use crate::effect::Effect;
use crate::registry::EffectId;
use crate::scheduler::Scheduler;

struct Tracked {
    abort: AbortHandle,
    task: Arc<dyn Drive>,
}

/// In-flight effects owned by one store, keyed by instance id.
#[derive(Clone, Default)]
pub struct EffectHandles {
    handles: Arc<Mutex<HashMap<EffectId, Tracked>>>,
}

impl EffectHandles {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&self, id: EffectId, tracked: Tracked) {
        self.handles.lock().insert(id, tracked);
    }

    fn remove(&self, id: EffectId) {
        self.handles.lock().remove(&id);
    }

    /// Drive every tracked effect that was woken since it was last polled,
    /// and drop the ones that finish. Returns how many finished.
    ///
    /// Actions emitted along the way go to the effect's sink, as they would
    /// from the scheduler.
    pub fn settle(&self) -> usize {
        let woken: Vec<(EffectId, Arc<dyn Drive>)> = self
            .handles
            .lock()
            .iter()
            .filter(|(_, tracked)| tracked.task.woken())
            .map(|(id, tracked)| (*id, tracked.task.clone()))
            .collect();

        let mut finished = 0;
        for (id, task) in woken {
            if task.drive().is_ready() {
                self.remove(id);
                finished += 1;
            }
        }
        if finished > 0 {
            tracing::trace!(finished, "settled effects");
        }
        finished
    }

    /// Effects that are still running and have not been cancelled.
    ///
    /// Settles woken effects first, so an effect cancelled through the
    /// registry stops counting without waiting for its scheduler.
    pub fn active(&self) -> usize {
        self.settle();
        self.tracked()
    }

    /// Like [`active`](Self::active), without driving anything.
    pub(crate) fn tracked(&self) -> usize {
        self.handles
            .lock()
            .values()
            .filter(|tracked| !tracked.abort.is_aborted())
            .count()
    }

    /// Abort every tracked effect. Returns how many were still active.
    pub fn abort_all(&self) -> usize {
        let handles: Vec<AbortHandle> = self
            .handles
            .lock()
            .drain()
            .map(|(_, tracked)| tracked.abort)
            .collect();
        let active = handles.iter().filter(|handle| !handle.is_aborted()).count();
        for handle in handles {
            handle.abort();
        }
        active
    }
}

/// What happened when an effect was launched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Launch {
    /// `Effect::none()`; nothing was subscribed.
    Skipped,
    /// The effect finished during the synchronous drain.
    Completed,
    /// The effect is still running on the scheduler.
    Running(EffectId),
}

/// Subscribe to `effect`, delivering every emitted action to `sink`.
///
/// Actions the effect can produce without waiting are delivered before this
/// returns. If the effect is still pending afterwards it is spawned on
/// `scheduler` and tracked in `handles` until it completes or is aborted.
/// Any tracked effect this launch woke (a cancellation, typically) is
/// settled before returning.
pub fn launch<A, F>(
    effect: Effect<A>,
    scheduler: &dyn Scheduler,
    handles: &EffectHandles,
    sink: F,
) -> Launch
where
    A: Send + 'static,
    F: Fn(A) + Send + Sync + 'static,
{
    let Some(stream) = effect.into_stream() else {
        return Launch::Skipped;
    };
    let (abort, registration) = AbortHandle::new_pair();
    let running = Arc::new(Running {
        stream: Mutex::new(Some(Abortable::new(stream, registration))),
        sink,
        signal: Arc::new(Signal::default()),
    });

    let launched = if running.drive().is_ready() {
        Launch::Completed
    } else {
        let id = EffectId::new();
        handles.insert(
            id,
            Tracked {
                abort,
                task: running.clone(),
            },
        );
        tracing::trace!(effect = %id, "effect running on scheduler");

        let tracked = handles.clone();
        scheduler.spawn(
            async move {
                future::poll_fn(|cx| {
                    running.signal.register(cx.waker());
                    running.drive()
                })
                .await;
                tracked.remove(id);
            }
            .boxed(),
        );
        Launch::Running(id)
    };
    handles.settle();
    launched
}

/// Type-erased view of a launched effect.
trait Drive: Send + Sync {
    fn woken(&self) -> bool;

    /// Poll until pending or done. `Pending` also when another thread is
    /// already driving; that thread picks up any wake it misses.
    fn drive(&self) -> Poll<()>;
}

struct Running<A, F> {
    stream: Mutex<Option<Abortable<BoxStream<'static, A>>>>,
    sink: F,
    signal: Arc<Signal>,
}

impl<A, F> Drive for Running<A, F>
where
    A: Send + 'static,
    F: Fn(A) + Send + Sync + 'static,
{
    fn woken(&self) -> bool {
        self.signal.woken.load(Ordering::Acquire)
    }

    fn drive(&self) -> Poll<()> {
        loop {
            let Some(mut slot) = self.stream.try_lock() else {
                return Poll::Pending;
            };
            let Some(stream) = slot.as_mut() else {
                return Poll::Ready(());
            };
            self.signal.woken.store(false, Ordering::Release);
            let waker = waker_ref(&self.signal);
            let mut cx = Context::from_waker(&waker);
            loop {
                match stream.poll_next_unpin(&mut cx) {
                    Poll::Ready(Some(action)) => (self.sink)(action),
                    Poll::Ready(None) => {
                        *slot = None;
                        return Poll::Ready(());
                    }
                    Poll::Pending => break,
                }
            }
            drop(slot);
            if !self.woken() {
                return Poll::Pending;
            }
        }
    }
}

/// Waker handed to the effect's futures. Records the wake, then forwards it
/// to the scheduler's task once that task has been polled.
#[derive(Default)]
struct Signal {
    woken: AtomicBool,
    task: Mutex<Option<Waker>>,
}

impl Signal {
    fn register(&self, waker: &Waker) {
        let mut task = self.task.lock();
        if !task.as_ref().is_some_and(|current| current.will_wake(waker)) {
            *task = Some(waker.clone());
        }
    }
}

impl ArcWake for Signal {
    fn wake_by_ref(arc_self: &Arc<Self>) {
        arc_self.woken.store(true, Ordering::Release);
        let task = arc_self.task.lock().clone();
        if let Some(task) = task {
            task.wake();
        }
    }
}
