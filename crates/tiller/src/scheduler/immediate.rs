use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::future::{self, BoxFuture, FutureExt};
use futures::task::{waker_ref, ArcWake};
use parking_lot::Mutex;

use super::Scheduler;

/// Runs tasks inline, on the thread that spawns or wakes them.
///
/// Delays collapse to zero: [`Scheduler::sleep`] completes on first poll.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImmediateScheduler;

impl Scheduler for ImmediateScheduler {
    fn spawn(&self, task: BoxFuture<'static, ()>) {
        let task = Arc::new(InlineTask {
            future: Mutex::new(Some(task)),
            notified: AtomicBool::new(false),
        });
        task.run();
    }

    fn sleep(&self, _duration: Duration) -> BoxFuture<'static, ()> {
        future::ready(()).boxed()
    }
}

struct InlineTask {
    future: Mutex<Option<BoxFuture<'static, ()>>>,
    notified: AtomicBool,
}

impl InlineTask {
    /// Poll until the task stops being notified. Only one thread polls at a
    /// time; a wake that arrives while another thread is polling sets
    /// `notified` and that thread picks it up.
    fn run(self: &Arc<Self>) {
        self.notified.store(true, Ordering::Release);
        loop {
            let Some(mut slot) = self.future.try_lock() else {
                return;
            };
            while self.notified.swap(false, Ordering::AcqRel) {
                let Some(future) = slot.as_mut() else {
                    return;
                };
                let waker = waker_ref(self);
                let mut cx = Context::from_waker(&waker);
                if let Poll::Ready(()) = future.poll_unpin(&mut cx) {
                    *slot = None;
                    return;
                }
            }
            drop(slot);
            if !self.notified.load(Ordering::Acquire) {
                return;
            }
        }
    }
}

impl ArcWake for InlineTask {
    fn wake_by_ref(arc_self: &Arc<Self>) {
        arc_self.run();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::channel::oneshot;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn ready_task_runs_during_spawn() {
        let ran = Arc::new(AtomicUsize::new(0));
        let counter = ran.clone();
        ImmediateScheduler.spawn(
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
            .boxed(),
        );
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn pending_task_resumes_on_the_waking_thread() {
        let (tx, rx) = oneshot::channel::<u32>();
        let seen = Arc::new(Mutex::new(None));
        let slot = seen.clone();
        ImmediateScheduler.spawn(
            async move {
                *slot.lock() = rx.await.ok();
            }
            .boxed(),
        );
        assert_eq!(*seen.lock(), None);

        tx.send(7).unwrap();
        assert_eq!(*seen.lock(), Some(7));
    }

    #[test]
    fn sleep_completes_immediately() {
        assert!(ImmediateScheduler
            .sleep(Duration::from_secs(60))
            .now_or_never()
            .is_some());
    }
}
