use std::collections::{BTreeMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::task::{Context, Poll, Waker};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt};
use futures::task::{waker_ref, ArcWake};
use parking_lot::Mutex;

use super::Scheduler;

/// Deterministic scheduler with a virtual clock.
///
/// Nothing runs on its own: spawned and woken tasks wait in a ready queue
/// until the test calls [`advance`](Self::advance),
/// [`advance_by`](Self::advance_by) or [`run`](Self::run). Timers fire only
/// when virtual time is moved past their deadline.
///
/// ```ignore
/// let scheduler = TestScheduler::new();
/// store.send(Action::DelayedIncrement);
/// scheduler.advance_by(Duration::from_secs(5));
/// assert_eq!(store.state(), 1);
/// ```
#[derive(Clone, Default)]
pub struct TestScheduler {
    clock: Arc<Mutex<Clock>>,
}

#[derive(Default)]
struct Clock {
    now: Duration,
    ready: VecDeque<Arc<Task>>,
    timers: BTreeMap<u64, Timer>,
    next_timer: u64,
}

struct Timer {
    deadline: Duration,
    waker: Option<Waker>,
}

impl TestScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Virtual time elapsed since the scheduler was created.
    pub fn now(&self) -> Duration {
        self.clock.lock().now
    }

    /// Run every ready task, and fire timers that are already due, without
    /// moving the clock.
    pub fn advance(&self) {
        self.advance_by(Duration::ZERO);
    }

    /// Move the clock forward by `duration`, firing timers in deadline order
    /// and running the tasks they wake at each step.
    pub fn advance_by(&self, duration: Duration) {
        let target = self.now() + duration;
        loop {
            self.run_ready();
            let due = {
                let mut clock = self.clock.lock();
                let Some(next) = clock
                    .timers
                    .values()
                    .map(|timer| timer.deadline)
                    .filter(|deadline| *deadline <= target)
                    .min()
                else {
                    break;
                };
                clock.now = clock.now.max(next);
                clock.take_due()
            };
            for waker in due {
                waker.wake();
            }
        }
        self.clock.lock().now = target;
        self.run_ready();
    }

    /// Advance until no timers remain and no task is ready.
    pub fn run(&self) {
        loop {
            self.run_ready();
            let next = {
                let clock = self.clock.lock();
                clock
                    .timers
                    .values()
                    .map(|timer| timer.deadline)
                    .min()
                    .map(|deadline| deadline.saturating_sub(clock.now))
            };
            match next {
                Some(remaining) => self.advance_by(remaining),
                None => break,
            }
        }
    }

    /// Number of timers that have not fired yet.
    pub fn pending_timers(&self) -> usize {
        self.clock.lock().timers.len()
    }

    fn run_ready(&self) {
        loop {
            let task = self.clock.lock().ready.pop_front();
            let Some(task) = task else {
                break;
            };
            task.poll();
        }
    }
}

impl Clock {
    fn take_due(&mut self) -> Vec<Waker> {
        let now = self.now;
        let due: Vec<u64> = self
            .timers
            .iter()
            .filter(|(_, timer)| timer.deadline <= now)
            .map(|(id, _)| *id)
            .collect();
        due.into_iter()
            .filter_map(|id| self.timers.remove(&id))
            .filter_map(|timer| timer.waker)
            .collect()
    }
}

impl Scheduler for TestScheduler {
    fn spawn(&self, task: BoxFuture<'static, ()>) {
        let task = Arc::new(Task {
            future: Mutex::new(Some(task)),
            clock: Arc::downgrade(&self.clock),
            queued: AtomicBool::new(true),
        });
        self.clock.lock().ready.push_back(task);
    }

    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()> {
        let mut clock = self.clock.lock();
        let id = clock.next_timer;
        clock.next_timer += 1;
        let deadline = clock.now + duration;
        clock.timers.insert(
            id,
            Timer {
                deadline,
                waker: None,
            },
        );
        VirtualSleep {
            id,
            deadline,
            clock: Arc::downgrade(&self.clock),
        }
        .boxed()
    }
}

struct Task {
    future: Mutex<Option<BoxFuture<'static, ()>>>,
    clock: Weak<Mutex<Clock>>,
    queued: AtomicBool,
}

impl Task {
    fn poll(self: &Arc<Self>) {
        self.queued.store(false, Ordering::Release);
        let mut slot = self.future.lock();
        let Some(future) = slot.as_mut() else {
            return;
        };
        let waker = waker_ref(self);
        let mut cx = Context::from_waker(&waker);
        if future.poll_unpin(&mut cx).is_ready() {
            *slot = None;
        }
    }
}

impl ArcWake for Task {
    fn wake_by_ref(arc_self: &Arc<Self>) {
        if arc_self.queued.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(clock) = arc_self.clock.upgrade() {
            clock.lock().ready.push_back(arc_self.clone());
        }
    }
}

struct VirtualSleep {
    id: u64,
    deadline: Duration,
    clock: Weak<Mutex<Clock>>,
}

impl Future for VirtualSleep {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        let Some(clock) = self.clock.upgrade() else {
            return Poll::Pending;
        };
        let mut clock = clock.lock();
        if clock.now >= self.deadline {
            clock.timers.remove(&self.id);
            return Poll::Ready(());
        }
        if let Some(timer) = clock.timers.get_mut(&self.id) {
            timer.waker = Some(cx.waker().clone());
        }
        Poll::Pending
    }
}

impl Drop for VirtualSleep {
    fn drop(&mut self) {
        if let Some(clock) = self.clock.upgrade() {
            clock.lock().timers.remove(&self.id);
        }
    }
}
