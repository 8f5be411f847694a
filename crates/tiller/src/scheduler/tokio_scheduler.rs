use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use super::Scheduler;
use crate::error::SchedulerError;

/// Runs effects on a tokio runtime.
///
/// Timers are tokio timers, so tests can drive them with
/// `#[tokio::test(start_paused = true)]` and `tokio::time::advance`.
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    handle: Handle,
}

impl TokioScheduler {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Scheduler for the runtime the caller is running on.
    pub fn current() -> Result<Self, SchedulerError> {
        let handle = Handle::try_current().map_err(|_| SchedulerError::NoRuntime)?;
        Ok(Self::new(handle))
    }

    pub fn handle(&self) -> &Handle {
        &self.handle
    }
}

impl Scheduler for TokioScheduler {
    fn spawn(&self, task: BoxFuture<'static, ()>) {
        self.handle.spawn(task);
    }

    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()> {
        // The timer lives inside the runtime so the returned future can be
        // polled from any thread, including the store's caller.
        let deadline = tokio::time::Instant::now() + duration;
        let timer = self.handle.spawn(async move {
            tokio::time::sleep_until(deadline).await;
        });
        TokioSleep {
            timer,
            failed: false,
        }
        .boxed()
    }
}

/// Awaits a timer task. Dropping it aborts the task; a timer that dies
/// without firing (runtime shutdown) never completes.
struct TokioSleep {
    timer: JoinHandle<()>,
    failed: bool,
}

impl Future for TokioSleep {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.failed {
            return Poll::Pending;
        }
        match self.timer.poll_unpin(cx) {
            Poll::Ready(Ok(())) => Poll::Ready(()),
            Poll::Ready(Err(error)) => {
                tracing::debug!(%error, "timer task ended before its deadline");
                self.failed = true;
                Poll::Pending
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for TokioSleep {
    fn drop(&mut self) {
        self.timer.abort();
    }
}
