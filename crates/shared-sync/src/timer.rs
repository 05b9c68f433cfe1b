//! Cancellable timer handles.
//!
//! Each periodic or delayed task is owned by exactly one handle. Replacing
//! the handle (or dropping it) cancels the task, so "re-arm" is a plain
//! assignment.

use std::future::Future;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

#[derive(Debug)]
pub struct TimerHandle {
    task: JoinHandle<()>,
}

impl TimerHandle {
    /// Run `fut` once after `delay`.
    pub fn after<F>(runtime: &Handle, delay: Duration, fut: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let task = runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            fut.await;
        });
        Self { task }
    }

    /// Run `make()` every `period`, first after one full period.
    ///
    /// Each run is awaited before the next tick is considered, so a slow run
    /// delays the schedule instead of overlapping with the next one.
    pub fn every<F, Fut>(runtime: &Handle, period: Duration, mut make: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let task = runtime.spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                make().await;
            }
        });
        Self { task }
    }

    /// Cancel the task. A run already past its last await point completes.
    pub fn cancel(&self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
