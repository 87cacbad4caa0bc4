use std::time::Duration;

use tokio::runtime::Handle;
use tokio::time::{interval_at, sleep, Instant, MissedTickBehavior};

/// Cancels the scheduled work when `cancel` is called or the handle is dropped.
pub struct TaskHandle {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl TaskHandle {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn cancel(mut self) {
        self.run_cancel();
    }

    fn run_cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for TaskHandle {
    fn drop(&mut self) {
        self.run_cancel();
    }
}

impl std::fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskHandle")
            .field("armed", &self.cancel.is_some())
            .finish()
    }
}

/// Source of the once-per-second tick and the delayed question advance.
pub trait Scheduler: Send + Sync {
    /// Runs `task` every `period`, first after one full period.
    fn every(&self, period: Duration, task: Box<dyn FnMut() + Send>) -> TaskHandle;

    fn after(&self, delay: Duration, task: Box<dyn FnOnce() + Send>) -> TaskHandle;
}

#[derive(Debug, Clone)]
pub struct TokioScheduler {
    runtime: Handle,
}

impl TokioScheduler {
    pub fn new(runtime: Handle) -> Self {
        Self { runtime }
    }

    /// Panics outside a tokio runtime.
    pub fn current() -> Self {
        Self::new(Handle::current())
    }
}

impl Scheduler for TokioScheduler {
    fn every(&self, period: Duration, mut task: Box<dyn FnMut() + Send>) -> TaskHandle {
        let join = self.runtime.spawn(async move {
            let mut interval = interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                task();
            }
        });
        TaskHandle::new(move || join.abort())
    }

    fn after(&self, delay: Duration, task: Box<dyn FnOnce() + Send>) -> TaskHandle {
        let join = self.runtime.spawn(async move {
            sleep(delay).await;
            task();
        });
        TaskHandle::new(move || join.abort())
    }
}
