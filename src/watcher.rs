//! Idle-activity watcher: fires a callback once a configured quiet period
//! elapses with no recorded activity.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Watches for inactivity. `update()` records activity; once started, a
/// self-rescheduling half-interval poll invokes the callback exactly once
/// after a full quiet period with no updates, then stops.
///
/// The half-interval granularity bounds idle-detection latency to half the
/// timeout past the true deadline while keeping `update()` a plain store
/// instead of a timer reset.
pub struct ActivityWatcher {
    inner: Arc<WatcherInner>,
    task: Mutex<Option<JoinHandle<()>>>,
}

struct WatcherInner {
    timeout: Duration,
    last_update: Mutex<Instant>,
    on_idle: Box<dyn Fn() + Send + Sync>,
}

impl ActivityWatcher {
    /// Create a watcher; construction counts as the first activity.
    pub fn new(timeout: Duration, on_idle: impl Fn() + Send + Sync + 'static) -> Self {
        Self {
            inner: Arc::new(WatcherInner {
                timeout,
                last_update: Mutex::new(Instant::now()),
                on_idle: Box::new(on_idle),
            }),
            task: Mutex::new(None),
        }
    }

    /// Record activity. Callable at any point, including before `start()`
    /// or after the callback has fired.
    pub fn update(&self) {
        *self.inner.last_update.lock() = Instant::now();
    }

    /// Begin watching. A no-op while a poll is already running.
    pub fn start(&self) {
        let mut task = self.task.lock();
        if task.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }
        let inner = Arc::clone(&self.inner);
        *task = Some(tokio::spawn(async move {
            loop {
                tokio::time::sleep(inner.timeout / 2).await;
                let idle = inner.last_update.lock().elapsed();
                if idle >= inner.timeout {
                    (inner.on_idle)();
                    break;
                }
            }
        }));
    }

    /// Stop watching without firing. Safe to call repeatedly or when the
    /// watcher never started.
    pub fn cancel(&self) {
        if let Some(task) = self.task.lock().take() {
            task.abort();
        }
    }
}

impl Drop for ActivityWatcher {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
#[path = "watcher_tests.rs"]
mod tests;
