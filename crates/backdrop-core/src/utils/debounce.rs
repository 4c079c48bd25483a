//! Timer debounce utility.
//!
//! Collapses bursts of calls (slider drags, rapid toggles) into a single
//! deferred callback. Each call replaces the pending one; a callback that
//! has already started is left to finish.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;

struct Scheduled {
    handle: JoinHandle<()>,
    started: Arc<AtomicBool>,
}

impl Scheduled {
    /// Abort only while still waiting out the delay.
    fn cancel(self) {
        if !self.started.load(Ordering::SeqCst) {
            self.handle.abort();
        }
    }
}

/// Runs the most recently scheduled callback once `delay` has passed
/// without another call.
pub struct Debouncer {
    delay: Duration,
    pending: Mutex<Option<Scheduled>>,
}

impl Debouncer {
    /// Create a debouncer with the given quiet period.
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: Mutex::new(None),
        }
    }

    /// Schedule `callback`, cancelling whatever is still waiting.
    ///
    /// Must be called from within a tokio runtime.
    pub fn call<F, Fut>(&self, callback: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let delay = self.delay;
        let started = Arc::new(AtomicBool::new(false));
        let flag = started.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            flag.store(true, Ordering::SeqCst);
            callback().await;
        });

        if let Ok(mut pending) = self.pending.lock() {
            if let Some(previous) = pending.replace(Scheduled { handle, started }) {
                previous.cancel();
            }
        }
    }

    /// Drop the waiting callback, if any.
    pub fn cancel(&self) {
        if let Ok(mut pending) = self.pending.lock() {
            if let Some(previous) = pending.take() {
                previous.cancel();
            }
        }
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}
