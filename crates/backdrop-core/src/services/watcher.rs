//! 定时检查器
//!
//! A single repeating timer that re-evaluates the schedule. `start` always
//! stops the previous timer first, so settings changes never stack timers.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Shortest accepted period.
pub const MIN_PERIOD: Duration = Duration::from_secs(1);

/// 壁纸定时检查器
#[derive(Debug, Default)]
pub struct WallpaperWatcher {
    running: Arc<AtomicBool>,
    generation: AtomicU64,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl WallpaperWatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `tick` every `period`, first after one full period.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start<F, Fut>(&self, period: Duration, tick: F)
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.stop();

        let period = period.max(MIN_PERIOD);
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let running = self.running.clone();
        running.store(true, Ordering::SeqCst);
        let first_tick = Instant::now() + period;

        let handle = tokio::spawn(async move {
            tracing::info!(generation, period_secs = period.as_secs(), "壁纸定时检查已启动");
            let mut interval = tokio::time::interval_at(first_tick, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if !running.load(Ordering::SeqCst) {
                    break;
                }
                tick().await;
            }
            tracing::info!(generation, "壁纸定时检查已退出");
        });

        if let Ok(mut slot) = self.handle.lock() {
            *slot = Some(handle);
        }
    }

    /// Cancel the timer. Calling it again is a no-op.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        if let Ok(mut slot) = self.handle.lock() {
            if let Some(handle) = slot.take() {
                handle.abort();
                tracing::debug!("壁纸定时检查已停止");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl Drop for WallpaperWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}
