//! Periodic removal of expired cache entries.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::cache::ResponseCache;

/// Handle to a background task that sweeps a cache on a fixed interval.
///
/// The task stops when [`stop`](Self::stop) is awaited or the handle is
/// dropped.
#[derive(Debug)]
pub struct CacheSweeper {
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl CacheSweeper {
    /// Starts sweeping `cache` every `interval`. The first sweep runs one
    /// full interval after spawning.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(cache: Arc<ResponseCache>, interval: Duration) -> Self {
        let interval = interval.max(Duration::from_millis(1));
        let (shutdown, mut stop) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let removed = cache.sweep_expired();
                        if removed > 0 {
                            debug!(removed, remaining = cache.len(), "Swept expired cache entries");
                        }
                    }
                    _ = &mut stop => break,
                }
            }
            info!("Cache sweeper stopped");
        });

        info!(interval_ms = interval.as_millis() as u64, "Cache sweeper started");
        Self {
            shutdown: Some(shutdown),
            task: Some(task),
        }
    }

    /// Returns true while the background task is alive.
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Signals the task and waits for it to finish.
    pub async fn stop(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for CacheSweeper {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}
