//! TTL Sweeper Task
//!
//! Background task that periodically removes expired cache entries.

use std::future::Future;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Handle to a running sweeper.
///
/// Dropping the handle also stops the task, since the shutdown sender goes
/// away with it.
#[derive(Debug)]
pub struct SweeperHandle {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    /// Signals the task to stop and waits until it has finished.
    pub async fn shutdown(self) {
        // The receiver is gone only if the task already ended
        let _ = self.shutdown.send(());

        if let Err(err) = self.task.await {
            warn!("TTL sweeper task ended abnormally: {}", err);
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Spawns a background task that runs `sweep` every `interval`.
///
/// The first sweep happens one full interval after spawning. `sweep`
/// resolves to the number of entries it removed. Must be called from
/// within a tokio runtime.
///
/// # Example
/// ```ignore
/// let store = Arc::new(CacheStore::<String>::new());
/// let sweeper = spawn_sweeper(Duration::from_secs(1), move || {
///     let store = Arc::clone(&store);
///     async move { store.sweep_expired().await }
/// });
/// // Later, during shutdown:
/// sweeper.shutdown().await;
/// ```
pub fn spawn_sweeper<F, Fut>(interval: Duration, mut sweep: F) -> SweeperHandle
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = usize> + Send + 'static,
{
    let (shutdown, mut shutdown_rx) = oneshot::channel::<()>();

    let task = tokio::spawn(async move {
        info!("Starting TTL sweeper with interval of {:?}", interval);

        let mut ticker = interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let removed = sweep().await;

                    if removed > 0 {
                        info!("TTL sweep: removed {} expired entries", removed);
                    } else {
                        debug!("TTL sweep: no expired entries found");
                    }
                }
                // Fires on an explicit shutdown or when the sender is dropped
                _ = &mut shutdown_rx => break,
            }
        }

        info!("TTL sweeper stopped");
    });

    SweeperHandle { shutdown, task }
}
