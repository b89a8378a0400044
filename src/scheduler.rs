use crate::error::Result;

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// A task the scheduler runs on a fixed interval.
#[async_trait::async_trait]
pub trait BackgroundTask: Send + Sync {
    /// Task name for logging
    fn name(&self) -> &'static str;

    /// How often to run this task
    fn interval(&self) -> Duration;

    /// Execute one run of the task
    async fn execute(&self) -> Result<()>;
}

/// Runs registered background tasks on their intervals until shut down.
///
/// A failing run is logged and does not stop the task's timer loop.
pub struct Scheduler {
    handles: Mutex<Vec<JoinHandle<()>>>,
    shutdown_tx: broadcast::Sender<()>,
}

impl Scheduler {
    pub fn new() -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            handles: Mutex::new(Vec::new()),
            shutdown_tx,
        }
    }

    /// Register a periodic background task
    pub fn register<T: BackgroundTask + 'static>(&self, task: Arc<T>) -> &Self {
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(task.interval());

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = task.execute().await {
                            tracing::error!(task = task.name(), error = %e, "Task execution failed");
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        tracing::info!(task = task.name(), "Task shutting down");
                        break;
                    }
                }
            }
        });

        self.handles.lock().unwrap().push(handle);
        self
    }

    /// Graceful shutdown - wait for all tasks
    pub async fn shutdown(self) -> Result<()> {
        self.shutdown_tx.send(()).ok();

        let handles: Vec<_> = self.handles.lock().unwrap().drain(..).collect();
        for handle in handles {
            handle
                .await
                .map_err(|e| crate::Error::Store(format!("task join error: {}", e)))?;
        }

        Ok(())
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}
