use std::{sync::Arc, time::Duration};

use crate::{
    error::{Error, Result},
    pipeline::Pipeline,
    scheduler::BackgroundTask,
    store::RecordStore,
};

/// Periodic promotion: takes the lock and flushes staged records into the
/// read log. Skips the run quietly when another flush holds the lock.
///
/// Store calls are blocking I/O, so each run moves to a blocking thread
/// rather than stalling the async workers.
pub struct FlushTask<S: RecordStore> {
    pipeline: Arc<Pipeline<S>>,
}

impl<S: RecordStore> FlushTask<S> {
    pub fn new(pipeline: Arc<Pipeline<S>>) -> Self {
        Self { pipeline }
    }
}

#[async_trait::async_trait]
impl<S: RecordStore + 'static> BackgroundTask for FlushTask<S> {
    fn name(&self) -> &'static str {
        "flush"
    }

    fn interval(&self) -> Duration {
        self.pipeline.config().flush_interval
    }

    async fn execute(&self) -> Result<()> {
        let pipeline = self.pipeline.clone();
        let report = tokio::task::spawn_blocking(move || {
            let Some(guard) = pipeline.try_lock() else {
                tracing::debug!("Skipping periodic flush, lock is held");
                return Ok(None);
            };
            let report = pipeline.flush();
            guard.release();
            report.map(Some)
        })
        .await
        .map_err(|e| Error::Store(format!("flush task join error: {}", e)))??;

        let Some(report) = report else {
            return Ok(());
        };

        if report.flushed > 0 {
            tracing::info!(
                flushed = report.flushed,
                bootstrap = report.bootstrap,
                "Periodic flush completed"
            );
        }
        Ok(())
    }
}
