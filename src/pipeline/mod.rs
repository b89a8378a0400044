mod flush;
mod read;
mod reset;

pub use flush::FlushReport;
pub use read::{Batch, CursorPage};

use crate::config::PipelineConfig;
use crate::error::{Error, Result};
use crate::keyspace::Keyspace;
use crate::lock::PromotionLock;
use crate::record::Record;
use crate::store::{RecordStore, SetAdd};

use serde::Serialize;
use std::sync::Arc;

/// Counts reported back to a submitter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Submitted {
    /// Records appended to the staging queue
    pub accepted: usize,
    /// Records dropped as duplicates (already staged or already confirmed)
    pub skipped: usize,
    /// Staging queue depth after this submission
    pub total_staged: usize,
}

/// The ingestion pipeline: staging queue, promotion engine, read log and
/// daily reset, all coordinated through a shared [`RecordStore`].
///
/// Handlers may run fully in parallel; every piece of coordination state
/// lives in the store, never in process memory.
pub struct Pipeline<S: RecordStore> {
    store: Arc<S>,
    config: PipelineConfig,
    keys: Keyspace,
}

impl<S: RecordStore> Pipeline<S> {
    pub fn new(store: Arc<S>, config: PipelineConfig) -> Self {
        let keys = Keyspace::new(&config.namespace);
        Self {
            store,
            config,
            keys,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn keys(&self) -> &Keyspace {
        &self.keys
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Stage a batch of submitted records, deduplicating identified ones
    /// against both the read log and the staging queue.
    ///
    /// The double dedupe — read-seen here plus read-seen again during
    /// promotion — is deliberate belt-and-suspenders against submissions
    /// racing a flush.
    pub fn submit(&self, records: Vec<Record>) -> Result<Submitted> {
        self.reset_if_due()?;

        if records.is_empty() {
            return Err(Error::Validation("no records submitted".to_string()));
        }

        let mut accepted = 0;
        let mut skipped = 0;

        for record in records {
            match record.id() {
                // Unidentified records are never deduplicated.
                None => {
                    self.store.append(&self.keys.staging, &record.to_json())?;
                    accepted += 1;
                }
                Some(id) => {
                    if self.store.set_contains(&self.keys.read_seen, &id)? {
                        tracing::debug!(id = %id, "Skipping record already confirmed");
                        skipped += 1;
                        continue;
                    }
                    // Atomic test-and-set is what makes concurrent duplicate
                    // submissions safe without a submission-side lock.
                    match self.store.set_add(&self.keys.staging_seen, &id)? {
                        SetAdd::Already => {
                            tracing::debug!(id = %id, "Skipping record already staged");
                            skipped += 1;
                        }
                        SetAdd::Newly => {
                            self.store.append(&self.keys.staging, &record.to_json())?;
                            accepted += 1;
                        }
                    }
                }
            }
        }

        let total_staged = self.store.length(&self.keys.staging)?;
        Ok(Submitted {
            accepted,
            skipped,
            total_staged,
        })
    }

    /// Try to take the promotion lock. `None` means another flush holds it.
    pub fn try_lock(&self) -> Option<PromotionLock<S>> {
        PromotionLock::acquire(self.store.clone(), &self.keys.lock, self.config.lock_ttl)
    }

    /// Promote staged records into the read log. The caller must hold the
    /// promotion lock; see [`Pipeline::try_lock`].
    pub fn flush(&self) -> Result<FlushReport> {
        flush::flush(&self.store, &self.keys, &self.config)
    }

    /// Cursor-mode read over the read log.
    pub fn read(&self, offset: usize, limit: usize) -> Result<CursorPage> {
        self.reset_if_due()?;
        read::cursor(&self.store, &self.keys, &self.config, offset, limit)
    }

    /// Batch-index-mode read over the read log. Returns the batches plus the
    /// raw read-log length. `batch_size` is clamped into
    /// `1..=max_batch_size`, so a requested size of 0 reads as 1.
    pub fn read_batches(&self, indices: &[usize], batch_size: usize) -> Result<(Vec<Batch>, usize)> {
        self.reset_if_due()?;
        read::batches(&self.store, &self.keys, &self.config, indices, batch_size)
    }

    /// Run the daily reset if the UTC calendar date has rolled over since
    /// the last one. Called on every submission and read.
    pub fn reset_if_due(&self) -> Result<()> {
        reset::reset_if_due(&self.store, &self.keys, &self.config)
    }
}
