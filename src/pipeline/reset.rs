use crate::config::{PipelineConfig, ResetPolicy};
use crate::error::Result;
use crate::keyspace::Keyspace;
use crate::store::RecordStore;

use chrono::Utc;
use std::sync::Arc;

/// Clear transient state once per UTC calendar day.
///
/// Runs on every inbound request. Two requests racing across the date
/// boundary may both reset; that is benign because the second pass clears
/// already-empty keys and re-writes the same date stamp.
pub(super) fn reset_if_due<S: RecordStore>(
    store: &Arc<S>,
    keys: &Keyspace,
    config: &PipelineConfig,
) -> Result<()> {
    let today = Utc::now().date_naive().to_string();

    if store.get(&keys.last_reset)?.as_deref() == Some(today.as_str()) {
        return Ok(());
    }

    match config.reset_policy {
        ResetPolicy::StagingOnly => {
            store.delete(&[&keys.staging, &keys.staging_seen])?;
        }
        ResetPolicy::Full => {
            store.delete(&[
                &keys.staging,
                &keys.staging_seen,
                &keys.read_log,
                &keys.read_seen,
            ])?;
        }
    }

    store.put(&keys.last_reset, &today)?;
    tracing::info!(
        date = %today,
        policy = ?config.reset_policy,
        "Daily reset cleared transient state"
    );
    Ok(())
}
