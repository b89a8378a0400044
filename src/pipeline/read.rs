use crate::config::PipelineConfig;
use crate::error::Result;
use crate::keyspace::Keyspace;
use crate::record::Record;
use crate::store::RecordStore;

use serde::Serialize;
use std::sync::Arc;

/// One cursor-mode page of the read log.
#[derive(Debug, Clone, Serialize)]
pub struct CursorPage {
    pub records: Vec<Record>,
    /// Offset to pass for the next page. Advances past every raw entry the
    /// page consumed, including ones dropped as undecodable, so paging
    /// always terminates.
    pub next_cursor: usize,
    /// Raw stored length of the read log at query time.
    pub total: usize,
}

/// One batch-index-mode slice of the read log.
#[derive(Debug, Clone, Serialize)]
pub struct Batch {
    /// 1-based batch index as requested
    pub idx: usize,
    /// Number of records returned for this batch
    pub count: usize,
    pub records: Vec<Record>,
}

pub(super) fn cursor<S: RecordStore>(
    store: &Arc<S>,
    keys: &Keyspace,
    config: &PipelineConfig,
    offset: usize,
    limit: usize,
) -> Result<CursorPage> {
    let limit = limit.min(config.max_page_size);
    let total = store.length(&keys.read_log)?;
    let raws = store.range(&keys.read_log, offset, offset.saturating_add(limit))?;
    let consumed = raws.len();

    Ok(CursorPage {
        records: parse_entries(raws),
        next_cursor: offset + consumed,
        total,
    })
}

/// Batch-index slices over the read log. The batch size is clamped into
/// `1..=max_batch_size`; in particular a requested size of 0 reads as 1.
pub(super) fn batches<S: RecordStore>(
    store: &Arc<S>,
    keys: &Keyspace,
    config: &PipelineConfig,
    indices: &[usize],
    batch_size: usize,
) -> Result<(Vec<Batch>, usize)> {
    let batch_size = batch_size.min(config.max_batch_size).max(1);
    let total = store.length(&keys.read_log)?;

    let mut out = Vec::with_capacity(indices.len());
    for &idx in indices {
        // Indices are 1-based; 0, anything past the end, and offsets too
        // large to even compute all read as empty, never as an error.
        let start = idx.checked_sub(1).and_then(|i| i.checked_mul(batch_size));
        let records = match start {
            None => Vec::new(),
            Some(start) => {
                let raws =
                    store.range(&keys.read_log, start, start.saturating_add(batch_size))?;
                parse_entries(raws)
            }
        };
        out.push(Batch {
            idx,
            count: records.len(),
            records,
        });
    }

    Ok((out, total))
}

/// Decode stored entries, silently dropping ones that fail to parse. The
/// raw total reported alongside still counts dropped entries.
fn parse_entries(raws: Vec<String>) -> Vec<Record> {
    raws.iter()
        .filter_map(|raw| match Record::from_json(raw) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::debug!(error = %e, "Dropping undecodable read-log entry");
                None
            }
        })
        .collect()
}
