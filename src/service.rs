use crate::error::{Error, Result};
use crate::pipeline::{Batch, CursorPage, FlushReport, Pipeline, Submitted};
use crate::record::Record;
use crate::store::RecordStore;

use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

/// Transport-agnostic endpoint layer over a [`Pipeline`].
///
/// Decodes submission bodies, applies the read-query defaults and maxima,
/// and gates the flush trigger behind the configured shared secret. HTTP
/// adapters map [`Error::status`] onto response codes and stay one line
/// thin; routing and method handling live outside this crate.
pub struct Service<S: RecordStore> {
    pipeline: Arc<Pipeline<S>>,
}

/// Query shape of the read endpoint. All fields optional; defaults come
/// from the pipeline config. `batches` switches to batch-index mode.
#[derive(Debug, Clone, Default)]
pub struct ReadQuery {
    pub offset: Option<usize>,
    pub limit: Option<usize>,
    pub batches: Option<Vec<usize>>,
    pub batch_size: Option<usize>,
}

/// Response of the read endpoint, matching the query mode.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum ReadResponse {
    Page(CursorPage),
    Batches { batches: Vec<Batch>, total: usize },
}

impl<S: RecordStore> Service<S> {
    pub fn new(pipeline: Arc<Pipeline<S>>) -> Self {
        Self { pipeline }
    }

    pub fn pipeline(&self) -> &Arc<Pipeline<S>> {
        &self.pipeline
    }

    /// Submission endpoint: decode the JSON body and stage its records.
    pub fn submit(&self, body: &str) -> Result<Submitted> {
        let records = decode_submit_body(body)?;
        self.pipeline.submit(records)
    }

    /// Read endpoint: batch-index mode when `batches` is present, cursor
    /// mode otherwise.
    pub fn read(&self, query: ReadQuery) -> Result<ReadResponse> {
        let config = self.pipeline.config();

        if let Some(indices) = query.batches {
            let batch_size = query.batch_size.unwrap_or(config.default_batch_size);
            let (batches, total) = self.pipeline.read_batches(&indices, batch_size)?;
            return Ok(ReadResponse::Batches { batches, total });
        }

        let offset = query.offset.unwrap_or(0);
        let limit = query.limit.unwrap_or(config.default_page_size);
        Ok(ReadResponse::Page(self.pipeline.read(offset, limit)?))
    }

    /// Flush trigger endpoint: check the shared secret, take the promotion
    /// lock, and run one promotion cycle.
    pub fn trigger_flush(&self, secret: Option<&str>) -> Result<FlushReport> {
        if let Some(expected) = &self.pipeline.config().flush_secret {
            if secret != Some(expected.as_str()) {
                return Err(Error::Auth);
            }
        }

        let guard = self.pipeline.try_lock().ok_or(Error::LockContention)?;
        let report = self.pipeline.flush();
        guard.release();
        report
    }
}

/// Decode a submission body: a bare JSON array of records, or an object
/// carrying the array under `records` or `posts`.
pub fn decode_submit_body(body: &str) -> Result<Vec<Record>> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| Error::Validation(format!("body is not valid JSON: {}", e)))?;

    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut obj) => {
            match obj.remove("records").or_else(|| obj.remove("posts")) {
                Some(Value::Array(items)) => items,
                Some(_) => {
                    return Err(Error::Validation(
                        "records field must be an array".to_string(),
                    ))
                }
                None => {
                    return Err(Error::Validation(
                        "body must be an array or carry a records/posts array".to_string(),
                    ))
                }
            }
        }
        _ => {
            return Err(Error::Validation(
                "body must be array-shaped".to_string(),
            ))
        }
    };

    let mut records = Vec::with_capacity(items.len());
    for item in items {
        match item {
            Value::Object(fields) => records.push(Record::new(fields)),
            other => {
                return Err(Error::Validation(format!(
                    "each record must be an object, got {}",
                    kind_of(&other)
                )))
            }
        }
    }
    Ok(records)
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
