pub mod config;
pub mod error;
pub mod keyspace;
pub mod lock;
pub mod pipeline;
pub mod record;
pub mod scheduler;
pub mod service;
pub mod store;
pub mod tasks;

pub use config::{PipelineConfig, ResetPolicy};
pub use error::{Error, Result};
pub use pipeline::{Batch, CursorPage, FlushReport, Pipeline, Submitted};
pub use record::Record;
pub use service::{ReadQuery, ReadResponse, Service};
pub use store::{MemoryStore, RecordStore, SetAdd};
