//! Materializes a CQL result cursor into records, in one of three output
//! modes: a single record, a streamed record file, or an in-memory list.

mod error;
mod export;
pub mod metrics;
pub mod record_file;
pub mod storage;

pub use {
    error::{Error, Result},
    export::{ExportMode, ExportOptions, ExportResult, Exporter},
    metrics::Counter,
    record_file::{RecordReader, RecordWriter},
    storage::{LocalStorage, Storage, TempSink},
};
