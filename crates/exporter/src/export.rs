use {
    crate::{
        error::{ConvertSnafu, CursorSnafu, EmptyResultSnafu, Result, StorageWriteSnafu},
        metrics::{self, Counter},
        record_file::{self, RecordWriter},
        storage::Storage,
    },
    access::Cursor,
    converter::convert_row,
    def::{ColumnSchema, Record},
    snafu::prelude::*,
    tracing::{debug, info, warn},
    url::Url,
};

/// Output mode flags as a caller passes them. Several may be set, see
/// [`ExportOptions::mode`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportOptions {
    pub fetch_one: bool,
    pub store: bool,
    pub fetch: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportMode {
    SingleRecord,
    Streamed,
    BoundedList,
}

impl ExportOptions {
    /// The honored mode: `fetch_one` wins over `store`, which wins over `fetch`.
    pub fn mode(&self) -> Option<ExportMode> {
        if self.fetch_one {
            Some(ExportMode::SingleRecord)
        } else if self.store {
            Some(ExportMode::Streamed)
        } else if self.fetch {
            Some(ExportMode::BoundedList)
        } else {
            None
        }
    }

    fn flags_set(&self) -> usize {
        [self.fetch_one, self.store, self.fetch]
            .into_iter()
            .filter(|f| *f)
            .count()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExportResult {
    pub single_record: Option<Record>,
    pub records: Option<Vec<Record>>,
    pub destination: Option<Url>,
    pub record_count: Option<u64>,
    pub byte_size: i32,
}

impl ExportResult {
    fn new(byte_size: i32) -> Self {
        Self {
            byte_size,
            ..Self::default()
        }
    }

    /// Counters to forward to a metrics sink. The record count is only
    /// reported when records were iterated.
    pub fn counters(&self) -> Vec<Counter> {
        let mut counters = Vec::with_capacity(2);
        if let Some(count) = self.record_count {
            counters.push(Counter::new(
                metrics::FETCH_SIZE,
                i64::try_from(count).unwrap_or(i64::MAX),
            ));
        }
        counters.push(Counter::new(metrics::FETCH_BYTES, self.byte_size as i64));

        counters
    }
}

pub struct Exporter<S> {
    storage: S,
}

impl<S: Storage> Exporter<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Drains `cursor` according to `options`. Any failure aborts the whole
    /// export; no partial result is returned.
    pub fn export<C: Cursor>(
        &self,
        cursor: &mut C,
        options: &ExportOptions,
    ) -> Result<ExportResult> {
        let mut result = ExportResult::new(cursor.response_size());

        let Some(mode) = options.mode() else {
            debug!("no output mode requested, rows left unread");
            return Ok(result);
        };
        if options.flags_set() > 1 {
            warn!(?mode, ?options, "several output modes requested, honoring one");
        }
        debug!(?mode, columns = cursor.schema().len(), "exporting result");

        let schema = cursor.schema().clone();
        match mode {
            ExportMode::SingleRecord => {
                let row = cursor
                    .one()
                    .context(CursorSnafu)?
                    .context(EmptyResultSnafu)?;
                let record = convert_row(&row, &schema).context(ConvertSnafu { row: 0u64 })?;

                result.single_record = Some(record);
                result.record_count = Some(1);
            }
            ExportMode::Streamed => {
                let (destination, count) = self.stream(cursor, &schema)?;

                result.destination = Some(destination);
                result.record_count = Some(count);
            }
            ExportMode::BoundedList => {
                let mut records = Vec::new();
                while let Some(row) = cursor.next_row().context(CursorSnafu)? {
                    let record = convert_row(&row, &schema).context(ConvertSnafu {
                        row: records.len() as u64,
                    })?;
                    records.push(record);
                }

                result.record_count = Some(records.len() as u64);
                result.records = Some(records);
            }
        }

        info!(
            ?mode,
            records = ?result.record_count,
            bytes = result.byte_size,
            "export finished"
        );

        Ok(result)
    }

    /// Writes every row to a temporary sink, then publishes it. On any error
    /// the sink is dropped before the error propagates, so nothing is
    /// published.
    fn stream<C: Cursor>(&self, cursor: &mut C, schema: &ColumnSchema) -> Result<(Url, u64)> {
        let sink = self
            .storage
            .temp_file(record_file::EXTENSION)
            .context(StorageWriteSnafu { stage: "create" })?;
        let mut writer = RecordWriter::new(sink).context(StorageWriteSnafu { stage: "write" })?;

        while let Some(row) = cursor.next_row().context(CursorSnafu)? {
            let record = convert_row(&row, schema).context(ConvertSnafu {
                row: writer.count(),
            })?;
            writer
                .write(&record)
                .context(StorageWriteSnafu { stage: "write" })?;
        }

        let count = writer.count();
        let sink = writer
            .into_inner()
            .context(StorageWriteSnafu { stage: "flush" })?;
        let destination = self
            .storage
            .publish(sink)
            .context(StorageWriteSnafu { stage: "publish" })?;

        Ok((destination, count))
    }
}
