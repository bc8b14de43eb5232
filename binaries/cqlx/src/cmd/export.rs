use {
    super::error::{DecodeSnafu, ExportSnafu, OpenStorageSnafu, OutputSnafu, ReadFileSnafu, Result},
    access::RowsCursor,
    exporter::{ExportOptions, ExportResult, Exporter, LocalStorage},
    snafu::prelude::*,
    std::{fs, io::Write, path::Path},
    tracing::info,
};

/// Exports the rows of a captured RESULT body and prints what the chosen mode
/// produced: records one per line, or the location of the record file.
pub fn export(
    body_file: &Path,
    storage_dir: &Path,
    options: &ExportOptions,
    out: &mut impl Write,
) -> Result<ExportResult> {
    let body = fs::read(body_file).context(ReadFileSnafu { path: body_file })?;
    let mut cursor = RowsCursor::new(body).context(DecodeSnafu)?;

    let storage = LocalStorage::new(storage_dir).context(OpenStorageSnafu { path: storage_dir })?;
    let result = Exporter::new(storage)
        .export(&mut cursor, options)
        .context(ExportSnafu)?;

    if let Some(record) = &result.single_record {
        writeln!(out, "{}", record).context(OutputSnafu)?;
    }
    for record in result.records.iter().flatten() {
        writeln!(out, "{}", record).context(OutputSnafu)?;
    }
    if let Some(destination) = &result.destination {
        writeln!(out, "{}", destination).context(OutputSnafu)?;
    }

    for counter in result.counters() {
        info!(%counter, "metric");
    }

    Ok(result)
}
