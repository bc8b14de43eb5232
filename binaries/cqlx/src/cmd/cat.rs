use {
    super::error::{OutputSnafu, ReadFileSnafu, ReadRecordsSnafu, Result},
    exporter::RecordReader,
    snafu::prelude::*,
    std::{
        fs::File,
        io::{BufReader, Write},
        path::Path,
    },
};

/// Prints every record of a record file, one per line. Returns the count.
pub fn cat(record_file: &Path, out: &mut impl Write) -> Result<u64> {
    let file = File::open(record_file).context(ReadFileSnafu { path: record_file })?;
    let reader = RecordReader::new(BufReader::new(file)).context(ReadRecordsSnafu)?;

    let mut count = 0;
    for record in reader {
        let record = record.context(ReadRecordsSnafu)?;
        writeln!(out, "{}", record).context(OutputSnafu)?;
        count += 1;
    }

    Ok(count)
}
