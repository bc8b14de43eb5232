use {
    exporter::{record_file::Error as RecordFileError, Error as ExportError},
    snafu::prelude::*,
    std::{io, path::PathBuf},
};

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(super)))]
pub enum Error {
    #[snafu(display("Failed to read {}, source: {}", path.display(), source))]
    ReadFile { path: PathBuf, source: io::Error },

    #[snafu(display("Failed to decode the RESULT body, source: {}", source))]
    Decode {
        #[snafu(backtrace)]
        source: access::Error,
    },

    #[snafu(display("Failed to open storage at {}, source: {}", path.display(), source))]
    OpenStorage { path: PathBuf, source: io::Error },

    #[snafu(display("Failed with exporting, source: {}", source))]
    Export {
        #[snafu(backtrace)]
        source: ExportError,
    },

    #[snafu(display("Failed to read records, source: {}", source))]
    ReadRecords { source: RecordFileError },

    #[snafu(display("Failed to write output, source: {}", source))]
    Output { source: io::Error },
}

pub type Result<T> = std::result::Result<T, Error>;
