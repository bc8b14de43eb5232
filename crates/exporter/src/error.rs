use {
    snafu::{prelude::*, Backtrace},
    std::io,
};

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("single-record export requested but the query returned no rows"))]
    EmptyResult { backtrace: Backtrace },

    #[snafu(display("failed to convert row {}: {}", row, source))]
    Convert {
        row: u64,
        #[snafu(backtrace)]
        source: converter::Error,
    },

    #[snafu(display("failed to advance the result cursor: {}", source))]
    Cursor {
        #[snafu(backtrace)]
        source: access::Error,
    },

    #[snafu(display("failed to {} the exported records: {}", stage, source))]
    StorageWrite {
        stage: &'static str,
        source: io::Error,
        backtrace: Backtrace,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
