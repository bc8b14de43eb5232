use {
    def::{types::Error as TypeError, ColumnType},
    snafu::{prelude::*, Backtrace},
    std::{io, string::FromUtf8Error},
};

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display(
        "column {} is declared as {}, cannot read it as {}",
        index,
        declared,
        requested
    ))]
    MismatchedType {
        index: usize,
        declared: ColumnType,
        requested: &'static str,
        backtrace: Backtrace,
    },

    #[snafu(display("index {} is out of bounds for {} columns", index, len))]
    IndexOutOfBounds { index: usize, len: usize },

    #[snafu(display("invalid {} value: {}", data_type, details))]
    InvalidData {
        data_type: &'static str,
        details: String,
        backtrace: Backtrace,
    },

    #[snafu(display("message truncated while reading {}", what))]
    Truncated {
        what: &'static str,
        source: io::Error,
    },

    #[snafu(display("expected a Rows result, got result kind 0x{:04x}", kind))]
    UnexpectedKind { kind: i32 },

    #[snafu(display("result metadata was omitted and no schema was supplied"))]
    MissingMetadata,

    #[snafu(display("cannot decode {} values nested in a collection or tuple", data_type))]
    UnsupportedElement { data_type: ColumnType },

    InvalidType {
        #[snafu(backtrace)]
        source: TypeError,
    },

    #[snafu(display("invalid UTF-8 in {}", what))]
    Utf8 {
        what: &'static str,
        source: FromUtf8Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
