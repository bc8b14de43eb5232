mod record;
mod schema;
pub mod types;
mod value;

pub use {
    record::Record,
    schema::{ColumnSchema, ColumnSpec},
    types::{ColumnType, ProtocolCode},
    value::{CqlDuration, Decimal, Value},
};
