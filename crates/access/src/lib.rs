//! Row-access primitives over CQL native protocol results: typed getters on
//! rows and tuples, cell decoding and a cursor over RESULT Rows bodies.

pub mod cell;
pub mod encode;
mod error;
mod gettable;
pub mod result;

pub use {
    error::{Error, Result},
    gettable::{GettableByIndex, Row, TupleValue},
    result::{Cursor, RowsCursor, RowsMetadata},
};
