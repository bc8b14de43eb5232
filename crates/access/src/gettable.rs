use {
    crate::{
        cell,
        error::{IndexOutOfBoundsSnafu, MismatchedTypeSnafu, Result},
    },
    chrono::{DateTime, NaiveDate, NaiveTime, Utc},
    def::{ColumnType, CqlDuration, Decimal, ProtocolCode, Value},
    num_bigint::BigInt,
    snafu::prelude::*,
    std::{net::IpAddr, sync::Arc},
    uuid::Uuid,
};

/// Positional, typed access to the cells of a row or tuple.
///
/// Getters for primitive types return the zero value for an absent cell,
/// getters for object types return `None`.
pub trait GettableByIndex {
    fn len(&self) -> usize;

    fn data_type(&self, index: usize) -> Result<&ColumnType>;

    /// The raw cell, `None` if it is absent.
    fn cell(&self, index: usize) -> Result<Option<&[u8]>>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn is_null(&self, index: usize) -> Result<bool> {
        Ok(self.cell(index)?.is_none())
    }

    fn typed_cell(
        &self,
        index: usize,
        accepted: &[ProtocolCode],
        requested: &'static str,
    ) -> Result<Option<&[u8]>> {
        let declared = self.data_type(index)?;
        let code = declared.protocol_code();
        ensure!(
            accepted.contains(&code),
            MismatchedTypeSnafu {
                index,
                declared: declared.clone(),
                requested,
            }
        );

        Ok(cell::present(code, self.cell(index)?))
    }

    fn get_long(&self, index: usize) -> Result<i64> {
        self.typed_cell(index, &[ProtocolCode::BigInt, ProtocolCode::Counter], "long")?
            .map_or(Ok(0), cell::bigint)
    }

    fn get_bytes(&self, index: usize) -> Result<Option<Vec<u8>>> {
        Ok(self
            .typed_cell(index, &[ProtocolCode::Blob], "bytes")?
            .map(<[u8]>::to_vec))
    }

    fn get_boolean(&self, index: usize) -> Result<bool> {
        self.typed_cell(index, &[ProtocolCode::Boolean], "boolean")?
            .map_or(Ok(false), cell::boolean)
    }

    fn get_decimal(&self, index: usize) -> Result<Option<Decimal>> {
        self.typed_cell(index, &[ProtocolCode::Decimal], "decimal")?
            .map(cell::decimal)
            .transpose()
    }

    fn get_double(&self, index: usize) -> Result<f64> {
        self.typed_cell(index, &[ProtocolCode::Double], "double")?
            .map_or(Ok(0.0), cell::double)
    }

    fn get_float(&self, index: usize) -> Result<f32> {
        self.typed_cell(index, &[ProtocolCode::Float], "float")?
            .map_or(Ok(0.0), cell::float)
    }

    fn get_short(&self, index: usize) -> Result<i16> {
        self.typed_cell(index, &[ProtocolCode::SmallInt], "short")?
            .map_or(Ok(0), cell::smallint)
    }

    fn get_byte(&self, index: usize) -> Result<i8> {
        self.typed_cell(index, &[ProtocolCode::TinyInt], "byte")?
            .map_or(Ok(0), cell::tinyint)
    }

    fn get_int(&self, index: usize) -> Result<i32> {
        self.typed_cell(index, &[ProtocolCode::Int], "int")?
            .map_or(Ok(0), cell::int)
    }

    fn get_varint(&self, index: usize) -> Result<Option<BigInt>> {
        Ok(self
            .typed_cell(index, &[ProtocolCode::Varint], "varint")?
            .map(cell::varint))
    }

    fn get_timestamp(&self, index: usize) -> Result<Option<DateTime<Utc>>> {
        self.typed_cell(index, &[ProtocolCode::Timestamp], "timestamp")?
            .map(cell::timestamp)
            .transpose()
    }

    fn get_uuid(&self, index: usize) -> Result<Option<Uuid>> {
        self.typed_cell(index, &[ProtocolCode::Uuid, ProtocolCode::TimeUuid], "uuid")?
            .map(cell::uuid)
            .transpose()
    }

    fn get_string(&self, index: usize) -> Result<Option<String>> {
        self.typed_cell(index, &[ProtocolCode::Ascii, ProtocolCode::Varchar], "string")?
            .map(cell::string)
            .transpose()
    }

    fn get_inet(&self, index: usize) -> Result<Option<IpAddr>> {
        self.typed_cell(index, &[ProtocolCode::Inet], "inet")?
            .map(cell::inet)
            .transpose()
    }

    fn get_date(&self, index: usize) -> Result<Option<NaiveDate>> {
        self.typed_cell(index, &[ProtocolCode::Date], "date")?
            .map(cell::date)
            .transpose()
    }

    fn get_time(&self, index: usize) -> Result<Option<NaiveTime>> {
        self.typed_cell(index, &[ProtocolCode::Time], "time")?
            .map(cell::time)
            .transpose()
    }

    fn get_duration(&self, index: usize) -> Result<Option<CqlDuration>> {
        self.typed_cell(index, &[ProtocolCode::Duration], "duration")?
            .map(cell::duration)
            .transpose()
    }

    fn get_tuple(&self, index: usize) -> Result<Option<TupleValue>> {
        let Some(bytes) = self.typed_cell(index, &[ProtocolCode::Tuple], "tuple")? else {
            return Ok(None);
        };

        let ColumnType::Tuple(types) = self.data_type(index)? else {
            unreachable!("typed_cell checked the declared type")
        };
        let cells = cell::fields(bytes, types.len(), "tuple")?;

        Ok(Some(TupleValue::new(types.clone(), cells)))
    }

    /// Decodes the cell by its declared type, whatever that type is.
    fn get_object(&self, index: usize) -> Result<Value> {
        cell::object(self.data_type(index)?, self.cell(index)?)
    }
}

/// A row read off a result cursor. The declared types are shared by every
/// row of the same result.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    types: Arc<[ColumnType]>,
    cells: Vec<Option<Vec<u8>>>,
}

impl Row {
    pub fn new(types: Arc<[ColumnType]>, cells: Vec<Option<Vec<u8>>>) -> Self {
        Self { types, cells }
    }
}

impl GettableByIndex for Row {
    fn len(&self) -> usize {
        self.cells.len()
    }

    fn data_type(&self, index: usize) -> Result<&ColumnType> {
        self.types.get(index).context(IndexOutOfBoundsSnafu {
            index,
            len: self.types.len(),
        })
    }

    fn cell(&self, index: usize) -> Result<Option<&[u8]>> {
        self.cells
            .get(index)
            .map(Option::as_deref)
            .context(IndexOutOfBoundsSnafu {
                index,
                len: self.cells.len(),
            })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TupleValue {
    types: Vec<ColumnType>,
    cells: Vec<Option<Vec<u8>>>,
}

impl TupleValue {
    pub fn new(types: Vec<ColumnType>, cells: Vec<Option<Vec<u8>>>) -> Self {
        Self { types, cells }
    }
}

impl GettableByIndex for TupleValue {
    fn len(&self) -> usize {
        self.types.len()
    }

    fn data_type(&self, index: usize) -> Result<&ColumnType> {
        self.types.get(index).context(IndexOutOfBoundsSnafu {
            index,
            len: self.types.len(),
        })
    }

    fn cell(&self, index: usize) -> Result<Option<&[u8]>> {
        self.data_type(index)?;
        Ok(self.cells.get(index).and_then(Option::as_deref))
    }
}
