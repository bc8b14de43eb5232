//! Converts the cells of a result row into [`Value`]s, dispatching on the
//! protocol type code the database declared for each column.

use {
    access::GettableByIndex,
    chrono::Duration,
    def::{ColumnSchema, ColumnSpec, ColumnType, ProtocolCode, Record, Value},
    snafu::{prelude::*, Backtrace},
};

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("column {} has unsupported type {}", column, declared))]
    UnsupportedType {
        column: String,
        declared: ColumnType,
        backtrace: Backtrace,
    },

    #[snafu(display("failed to read column {}", column))]
    Access {
        column: String,
        #[snafu(backtrace)]
        source: access::Error,
    },

    #[snafu(display("duration in column {} overflows 64-bit nanoseconds", column))]
    DurationOverflow { column: String, backtrace: Backtrace },
}

pub type Result<T> = std::result::Result<T, Error>;

/// Decodes the cell at `index` according to the declared type of `column`.
pub fn convert_column<R>(column: &ColumnSpec, row: &R, index: usize) -> Result<Value>
where
    R: GettableByIndex + ?Sized,
{
    let name = column.name.as_str();
    let access = || AccessSnafu { column: name };

    let value = match column.data_type.protocol_code() {
        ProtocolCode::Counter | ProtocolCode::BigInt => {
            Value::BigInt(row.get_long(index).context(access())?)
        }
        ProtocolCode::Blob => row.get_bytes(index).context(access())?.into(),
        ProtocolCode::Boolean => Value::Boolean(row.get_boolean(index).context(access())?),
        ProtocolCode::Decimal => row.get_decimal(index).context(access())?.into(),
        ProtocolCode::Double => Value::Double(row.get_double(index).context(access())?),
        ProtocolCode::Float => Value::Float(row.get_float(index).context(access())?),
        ProtocolCode::SmallInt => Value::SmallInt(row.get_short(index).context(access())?),
        ProtocolCode::TinyInt => Value::TinyInt(row.get_byte(index).context(access())?),
        ProtocolCode::Int => Value::Int(row.get_int(index).context(access())?),
        ProtocolCode::Varint => row.get_varint(index).context(access())?.into(),
        ProtocolCode::Timestamp => row.get_timestamp(index).context(access())?.into(),
        ProtocolCode::TimeUuid | ProtocolCode::Uuid => row
            .get_uuid(index)
            .context(access())?
            .map_or(Value::Null, |uuid| Value::Uuid(uuid.to_string())),
        ProtocolCode::Ascii | ProtocolCode::Varchar => {
            row.get_string(index).context(access())?.into()
        }
        ProtocolCode::Inet => row
            .get_inet(index)
            .context(access())?
            .map_or(Value::Null, |addr| Value::Inet(addr.to_string())),
        ProtocolCode::Date => row.get_date(index).context(access())?.into(),
        ProtocolCode::Time => row.get_time(index).context(access())?.into(),
        ProtocolCode::Duration => match row.get_duration(index).context(access())? {
            Some(duration) => {
                let nanos = duration
                    .total_nanoseconds()
                    .context(DurationOverflowSnafu { column: name })?;
                Value::Duration(Duration::nanoseconds(nanos))
            }
            None => Value::Null,
        },
        ProtocolCode::List | ProtocolCode::Map | ProtocolCode::Set => {
            row.get_object(index).context(access())?
        }
        ProtocolCode::Tuple => match row.get_tuple(index).context(access())? {
            Some(tuple) => Value::List(
                (0..tuple.len())
                    .map(|i| tuple.get_object(i))
                    .collect::<access::Result<_>>()
                    .context(access())?,
            ),
            None => Value::Null,
        },
        ProtocolCode::Custom | ProtocolCode::Udt => {
            return UnsupportedTypeSnafu {
                column: name,
                declared: column.data_type.clone(),
            }
            .fail()
        }
    };

    Ok(value)
}

/// Converts every column of `row`, in schema order.
pub fn convert_row<R>(row: &R, schema: &ColumnSchema) -> Result<Record>
where
    R: GettableByIndex + ?Sized,
{
    let mut record = Record::with_capacity(schema.len());
    for (index, column) in schema.iter().enumerate() {
        record.insert(column.name.clone(), convert_column(column, row, index)?);
    }

    Ok(record)
}
