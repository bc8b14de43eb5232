use {
    crate::{
        error::{
            InvalidDataSnafu, InvalidTypeSnafu, MissingMetadataSnafu, Result, TruncatedSnafu,
            UnexpectedKindSnafu, Utf8Snafu,
        },
        GettableByIndex, Row,
    },
    byteorder::{ReadBytesExt, BE},
    def::{ColumnSchema, ColumnSpec, ColumnType, ProtocolCode},
    snafu::prelude::*,
    std::{
        io::{self, Read},
        sync::Arc,
    },
};

pub const RESULT_KIND_ROWS: i32 = 0x0002;

pub const FLAG_GLOBAL_TABLES_SPEC: i32 = 0x0001;
pub const FLAG_HAS_MORE_PAGES: i32 = 0x0002;
pub const FLAG_NO_METADATA: i32 = 0x0004;
pub const FLAG_METADATA_CHANGED: i32 = 0x0008;

/// Collections, tuples and UDTs nested deeper than this are rejected.
pub const MAX_TYPE_DEPTH: usize = 64;

/// A one-pass, schema-described sequence of rows from one executed query.
pub trait Cursor {
    type Row: GettableByIndex;

    fn schema(&self) -> &ColumnSchema;

    /// Size in bytes of the response the rows were read from.
    fn response_size(&self) -> i32;

    fn next_row(&mut self) -> Result<Option<Self::Row>>;

    fn one(&mut self) -> Result<Option<Self::Row>> {
        self.next_row()
    }
}

pub(crate) trait ReadFrame: Read {
    fn read_cql_int(&mut self, what: &'static str) -> Result<i32> {
        self.read_i32::<BE>().context(TruncatedSnafu { what })
    }

    fn read_cql_short(&mut self, what: &'static str) -> Result<u16> {
        self.read_u16::<BE>().context(TruncatedSnafu { what })
    }

    fn read_exact_vec(&mut self, len: usize, what: &'static str) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        Read::take(&mut *self, len as u64)
            .read_to_end(&mut buf)
            .context(TruncatedSnafu { what })?;
        if buf.len() != len {
            return Err(io::Error::from(io::ErrorKind::UnexpectedEof))
                .context(TruncatedSnafu { what });
        }

        Ok(buf)
    }

    fn read_string(&mut self, what: &'static str) -> Result<String> {
        let len = self.read_cql_short(what)? as usize;
        let buf = self.read_exact_vec(len, what)?;
        String::from_utf8(buf).context(Utf8Snafu { what })
    }

    fn read_bytes(&mut self, what: &'static str) -> Result<Option<Vec<u8>>> {
        let len = self.read_cql_int(what)?;
        if len < 0 {
            return Ok(None);
        }
        self.read_exact_vec(len as usize, what).map(Some)
    }

    fn read_short_bytes(&mut self, what: &'static str) -> Result<Vec<u8>> {
        let len = self.read_cql_short(what)? as usize;
        self.read_exact_vec(len, what)
    }

    fn read_type(&mut self) -> Result<ColumnType> {
        self.read_nested_type(0)
    }

    fn read_nested_type(&mut self, depth: usize) -> Result<ColumnType> {
        ensure!(
            depth <= MAX_TYPE_DEPTH,
            InvalidDataSnafu {
                data_type: "type option",
                details: format!("nested deeper than {} levels", MAX_TYPE_DEPTH),
            }
        );

        let id = self.read_cql_short("type option")?;
        let code = ProtocolCode::try_from(id).context(InvalidTypeSnafu)?;
        if let Some(simple) = ColumnType::simple(code) {
            return Ok(simple);
        }

        Ok(match code {
            ProtocolCode::Custom => ColumnType::Custom(self.read_string("custom type class")?),
            ProtocolCode::List => ColumnType::list(self.read_nested_type(depth + 1)?),
            ProtocolCode::Set => ColumnType::set(self.read_nested_type(depth + 1)?),
            ProtocolCode::Map => {
                let key = self.read_nested_type(depth + 1)?;
                let value = self.read_nested_type(depth + 1)?;
                ColumnType::map(key, value)
            }
            ProtocolCode::Udt => {
                let keyspace = self.read_string("udt keyspace")?;
                let name = self.read_string("udt name")?;
                let count = self.read_cql_short("udt field count")?;
                let fields = (0..count)
                    .map(|_| -> Result<(String, ColumnType)> {
                        let field = self.read_string("udt field name")?;
                        Ok((field, self.read_nested_type(depth + 1)?))
                    })
                    .collect::<Result<_>>()?;

                ColumnType::Udt {
                    keyspace,
                    name,
                    fields,
                }
            }
            ProtocolCode::Tuple => {
                let count = self.read_cql_short("tuple arity")?;
                let types = (0..count)
                    .map(|_| self.read_nested_type(depth + 1))
                    .collect::<Result<_>>()?;
                ColumnType::Tuple(types)
            }
            _ => unreachable!("{} carries no parameters", code),
        })
    }
}

impl<T> ReadFrame for io::Cursor<T> where T: AsRef<[u8]> {}

/// Result metadata of a Rows message.
#[derive(Debug, Clone, PartialEq)]
pub struct RowsMetadata {
    pub flags: i32,
    pub columns_count: usize,
    pub paging_state: Option<Vec<u8>>,
    /// Empty when the server omitted the column specs.
    pub schema: ColumnSchema,
}

impl RowsMetadata {
    fn decode<R: ReadFrame>(reader: &mut R) -> Result<Self> {
        let flags = reader.read_cql_int("metadata flags")?;
        let columns_count = reader.read_cql_int("columns count")?;
        let columns_count = usize::try_from(columns_count).map_err(|_| {
            InvalidDataSnafu {
                data_type: "metadata",
                details: format!("negative columns count {}", columns_count),
            }
            .build()
        })?;

        let paging_state = if flags & FLAG_HAS_MORE_PAGES != 0 {
            reader.read_bytes("paging state")?
        } else {
            None
        };

        if flags & FLAG_METADATA_CHANGED != 0 {
            reader.read_short_bytes("new metadata id")?;
        }

        let mut columns = Vec::new();
        if flags & FLAG_NO_METADATA == 0 {
            let global = if flags & FLAG_GLOBAL_TABLES_SPEC != 0 {
                Some((
                    reader.read_string("global keyspace")?,
                    reader.read_string("global table")?,
                ))
            } else {
                None
            };

            for _ in 0..columns_count {
                let (keyspace, table) = match &global {
                    Some(spec) => spec.clone(),
                    None => (
                        reader.read_string("column keyspace")?,
                        reader.read_string("column table")?,
                    ),
                };
                let name = reader.read_string("column name")?;
                let data_type = reader.read_type()?;

                columns.push(ColumnSpec {
                    keyspace,
                    table,
                    name,
                    data_type,
                });
            }
        }

        Ok(Self {
            flags,
            columns_count,
            paging_state,
            schema: ColumnSchema::new(columns),
        })
    }

    pub fn has_more_pages(&self) -> bool {
        self.flags & FLAG_HAS_MORE_PAGES != 0
    }
}

/// A cursor over the rows of one RESULT message body, decoding one row per
/// call.
pub struct RowsCursor {
    reader: io::Cursor<Vec<u8>>,
    metadata: RowsMetadata,
    types: Arc<[ColumnType]>,
    remaining: usize,
    response_size: i32,
}

impl RowsCursor {
    pub fn new(body: Vec<u8>) -> Result<Self> {
        Self::decode(body, None)
    }

    /// For bodies sent with `No_metadata`, where the schema is known from a
    /// prepared statement.
    pub fn with_schema(body: Vec<u8>, schema: ColumnSchema) -> Result<Self> {
        Self::decode(body, Some(schema))
    }

    fn decode(body: Vec<u8>, schema: Option<ColumnSchema>) -> Result<Self> {
        let response_size = i32::try_from(body.len()).unwrap_or(i32::MAX);
        let mut reader = io::Cursor::new(body);

        let kind = reader.read_cql_int("result kind")?;
        ensure!(kind == RESULT_KIND_ROWS, UnexpectedKindSnafu { kind });

        let mut metadata = RowsMetadata::decode(&mut reader)?;
        if metadata.flags & FLAG_NO_METADATA != 0 {
            let schema = schema.context(MissingMetadataSnafu)?;
            ensure!(
                schema.len() == metadata.columns_count,
                InvalidDataSnafu {
                    data_type: "metadata",
                    details: format!(
                        "{} columns in result, {} in supplied schema",
                        metadata.columns_count,
                        schema.len()
                    ),
                }
            );
            metadata.schema = schema;
        }

        let rows_count = reader.read_cql_int("rows count")?;
        let remaining = usize::try_from(rows_count).map_err(|_| {
            InvalidDataSnafu {
                data_type: "rows",
                details: format!("negative rows count {}", rows_count),
            }
            .build()
        })?;

        Ok(Self {
            reader,
            types: metadata.schema.types().into(),
            metadata,
            remaining,
            response_size,
        })
    }

    /// Overrides the body length with the size reported for the whole response.
    pub fn with_response_size(mut self, response_size: i32) -> Self {
        self.response_size = response_size;
        self
    }

    pub fn metadata(&self) -> &RowsMetadata {
        &self.metadata
    }

    pub fn paging_state(&self) -> Option<&[u8]> {
        self.metadata.paging_state.as_deref()
    }

    pub fn remaining(&self) -> usize {
        self.remaining
    }
}

impl Cursor for RowsCursor {
    type Row = Row;

    fn schema(&self) -> &ColumnSchema {
        &self.metadata.schema
    }

    fn response_size(&self) -> i32 {
        self.response_size
    }

    fn next_row(&mut self) -> Result<Option<Row>> {
        if self.remaining == 0 {
            return Ok(None);
        }

        let cells = (0..self.metadata.columns_count)
            .map(|_| self.reader.read_bytes("cell"))
            .collect::<Result<_>>()?;
        self.remaining -= 1;

        Ok(Some(Row::new(self.types.clone(), cells)))
    }
}

impl Iterator for RowsCursor {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_row().transpose()
    }
}
