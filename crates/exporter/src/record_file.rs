//! The `.cqlr` record file: a self-describing sequence of records.
//!
//! ```text
//! header:  b"CQLR" version:u8
//! record:  field_count:u32 { name_len:u32 name:utf8 value }*
//! value:   tag:u8 payload
//! ```
//!
//! Integers are little-endian. Lists nest, so maps and tuples keep their
//! shape without any schema.

use {
    byteorder::{ReadBytesExt, WriteBytesExt, LE},
    chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Timelike, Utc},
    def::{Decimal, Record, Value},
    num_bigint::BigInt,
    snafu::{prelude::*, Backtrace},
    std::{
        io::{self, Read, Write},
        string::FromUtf8Error,
    },
};

pub const EXTENSION: &str = "cqlr";

const MAGIC: &[u8; 4] = b"CQLR";
const VERSION: u8 = 1;

/// Lists nested deeper than this are rejected on read.
pub const MAX_DEPTH: usize = 64;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("not a record file"))]
    BadMagic { backtrace: Backtrace },

    #[snafu(display("unsupported record file version {}", version))]
    UnsupportedVersion { version: u8 },

    #[snafu(display("unknown value tag {:#04x}", tag))]
    UnknownTag { tag: u8, backtrace: Backtrace },

    #[snafu(display("invalid {} value", what))]
    InvalidValue {
        what: &'static str,
        backtrace: Backtrace,
    },

    Io {
        source: io::Error,
    },

    Utf8Encoding {
        source: FromUtf8Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

macro_rules! define_tags {
    ($($name:ident = $tag:literal,)*) => {
        mod tag {
            $(pub const $name: u8 = $tag;)*
        }
    };
}

define_tags! {
    NULL = 0x00,
    BIGINT = 0x01,
    BLOB = 0x02,
    BOOLEAN = 0x03,
    DECIMAL = 0x04,
    DOUBLE = 0x05,
    FLOAT = 0x06,
    SMALLINT = 0x07,
    TINYINT = 0x08,
    INT = 0x09,
    VARINT = 0x0a,
    TIMESTAMP = 0x0b,
    UUID = 0x0c,
    STRING = 0x0d,
    INET = 0x0e,
    DATE = 0x0f,
    TIME = 0x10,
    DURATION = 0x11,
    LIST = 0x12,
}

trait WriteValue: io::Write {
    fn write_len(&mut self, len: usize) -> io::Result<()> {
        let len = u32::try_from(len)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "length exceeds u32"))?;
        self.write_u32::<LE>(len)
    }

    fn write_blob(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.write_len(bytes.len())?;
        self.write_all(bytes)
    }

    fn write_value(&mut self, value: &Value) -> io::Result<()> {
        match value {
            Value::Null => self.write_u8(tag::NULL),
            Value::BigInt(v) => {
                self.write_u8(tag::BIGINT)?;
                self.write_i64::<LE>(*v)
            }
            Value::Blob(bytes) => {
                self.write_u8(tag::BLOB)?;
                self.write_blob(bytes)
            }
            Value::Boolean(v) => {
                self.write_u8(tag::BOOLEAN)?;
                self.write_u8(*v as u8)
            }
            Value::Decimal(v) => {
                self.write_u8(tag::DECIMAL)?;
                self.write_i32::<LE>(v.scale)?;
                self.write_blob(&v.unscaled.to_signed_bytes_le())
            }
            Value::Double(v) => {
                self.write_u8(tag::DOUBLE)?;
                self.write_f64::<LE>(*v)
            }
            Value::Float(v) => {
                self.write_u8(tag::FLOAT)?;
                self.write_f32::<LE>(*v)
            }
            Value::SmallInt(v) => {
                self.write_u8(tag::SMALLINT)?;
                self.write_i16::<LE>(*v)
            }
            Value::TinyInt(v) => {
                self.write_u8(tag::TINYINT)?;
                self.write_i8(*v)
            }
            Value::Int(v) => {
                self.write_u8(tag::INT)?;
                self.write_i32::<LE>(*v)
            }
            Value::Varint(v) => {
                self.write_u8(tag::VARINT)?;
                self.write_blob(&v.to_signed_bytes_le())
            }
            Value::Timestamp(v) => {
                self.write_u8(tag::TIMESTAMP)?;
                self.write_i64::<LE>(v.timestamp())?;
                self.write_u32::<LE>(v.timestamp_subsec_nanos())
            }
            Value::Uuid(v) => {
                self.write_u8(tag::UUID)?;
                self.write_blob(v.as_bytes())
            }
            Value::String(v) => {
                self.write_u8(tag::STRING)?;
                self.write_blob(v.as_bytes())
            }
            Value::Inet(v) => {
                self.write_u8(tag::INET)?;
                self.write_blob(v.as_bytes())
            }
            Value::Date(v) => {
                self.write_u8(tag::DATE)?;
                self.write_i32::<LE>(v.num_days_from_ce())
            }
            Value::Time(v) => {
                self.write_u8(tag::TIME)?;
                self.write_u32::<LE>(v.num_seconds_from_midnight())?;
                self.write_u32::<LE>(v.nanosecond())
            }
            Value::Duration(v) => {
                let nanos = v.num_nanoseconds().ok_or_else(|| {
                    io::Error::new(io::ErrorKind::InvalidInput, "duration exceeds i64 nanoseconds")
                })?;
                self.write_u8(tag::DURATION)?;
                self.write_i64::<LE>(nanos)
            }
            Value::List(values) => {
                self.write_u8(tag::LIST)?;
                self.write_len(values.len())?;
                values.iter().try_for_each(|v| self.write_value(v))
            }
        }
    }
}

impl<W: io::Write + ?Sized> WriteValue for W {}

trait ReadValue: io::Read {
    fn read_len(&mut self) -> Result<usize> {
        Ok(self.read_u32::<LE>().context(IoSnafu)? as usize)
    }

    fn read_blob(&mut self) -> Result<Vec<u8>> {
        let len = self.read_len()?;
        let mut buf = Vec::new();
        Read::take(&mut *self, len as u64)
            .read_to_end(&mut buf)
            .context(IoSnafu)?;
        if buf.len() != len {
            return Err(io::Error::from(io::ErrorKind::UnexpectedEof)).context(IoSnafu);
        }

        Ok(buf)
    }

    fn read_string(&mut self) -> Result<String> {
        String::from_utf8(self.read_blob()?).context(Utf8EncodingSnafu)
    }

    fn read_value(&mut self) -> Result<Value> {
        self.read_nested_value(0)
    }

    fn read_nested_value(&mut self, depth: usize) -> Result<Value> {
        let code = self.read_u8().context(IoSnafu)?;

        Ok(match code {
            tag::NULL => Value::Null,
            tag::BIGINT => Value::BigInt(self.read_i64::<LE>().context(IoSnafu)?),
            tag::BLOB => Value::Blob(self.read_blob()?),
            tag::BOOLEAN => match self.read_u8().context(IoSnafu)? {
                0 => Value::Boolean(false),
                1 => Value::Boolean(true),
                _ => return InvalidValueSnafu { what: "boolean" }.fail(),
            },
            tag::DECIMAL => {
                let scale = self.read_i32::<LE>().context(IoSnafu)?;
                let unscaled = BigInt::from_signed_bytes_le(&self.read_blob()?);
                Value::Decimal(Decimal { unscaled, scale })
            }
            tag::DOUBLE => Value::Double(self.read_f64::<LE>().context(IoSnafu)?),
            tag::FLOAT => Value::Float(self.read_f32::<LE>().context(IoSnafu)?),
            tag::SMALLINT => Value::SmallInt(self.read_i16::<LE>().context(IoSnafu)?),
            tag::TINYINT => Value::TinyInt(self.read_i8().context(IoSnafu)?),
            tag::INT => Value::Int(self.read_i32::<LE>().context(IoSnafu)?),
            tag::VARINT => Value::Varint(BigInt::from_signed_bytes_le(&self.read_blob()?)),
            tag::TIMESTAMP => {
                let secs = self.read_i64::<LE>().context(IoSnafu)?;
                let nanos = self.read_u32::<LE>().context(IoSnafu)?;
                let ts: DateTime<Utc> = Utc
                    .timestamp_opt(secs, nanos)
                    .single()
                    .context(InvalidValueSnafu { what: "timestamp" })?;
                Value::Timestamp(ts)
            }
            tag::UUID => Value::Uuid(self.read_string()?),
            tag::STRING => Value::String(self.read_string()?),
            tag::INET => Value::Inet(self.read_string()?),
            tag::DATE => {
                let days = self.read_i32::<LE>().context(IoSnafu)?;
                Value::Date(
                    NaiveDate::from_num_days_from_ce_opt(days)
                        .context(InvalidValueSnafu { what: "date" })?,
                )
            }
            tag::TIME => {
                let secs = self.read_u32::<LE>().context(IoSnafu)?;
                let nanos = self.read_u32::<LE>().context(IoSnafu)?;
                Value::Time(
                    NaiveTime::from_num_seconds_from_midnight_opt(secs, nanos)
                        .context(InvalidValueSnafu { what: "time" })?,
                )
            }
            tag::DURATION => {
                Value::Duration(Duration::nanoseconds(self.read_i64::<LE>().context(IoSnafu)?))
            }
            tag::LIST => {
                ensure!(depth < MAX_DEPTH, InvalidValueSnafu { what: "list" });
                let len = self.read_len()?;
                let mut values = Vec::new();
                for _ in 0..len {
                    values.push(self.read_nested_value(depth + 1)?);
                }
                Value::List(values)
            }
            other => return UnknownTagSnafu { tag: other }.fail(),
        })
    }
}

impl<R: io::Read + ?Sized> ReadValue for R {}

/// Writes records to a sink, header first.
#[derive(Debug)]
pub struct RecordWriter<W: Write> {
    inner: W,
    count: u64,
}

impl<W: Write> RecordWriter<W> {
    pub fn new(mut inner: W) -> io::Result<Self> {
        inner.write_all(MAGIC)?;
        inner.write_u8(VERSION)?;

        Ok(Self { inner, count: 0 })
    }

    pub fn write(&mut self, record: &Record) -> io::Result<()> {
        self.inner.write_len(record.len())?;
        for (name, value) in record.iter() {
            self.inner.write_blob(name.as_bytes())?;
            self.inner.write_value(value)?;
        }
        self.count += 1;

        Ok(())
    }

    /// Records written so far.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Flushes and hands back the sink.
    pub fn into_inner(mut self) -> io::Result<W> {
        self.inner.flush()?;
        Ok(self.inner)
    }
}

/// Reads records back from a `.cqlr` stream.
#[derive(Debug)]
pub struct RecordReader<R: Read> {
    inner: R,
}

impl<R: Read> RecordReader<R> {
    pub fn new(mut inner: R) -> Result<Self> {
        let mut magic = [0; 4];
        inner.read_exact(&mut magic).context(IoSnafu)?;
        ensure!(&magic == MAGIC, BadMagicSnafu);

        let version = inner.read_u8().context(IoSnafu)?;
        ensure!(version == VERSION, UnsupportedVersionSnafu { version });

        Ok(Self { inner })
    }

    /// The next record, or `None` at a clean end of stream.
    pub fn read_record(&mut self) -> Result<Option<Record>> {
        let mut first = [0; 1];
        loop {
            match self.inner.read(&mut first) {
                Ok(0) => return Ok(None),
                Ok(_) => break,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err).context(IoSnafu),
            }
        }

        let mut rest = [0; 3];
        self.inner.read_exact(&mut rest).context(IoSnafu)?;
        let count = u32::from_le_bytes([first[0], rest[0], rest[1], rest[2]]);

        // The count is untrusted, so the record grows as fields arrive.
        let mut record = Record::new();
        for _ in 0..count {
            let name = self.inner.read_string()?;
            let value = self.inner.read_value()?;
            record.insert(name, value);
        }

        Ok(Some(record))
    }
}

impl<R: Read> Iterator for RecordReader<R> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_record().transpose()
    }
}

#[cfg(test)]
mod tests {
    use {super::*, std::io::Cursor};

    fn sample() -> Record {
        [
            ("id", Value::BigInt(7)),
            ("amount", Value::Decimal(Decimal::new(-12345, 2))),
            ("big", Value::Varint(BigInt::from(-1) << 80)),
            ("at", Value::Timestamp(Utc.timestamp_millis_opt(1_700_000_000_123).unwrap())),
            ("day", Value::Date(NaiveDate::from_ymd_opt(1969, 7, 20).unwrap())),
            ("clock", Value::Time(NaiveTime::from_hms_nano_opt(23, 59, 59, 999).unwrap())),
            ("took", Value::Duration(Duration::nanoseconds(-172_800_000_000_001))),
            ("addr", Value::Inet("::1".into())),
            ("key", Value::Uuid("6f1f0c8e-1d2b-4c3a-9e4f-0a1b2c3d4e5f".into())),
            (
                "tags",
                Value::List(vec![
                    Value::List(vec!["a".into(), Value::Int(1)]),
                    Value::List(vec![Value::Null, Value::Blob(vec![0, 255])]),
                ]),
            ),
            ("ratio", Value::Float(0.5)),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn records_read_back_in_order() {
        let mut writer = RecordWriter::new(Vec::new()).unwrap();
        writer.write(&sample()).unwrap();
        writer.write(&Record::new()).unwrap();
        assert_eq!(writer.count(), 2);

        let bytes = writer.into_inner().unwrap();
        let records = RecordReader::new(Cursor::new(bytes))
            .unwrap()
            .collect::<Result<Vec<_>>>()
            .unwrap();

        assert_eq!(records, vec![sample(), Record::new()]);
        assert_eq!(
            records[0].names().collect::<Vec<_>>(),
            sample().names().collect::<Vec<_>>()
        );
    }

    #[test]
    fn rejects_foreign_files() {
        assert!(matches!(
            RecordReader::new(Cursor::new(b"ION\x01\x00".to_vec())),
            Err(Error::BadMagic { .. })
        ));
        assert!(matches!(
            RecordReader::new(Cursor::new(b"CQLR\x09".to_vec())),
            Err(Error::UnsupportedVersion { version: 9 })
        ));
    }

    #[test]
    fn truncated_record() {
        let mut writer = RecordWriter::new(Vec::new()).unwrap();
        writer.write(&sample()).unwrap();
        let mut bytes = writer.into_inner().unwrap();
        bytes.truncate(bytes.len() - 3);

        let mut reader = RecordReader::new(Cursor::new(bytes)).unwrap();
        assert!(matches!(reader.next(), Some(Err(Error::Io { .. }))));
    }

    #[test]
    fn unknown_tag() {
        let mut bytes = RecordWriter::new(Vec::new()).unwrap().into_inner().unwrap();
        bytes.extend_from_slice(&1u32.to_le_bytes());
        bytes.extend_from_slice(&1u32.to_le_bytes());
        bytes.push(b'c');
        bytes.push(0x7f);

        let mut reader = RecordReader::new(Cursor::new(bytes)).unwrap();
        assert!(matches!(
            reader.next(),
            Some(Err(Error::UnknownTag { tag: 0x7f, .. }))
        ));
    }

    fn record_prefix(count: u32) -> Vec<u8> {
        let mut bytes = RecordWriter::new(Vec::new()).unwrap().into_inner().unwrap();
        bytes.extend_from_slice(&count.to_le_bytes());
        bytes.extend_from_slice(&1u32.to_le_bytes());
        bytes.push(b'c');
        bytes
    }

    #[test]
    fn huge_field_count_is_truncation() {
        let mut bytes = record_prefix(u32::MAX);
        bytes.push(tag::INT);
        bytes.extend_from_slice(&5i32.to_le_bytes());

        let mut reader = RecordReader::new(Cursor::new(bytes)).unwrap();
        assert!(matches!(reader.next(), Some(Err(Error::Io { .. }))));
    }

    #[test]
    fn deeply_nested_list_is_rejected() {
        let mut bytes = record_prefix(1);
        for _ in 0..10_000 {
            bytes.push(tag::LIST);
            bytes.extend_from_slice(&1u32.to_le_bytes());
        }
        bytes.push(tag::NULL);

        let mut reader = RecordReader::new(Cursor::new(bytes)).unwrap();
        assert!(matches!(
            reader.next(),
            Some(Err(Error::InvalidValue { what: "list", .. }))
        ));
    }

    #[test]
    fn nesting_up_to_the_limit_reads_back() {
        let nested = (0..MAX_DEPTH).fold(Value::Null, |v, _| Value::List(vec![v]));
        let record: Record = [("c", nested)].into_iter().collect();

        let mut writer = RecordWriter::new(Vec::new()).unwrap();
        writer.write(&record).unwrap();
        let bytes = writer.into_inner().unwrap();

        let mut reader = RecordReader::new(Cursor::new(bytes)).unwrap();
        assert_eq!(reader.next().unwrap().unwrap(), record);
        assert!(reader.next().is_none());
    }
}
