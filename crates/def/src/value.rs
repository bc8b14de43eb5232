use {
    chrono::{DateTime, Duration, NaiveDate, NaiveTime, SecondsFormat, Utc},
    num_bigint::{BigInt, Sign},
    std::fmt::{self, Display, Write},
};

const NANOS_PER_DAY: i128 = 86_400 * 1_000_000_000;

/// An arbitrary-precision decimal: `unscaled * 10^-scale`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Decimal {
    pub unscaled: BigInt,
    pub scale: i32,
}

impl Decimal {
    pub fn new(unscaled: impl Into<BigInt>, scale: i32) -> Self {
        Self {
            unscaled: unscaled.into(),
            scale,
        }
    }
}

impl Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = self.unscaled.magnitude().to_string();
        let sign = if self.unscaled.sign() == Sign::Minus {
            "-"
        } else {
            ""
        };

        if self.scale <= 0 {
            let zeros = if digits == "0" { 0 } else { self.scale.unsigned_abs() };
            return write!(f, "{}{}{}", sign, digits, "0".repeat(zeros as usize));
        }

        let scale = self.scale as usize;
        if digits.len() > scale {
            let (int, frac) = digits.split_at(digits.len() - scale);
            write!(f, "{}{}.{}", sign, int, frac)
        } else {
            write!(f, "{}0.{}{}", sign, "0".repeat(scale - digits.len()), digits)
        }
    }
}

/// The native duration carried by the `duration` type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CqlDuration {
    pub months: i32,
    pub days: i32,
    pub nanoseconds: i64,
}

impl CqlDuration {
    pub fn new(months: i32, days: i32, nanoseconds: i64) -> Self {
        Self {
            months,
            days,
            nanoseconds,
        }
    }

    /// Days and nanoseconds folded into one nanosecond count. Months have no
    /// fixed length and are dropped. `None` when the total overflows `i64`.
    pub fn total_nanoseconds(&self) -> Option<i64> {
        let total = self.days as i128 * NANOS_PER_DAY + self.nanoseconds as i128;
        i64::try_from(total).ok()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    BigInt(i64),
    Blob(Vec<u8>),
    Boolean(bool),
    Decimal(Decimal),
    Double(f64),
    Float(f32),
    SmallInt(i16),
    TinyInt(i8),
    Int(i32),
    Varint(BigInt),
    Timestamp(DateTime<Utc>),
    Uuid(String),
    String(String),
    Inet(String),
    Date(NaiveDate),
    Time(NaiveTime),
    Duration(Duration),
    List(Vec<Value>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::BigInt(_) => "bigint",
            Self::Blob(_) => "blob",
            Self::Boolean(_) => "boolean",
            Self::Decimal(_) => "decimal",
            Self::Double(_) => "double",
            Self::Float(_) => "float",
            Self::SmallInt(_) => "smallint",
            Self::TinyInt(_) => "tinyint",
            Self::Int(_) => "int",
            Self::Varint(_) => "varint",
            Self::Timestamp(_) => "timestamp",
            Self::Uuid(_) => "uuid",
            Self::String(_) => "string",
            Self::Inet(_) => "inet",
            Self::Date(_) => "date",
            Self::Time(_) => "time",
            Self::Duration(_) => "duration",
            Self::List(_) => "list",
        }
    }
}

macro_rules! value_conversions {
    ($(($raw:ty, $val:ident),)*) => {
        $(
            impl From<$raw> for Value {
                fn from(raw: $raw) -> Self {
                    Value::$val(raw)
                }
            }
        )*
    };
}

value_conversions! {
    (i64, BigInt),
    (Vec<u8>, Blob),
    (bool, Boolean),
    (Decimal, Decimal),
    (f64, Double),
    (f32, Float),
    (i16, SmallInt),
    (i8, TinyInt),
    (i32, Int),
    (BigInt, Varint),
    (DateTime<Utc>, Timestamp),
    (String, String),
    (NaiveDate, Date),
    (NaiveTime, Time),
    (Duration, Duration),
    (Vec<Value>, List),
}

impl From<&str> for Value {
    fn from(raw: &str) -> Self {
        Value::String(raw.to_string())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(raw: Option<T>) -> Self {
        raw.map_or(Value::Null, Into::into)
    }
}

/// Renders the value in a JSON-like notation for display.
impl Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::BigInt(v) => write!(f, "{}", v),
            Self::Blob(bytes) => {
                f.write_str("\"0x")?;
                for byte in bytes {
                    write!(f, "{:02x}", byte)?;
                }
                f.write_char('"')
            }
            Self::Boolean(v) => write!(f, "{}", v),
            Self::Decimal(v) => write!(f, "{}", v),
            Self::Double(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{}", v),
            Self::SmallInt(v) => write!(f, "{}", v),
            Self::TinyInt(v) => write!(f, "{}", v),
            Self::Int(v) => write!(f, "{}", v),
            Self::Varint(v) => write!(f, "{}", v),
            Self::Timestamp(v) => write!(
                f,
                "\"{}\"",
                v.to_rfc3339_opts(SecondsFormat::Millis, true)
            ),
            Self::Uuid(v) | Self::String(v) | Self::Inet(v) => write!(f, "{:?}", v),
            Self::Date(v) => write!(f, "\"{}\"", v),
            Self::Time(v) => write!(f, "\"{}\"", v),
            Self::Duration(v) => write!(f, "\"{}\"", v),
            Self::List(values) => {
                f.write_char('[')?;
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", value)?;
                }
                f.write_char(']')
            }
        }
    }
}
