use {
    snafu::prelude::*,
    std::fmt::{self, Display},
};

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("unknown protocol type code 0x{:04x}", code))]
    InvalidType { code: u16 },
}

pub type Result<T> = std::result::Result<T, Error>;

macro_rules! define_protocol_codes {
    ($($var:ident = $code:literal => $name:literal,)*) => {
        /// Type option ids of the native protocol (v4/v5).
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u16)]
        pub enum ProtocolCode {
            $($var = $code,)*
        }

        impl ProtocolCode {
            pub const fn as_u16(self) -> u16 {
                self as u16
            }

            pub const fn name(self) -> &'static str {
                match self {
                    $(Self::$var => $name,)*
                }
            }
        }

        impl TryFrom<u16> for ProtocolCode {
            type Error = Error;

            fn try_from(code: u16) -> Result<Self> {
                match code {
                    $($code => Ok(Self::$var),)*
                    _ => InvalidTypeSnafu { code }.fail(),
                }
            }
        }
    };
}

define_protocol_codes! {
    Custom = 0x0000 => "custom",
    Ascii = 0x0001 => "ascii",
    BigInt = 0x0002 => "bigint",
    Blob = 0x0003 => "blob",
    Boolean = 0x0004 => "boolean",
    Counter = 0x0005 => "counter",
    Decimal = 0x0006 => "decimal",
    Double = 0x0007 => "double",
    Float = 0x0008 => "float",
    Int = 0x0009 => "int",
    Timestamp = 0x000B => "timestamp",
    Uuid = 0x000C => "uuid",
    Varchar = 0x000D => "text",
    Varint = 0x000E => "varint",
    TimeUuid = 0x000F => "timeuuid",
    Inet = 0x0010 => "inet",
    Date = 0x0011 => "date",
    Time = 0x0012 => "time",
    SmallInt = 0x0013 => "smallint",
    TinyInt = 0x0014 => "tinyint",
    Duration = 0x0015 => "duration",
    List = 0x0020 => "list",
    Map = 0x0021 => "map",
    Set = 0x0022 => "set",
    Udt = 0x0030 => "udt",
    Tuple = 0x0031 => "tuple",
}

impl Display for ProtocolCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A declared column type as carried in result metadata.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ColumnType {
    Custom(String),
    Ascii,
    BigInt,
    Blob,
    Boolean,
    Counter,
    Decimal,
    Double,
    Float,
    Int,
    Timestamp,
    Uuid,
    Varchar,
    Varint,
    TimeUuid,
    Inet,
    Date,
    Time,
    SmallInt,
    TinyInt,
    Duration,

    List(Box<ColumnType>),
    Map(Box<ColumnType>, Box<ColumnType>),
    Set(Box<ColumnType>),
    Udt {
        keyspace: String,
        name: String,
        fields: Vec<(String, ColumnType)>,
    },
    Tuple(Vec<ColumnType>),
}

impl ColumnType {
    pub fn protocol_code(&self) -> ProtocolCode {
        match self {
            Self::Custom(_) => ProtocolCode::Custom,
            Self::Ascii => ProtocolCode::Ascii,
            Self::BigInt => ProtocolCode::BigInt,
            Self::Blob => ProtocolCode::Blob,
            Self::Boolean => ProtocolCode::Boolean,
            Self::Counter => ProtocolCode::Counter,
            Self::Decimal => ProtocolCode::Decimal,
            Self::Double => ProtocolCode::Double,
            Self::Float => ProtocolCode::Float,
            Self::Int => ProtocolCode::Int,
            Self::Timestamp => ProtocolCode::Timestamp,
            Self::Uuid => ProtocolCode::Uuid,
            Self::Varchar => ProtocolCode::Varchar,
            Self::Varint => ProtocolCode::Varint,
            Self::TimeUuid => ProtocolCode::TimeUuid,
            Self::Inet => ProtocolCode::Inet,
            Self::Date => ProtocolCode::Date,
            Self::Time => ProtocolCode::Time,
            Self::SmallInt => ProtocolCode::SmallInt,
            Self::TinyInt => ProtocolCode::TinyInt,
            Self::Duration => ProtocolCode::Duration,

            Self::List(_) => ProtocolCode::List,
            Self::Map(..) => ProtocolCode::Map,
            Self::Set(_) => ProtocolCode::Set,
            Self::Udt { .. } => ProtocolCode::Udt,
            Self::Tuple(_) => ProtocolCode::Tuple,
        }
    }

    /// Builds the type for a code that carries no parameters.
    pub fn simple(code: ProtocolCode) -> Option<Self> {
        Some(match code {
            ProtocolCode::Ascii => Self::Ascii,
            ProtocolCode::BigInt => Self::BigInt,
            ProtocolCode::Blob => Self::Blob,
            ProtocolCode::Boolean => Self::Boolean,
            ProtocolCode::Counter => Self::Counter,
            ProtocolCode::Decimal => Self::Decimal,
            ProtocolCode::Double => Self::Double,
            ProtocolCode::Float => Self::Float,
            ProtocolCode::Int => Self::Int,
            ProtocolCode::Timestamp => Self::Timestamp,
            ProtocolCode::Uuid => Self::Uuid,
            ProtocolCode::Varchar => Self::Varchar,
            ProtocolCode::Varint => Self::Varint,
            ProtocolCode::TimeUuid => Self::TimeUuid,
            ProtocolCode::Inet => Self::Inet,
            ProtocolCode::Date => Self::Date,
            ProtocolCode::Time => Self::Time,
            ProtocolCode::SmallInt => Self::SmallInt,
            ProtocolCode::TinyInt => Self::TinyInt,
            ProtocolCode::Duration => Self::Duration,

            ProtocolCode::Custom
            | ProtocolCode::List
            | ProtocolCode::Map
            | ProtocolCode::Set
            | ProtocolCode::Udt
            | ProtocolCode::Tuple => return None,
        })
    }

    pub fn list(element: ColumnType) -> Self {
        Self::List(Box::new(element))
    }

    pub fn set(element: ColumnType) -> Self {
        Self::Set(Box::new(element))
    }

    pub fn map(key: ColumnType, value: ColumnType) -> Self {
        Self::Map(Box::new(key), Box::new(value))
    }
}

impl Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Custom(class) => write!(f, "'{}'", class),
            Self::List(element) => write!(f, "list<{}>", element),
            Self::Set(element) => write!(f, "set<{}>", element),
            Self::Map(key, value) => write!(f, "map<{}, {}>", key, value),
            Self::Udt { keyspace, name, .. } => write!(f, "{}.{}", keyspace, name),
            Self::Tuple(elements) => {
                f.write_str("tuple<")?;
                for (i, element) in elements.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", element)?;
                }
                f.write_str(">")
            }
            simple => f.write_str(simple.protocol_code().name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_code_from_u16() {
        let code: ProtocolCode = 0x0015u16.try_into().unwrap();
        assert_eq!(code, ProtocolCode::Duration);
        assert_eq!(ProtocolCode::Tuple.as_u16(), 0x0031);

        // 0x000A was `text` before protocol v3
        assert!(ProtocolCode::try_from(0x000Au16).is_err());
        assert!(ProtocolCode::try_from(0x0040u16).is_err());
    }

    #[test]
    fn simple_types_keep_their_code() {
        (0x0000u16..=0x0031)
            .filter_map(|code| ProtocolCode::try_from(code).ok())
            .filter_map(|code| ColumnType::simple(code).map(|ty| (code, ty)))
            .for_each(|(code, ty)| assert_eq!(ty.protocol_code(), code));
    }

    #[test]
    fn display_nested_types() {
        let ty = ColumnType::map(
            ColumnType::Varchar,
            ColumnType::list(ColumnType::Tuple(vec![ColumnType::Int, ColumnType::Uuid])),
        );
        assert_eq!(ty.to_string(), "map<text, list<tuple<int, uuid>>>");

        let udt = ColumnType::Udt {
            keyspace: "ks".to_string(),
            name: "address".to_string(),
            fields: vec![("street".to_string(), ColumnType::Varchar)],
        };
        assert_eq!(udt.to_string(), "ks.address");
        assert_eq!(
            ColumnType::Custom("org.apache.cassandra.db.marshal.DynamicCompositeType".into())
                .to_string(),
            "'org.apache.cassandra.db.marshal.DynamicCompositeType'"
        );
    }
}
