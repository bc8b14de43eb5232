//! Decoding of single cell values from their native protocol encoding.

use {
    crate::error::{InvalidDataSnafu, Result, UnsupportedElementSnafu, Utf8Snafu},
    byteorder::{ByteOrder, BE},
    chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc},
    def::{ColumnType, CqlDuration, Decimal, ProtocolCode, Value},
    num_bigint::BigInt,
    snafu::prelude::*,
    std::net::{IpAddr, Ipv4Addr, Ipv6Addr},
    uuid::Uuid,
};

/// Day number of 1970-01-01 counted from 0001-01-01.
const UNIX_EPOCH_DAYS_FROM_CE: i64 = 719_163;
/// `date` values are unsigned with the epoch at the center of the range.
const DATE_EPOCH_OFFSET: i64 = 1 << 31;
const NANOS_PER_SECOND: i64 = 1_000_000_000;
const NANOS_PER_DAY: i64 = 86_400 * NANOS_PER_SECOND;

fn exact<'a>(bytes: &'a [u8], len: usize, data_type: &'static str) -> Result<&'a [u8]> {
    ensure!(
        bytes.len() == len,
        InvalidDataSnafu {
            data_type,
            details: format!("expected {} bytes, got {}", len, bytes.len()),
        }
    );
    Ok(bytes)
}

fn invalid<T>(data_type: &'static str, details: impl Into<String>) -> Result<T> {
    InvalidDataSnafu {
        data_type,
        details: details.into(),
    }
    .fail()
}

pub fn bigint(bytes: &[u8]) -> Result<i64> {
    Ok(BE::read_i64(exact(bytes, 8, "bigint")?))
}

pub fn int(bytes: &[u8]) -> Result<i32> {
    Ok(BE::read_i32(exact(bytes, 4, "int")?))
}

pub fn smallint(bytes: &[u8]) -> Result<i16> {
    Ok(BE::read_i16(exact(bytes, 2, "smallint")?))
}

pub fn tinyint(bytes: &[u8]) -> Result<i8> {
    Ok(exact(bytes, 1, "tinyint")?[0] as i8)
}

pub fn boolean(bytes: &[u8]) -> Result<bool> {
    Ok(exact(bytes, 1, "boolean")?[0] != 0)
}

pub fn double(bytes: &[u8]) -> Result<f64> {
    Ok(BE::read_f64(exact(bytes, 8, "double")?))
}

pub fn float(bytes: &[u8]) -> Result<f32> {
    Ok(BE::read_f32(exact(bytes, 4, "float")?))
}

pub fn varint(bytes: &[u8]) -> BigInt {
    BigInt::from_signed_bytes_be(bytes)
}

pub fn decimal(bytes: &[u8]) -> Result<Decimal> {
    if bytes.len() < 4 {
        return invalid("decimal", format!("expected at least 4 bytes, got {}", bytes.len()));
    }

    let (scale, unscaled) = bytes.split_at(4);
    Ok(Decimal {
        unscaled: varint(unscaled),
        scale: BE::read_i32(scale),
    })
}

pub fn timestamp(bytes: &[u8]) -> Result<DateTime<Utc>> {
    let millis = BE::read_i64(exact(bytes, 8, "timestamp")?);

    match Utc.timestamp_millis_opt(millis).single() {
        Some(instant) => Ok(instant),
        None => invalid("timestamp", format!("{} ms is out of range", millis)),
    }
}

pub fn uuid(bytes: &[u8]) -> Result<Uuid> {
    let mut raw = [0u8; 16];
    raw.copy_from_slice(exact(bytes, 16, "uuid")?);
    Ok(Uuid::from_bytes(raw))
}

pub fn string(bytes: &[u8]) -> Result<String> {
    String::from_utf8(bytes.to_vec()).context(Utf8Snafu { what: "text value" })
}

pub fn inet(bytes: &[u8]) -> Result<IpAddr> {
    Ok(match bytes.len() {
        4 => IpAddr::V4(Ipv4Addr::new(bytes[0], bytes[1], bytes[2], bytes[3])),
        16 => IpAddr::V6(Ipv6Addr::from(BE::read_u128(bytes))),
        len => return invalid("inet", format!("expected 4 or 16 bytes, got {}", len)),
    })
}

pub fn date(bytes: &[u8]) -> Result<NaiveDate> {
    let days = BE::read_u32(exact(bytes, 4, "date")?) as i64 - DATE_EPOCH_OFFSET;

    i32::try_from(days + UNIX_EPOCH_DAYS_FROM_CE)
        .ok()
        .and_then(NaiveDate::from_num_days_from_ce_opt)
        .map_or_else(
            || invalid("date", format!("{} days from epoch is out of range", days)),
            Ok,
        )
}

pub fn time(bytes: &[u8]) -> Result<NaiveTime> {
    let nanos = BE::read_i64(exact(bytes, 8, "time")?);
    if !(0..NANOS_PER_DAY).contains(&nanos) {
        return invalid("time", format!("{} ns is not a time of day", nanos));
    }

    let secs = (nanos / NANOS_PER_SECOND) as u32;
    let frac = (nanos % NANOS_PER_SECOND) as u32;
    NaiveTime::from_num_seconds_from_midnight_opt(secs, frac)
        .map_or_else(|| invalid("time", "out of range"), Ok)
}

pub fn duration(mut bytes: &[u8]) -> Result<CqlDuration> {
    let months = read_signed_vint(&mut bytes)?;
    let days = read_signed_vint(&mut bytes)?;
    let nanoseconds = read_signed_vint(&mut bytes)?;

    if !bytes.is_empty() {
        return invalid("duration", format!("{} trailing bytes", bytes.len()));
    }

    Ok(CqlDuration {
        months: i32::try_from(months).or_else(|_| invalid("duration", "months overflow"))?,
        days: i32::try_from(days).or_else(|_| invalid("duration", "days overflow"))?,
        nanoseconds,
    })
}

/// Reads a variable-length integer: the count of leading one bits in the
/// first byte is the count of extra bytes that follow.
pub(crate) fn read_unsigned_vint(bytes: &mut &[u8]) -> Result<u64> {
    let Some(&first) = bytes.first() else {
        return invalid("vint", "no bytes left");
    };

    let extra = first.leading_ones() as usize;
    if bytes.len() < 1 + extra {
        return invalid("vint", format!("expected {} bytes, got {}", 1 + extra, bytes.len()));
    }

    let mut value = first as u64 & (0xff >> extra);
    for &byte in &bytes[1..=extra] {
        value = (value << 8) | byte as u64;
    }

    *bytes = &bytes[1 + extra..];
    Ok(value)
}

fn read_signed_vint(bytes: &mut &[u8]) -> Result<i64> {
    let n = read_unsigned_vint(bytes)?;
    Ok((n >> 1) as i64 ^ -((n & 1) as i64))
}

/// Splits a `[bytes]` value off the front of `src`, `None` for a negative length.
pub(crate) fn split_bytes<'a>(
    src: &mut &'a [u8],
    data_type: &'static str,
) -> Result<Option<&'a [u8]>> {
    if src.len() < 4 {
        return invalid(data_type, "truncated element length");
    }

    let len = BE::read_i32(&src[..4]);
    *src = &src[4..];

    if len < 0 {
        return Ok(None);
    }

    let len = len as usize;
    if src.len() < len {
        return invalid(data_type, format!("element of {} bytes, {} left", len, src.len()));
    }

    let (element, rest) = src.split_at(len);
    *src = rest;
    Ok(Some(element))
}

fn element_count(src: &mut &[u8], data_type: &'static str) -> Result<usize> {
    if src.len() < 4 {
        return invalid(data_type, "truncated element count");
    }

    let count = BE::read_i32(&src[..4]);
    *src = &src[4..];
    usize::try_from(count).or_else(|_| invalid(data_type, format!("negative count {}", count)))
}

/// Splits a tuple or UDT value into its fields. Missing trailing fields are absent.
pub fn fields(
    mut bytes: &[u8],
    count: usize,
    data_type: &'static str,
) -> Result<Vec<Option<Vec<u8>>>> {
    let mut fields = Vec::with_capacity(count);
    for _ in 0..count {
        if bytes.is_empty() {
            fields.push(None);
            continue;
        }
        fields.push(split_bytes(&mut bytes, data_type)?.map(<[u8]>::to_vec));
    }

    if !bytes.is_empty() {
        return invalid(data_type, format!("{} trailing bytes", bytes.len()));
    }

    Ok(fields)
}

/// Text, blobs, tuples and UDTs keep an empty buffer as a value. Every other
/// type reads it as absent.
fn is_empty_null(code: ProtocolCode) -> bool {
    !matches!(
        code,
        ProtocolCode::Ascii
            | ProtocolCode::Varchar
            | ProtocolCode::Blob
            | ProtocolCode::Custom
            | ProtocolCode::Tuple
            | ProtocolCode::Udt
    )
}

pub(crate) fn present(code: ProtocolCode, bytes: Option<&[u8]>) -> Option<&[u8]> {
    bytes.filter(|b| !(b.is_empty() && is_empty_null(code)))
}

/// Decodes a value of any type into its generic representation. This is
/// what collection elements and tuple fields go through.
pub fn object(data_type: &ColumnType, bytes: Option<&[u8]>) -> Result<Value> {
    let code = data_type.protocol_code();
    let Some(bytes) = present(code, bytes) else {
        return Ok(match data_type {
            ColumnType::List(_) | ColumnType::Set(_) | ColumnType::Map(..) => Value::List(vec![]),
            _ => Value::Null,
        });
    };

    Ok(match data_type {
        ColumnType::BigInt | ColumnType::Counter => Value::BigInt(bigint(bytes)?),
        ColumnType::Blob | ColumnType::Custom(_) => Value::Blob(bytes.to_vec()),
        ColumnType::Boolean => Value::Boolean(boolean(bytes)?),
        ColumnType::Decimal => Value::Decimal(decimal(bytes)?),
        ColumnType::Double => Value::Double(double(bytes)?),
        ColumnType::Float => Value::Float(float(bytes)?),
        ColumnType::SmallInt => Value::SmallInt(smallint(bytes)?),
        ColumnType::TinyInt => Value::TinyInt(tinyint(bytes)?),
        ColumnType::Int => Value::Int(int(bytes)?),
        ColumnType::Varint => Value::Varint(varint(bytes)),
        ColumnType::Timestamp => Value::Timestamp(timestamp(bytes)?),
        ColumnType::Uuid | ColumnType::TimeUuid => Value::Uuid(uuid(bytes)?.to_string()),
        ColumnType::Ascii | ColumnType::Varchar => Value::String(string(bytes)?),
        ColumnType::Inet => Value::Inet(inet(bytes)?.to_string()),
        ColumnType::Date => Value::Date(date(bytes)?),
        ColumnType::Time => Value::Time(time(bytes)?),
        ColumnType::Duration => {
            let duration = duration(bytes)?;
            match duration.total_nanoseconds() {
                Some(nanos) => Value::Duration(chrono::Duration::nanoseconds(nanos)),
                None => return invalid("duration", "total nanoseconds overflow"),
            }
        }

        ColumnType::List(element) | ColumnType::Set(element) => {
            let mut src = bytes;
            let count = element_count(&mut src, "list")?;
            let mut values = Vec::with_capacity(count.min(src.len() / 4));
            for _ in 0..count {
                let cell = split_bytes(&mut src, "list")?;
                values.push(object(element, cell)?);
            }
            Value::List(values)
        }
        ColumnType::Map(key, value) => {
            let mut src = bytes;
            let count = element_count(&mut src, "map")?;
            let mut entries = Vec::with_capacity(count.min(src.len() / 8));
            for _ in 0..count {
                let k = object(key, split_bytes(&mut src, "map")?)?;
                let v = object(value, split_bytes(&mut src, "map")?)?;
                entries.push(Value::List(vec![k, v]));
            }
            Value::List(entries)
        }
        ColumnType::Tuple(types) => Value::List(
            fields(bytes, types.len(), "tuple")?
                .iter()
                .zip(types)
                .map(|(cell, ty)| object(ty, cell.as_deref()))
                .collect::<Result<_>>()?,
        ),
        ColumnType::Udt { .. } => {
            return UnsupportedElementSnafu {
                data_type: data_type.clone(),
            }
            .fail()
        }
    })
}

#[cfg(test)]
mod tests {
    use {super::*, crate::encode};

    #[test]
    fn fixed_width_values() {
        assert_eq!(bigint(&encode::bigint(-42)).unwrap(), -42);
        assert_eq!(int(&encode::int(i32::MIN)).unwrap(), i32::MIN);
        assert_eq!(smallint(&encode::smallint(-300)).unwrap(), -300);
        assert_eq!(tinyint(&[0xff]).unwrap(), -1);
        assert!(boolean(&[0x02]).unwrap());
        assert!(!boolean(&[0x00]).unwrap());
        assert_eq!(double(&encode::double(1.5)).unwrap(), 1.5);
        assert_eq!(float(&encode::float(-0.25)).unwrap(), -0.25);

        assert!(matches!(
            bigint(&[0, 1, 2]),
            Err(crate::Error::InvalidData { data_type: "bigint", .. })
        ));
    }

    #[test]
    fn decimal_and_varint() {
        // scale 2, unscaled -12345
        let bytes = [0, 0, 0, 2, 0xcf, 0xc7];
        let value = decimal(&bytes).unwrap();
        assert_eq!(value.to_string(), "-123.45");

        assert_eq!(varint(&[0x01, 0x00]), BigInt::from(256));
        assert_eq!(varint(&[0xff]), BigInt::from(-1));
        assert!(decimal(&[0, 0]).is_err());
    }

    #[test]
    fn temporal_values() {
        let epoch = date(&encode::date(NaiveDate::from_ymd_opt(1970, 1, 1).unwrap())).unwrap();
        assert_eq!(epoch, NaiveDate::from_ymd_opt(1970, 1, 1).unwrap());

        // 2^31 - 1 is the day before the epoch
        assert_eq!(
            date(&[0x7f, 0xff, 0xff, 0xff]).unwrap(),
            NaiveDate::from_ymd_opt(1969, 12, 31).unwrap()
        );

        let noon = NaiveTime::from_hms_milli_opt(12, 30, 15, 250).unwrap();
        assert_eq!(time(&encode::time(noon)).unwrap(), noon);
        assert!(time(&encode::bigint(NANOS_PER_DAY)).is_err());

        let instant = timestamp(&encode::bigint(1_600_000_000_123)).unwrap();
        assert_eq!(instant.timestamp_millis(), 1_600_000_000_123);
    }

    #[test]
    fn uuid_and_inet() {
        let id = Uuid::parse_str("6ba7b810-9dad-11d1-80b4-00c04fd430c8").unwrap();
        assert_eq!(uuid(id.as_bytes()).unwrap(), id);
        assert!(uuid(&[1, 2, 3]).is_err());

        assert_eq!(inet(&[10, 0, 0, 1]).unwrap().to_string(), "10.0.0.1");
        let mut v6 = [0u8; 16];
        v6[15] = 1;
        assert_eq!(inet(&v6).unwrap().to_string(), "::1");
        assert!(inet(&[1, 2, 3]).is_err());
    }

    #[test]
    fn vints() {
        [0i64, 1, -1, 63, -64, 64, 1 << 20, i64::MAX, i64::MIN]
            .into_iter()
            .for_each(|n| {
                let bytes = encode::duration(CqlDuration::new(0, 0, n));
                let decoded = duration(&bytes).unwrap();
                assert_eq!(decoded.nanoseconds, n);
            });

        let d = CqlDuration::new(14, -3, 5_000);
        assert_eq!(duration(&encode::duration(d)).unwrap(), d);

        assert!(duration(&[0x02, 0x04]).is_err());
    }

    #[test]
    fn nested_collections() {
        let ty = ColumnType::map(ColumnType::Varchar, ColumnType::list(ColumnType::Int));
        let bytes = encode::map(&[
            (
                Some(encode::text("a")),
                Some(encode::list(&[Some(encode::int(1)), Some(encode::int(2))])),
            ),
            (Some(encode::text("b")), None),
        ]);

        assert_eq!(
            object(&ty, Some(&bytes)).unwrap(),
            Value::List(vec![
                Value::List(vec![
                    "a".into(),
                    Value::List(vec![Value::Int(1), Value::Int(2)])
                ]),
                Value::List(vec!["b".into(), Value::List(vec![])]),
            ])
        );
    }

    #[test]
    fn absent_and_empty_cells() {
        assert_eq!(object(&ColumnType::Int, None).unwrap(), Value::Null);
        assert_eq!(object(&ColumnType::Int, Some(&[])).unwrap(), Value::Null);
        assert_eq!(
            object(&ColumnType::Varchar, Some(&[])).unwrap(),
            Value::String(String::new())
        );
        assert_eq!(
            object(&ColumnType::set(ColumnType::Int), None).unwrap(),
            Value::List(vec![])
        );
        assert_eq!(
            object(&ColumnType::Tuple(vec![ColumnType::Int]), None).unwrap(),
            Value::Null
        );
    }

    #[test]
    fn tuple_with_missing_trailing_field() {
        let ty = ColumnType::Tuple(vec![ColumnType::Int, ColumnType::Varchar]);
        let bytes = encode::tuple(&[Some(encode::int(7))]);

        assert_eq!(
            object(&ty, Some(&bytes)).unwrap(),
            Value::List(vec![Value::Int(7), Value::Null])
        );
    }

    #[test]
    fn nested_udt_is_rejected() {
        let ty = ColumnType::list(ColumnType::Udt {
            keyspace: "ks".into(),
            name: "point".into(),
            fields: vec![("x".into(), ColumnType::Int)],
        });
        let bytes = encode::list(&[Some(encode::tuple(&[Some(encode::int(1))]))]);

        assert!(matches!(
            object(&ty, Some(&bytes)),
            Err(crate::Error::UnsupportedElement { .. })
        ));
    }
}
