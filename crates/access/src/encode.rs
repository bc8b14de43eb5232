//! Native protocol encoders, the inverse of what a cursor reads. Used to
//! build RESULT bodies for fixtures and replays.

use {
    crate::result::{
        FLAG_GLOBAL_TABLES_SPEC, FLAG_HAS_MORE_PAGES, FLAG_NO_METADATA, RESULT_KIND_ROWS,
    },
    byteorder::{WriteBytesExt, BE},
    chrono::{Datelike, NaiveDate, NaiveTime, Timelike},
    def::{ColumnSchema, ColumnType, CqlDuration, Decimal},
    num_bigint::BigInt,
    std::net::IpAddr,
    uuid::Uuid,
};

const UNIX_EPOCH_DAYS_FROM_CE: i64 = 719_163;

/// Writes into a `Vec<u8>` never fail, so the helpers discard the `io::Result`.
trait WriteFrame: WriteBytesExt {
    fn put_int(&mut self, v: i32) {
        let _ = self.write_i32::<BE>(v);
    }

    fn put_short(&mut self, v: u16) {
        let _ = self.write_u16::<BE>(v);
    }

    fn put_string(&mut self, s: &str) {
        self.put_short(s.len() as u16);
        let _ = self.write_all(s.as_bytes());
    }

    fn put_bytes(&mut self, bytes: Option<&[u8]>) {
        match bytes {
            Some(bytes) => {
                self.put_int(bytes.len() as i32);
                let _ = self.write_all(bytes);
            }
            None => self.put_int(-1),
        }
    }

    fn put_type(&mut self, data_type: &ColumnType) {
        self.put_short(data_type.protocol_code().as_u16());
        match data_type {
            ColumnType::Custom(class) => self.put_string(class),
            ColumnType::List(element) | ColumnType::Set(element) => self.put_type(element),
            ColumnType::Map(key, value) => {
                self.put_type(key);
                self.put_type(value);
            }
            ColumnType::Udt {
                keyspace,
                name,
                fields,
            } => {
                self.put_string(keyspace);
                self.put_string(name);
                self.put_short(fields.len() as u16);
                for (field, ty) in fields {
                    self.put_string(field);
                    self.put_type(ty);
                }
            }
            ColumnType::Tuple(types) => {
                self.put_short(types.len() as u16);
                types.iter().for_each(|ty| self.put_type(ty));
            }
            _ => {}
        }
    }
}

impl WriteFrame for Vec<u8> {}

/// Builder for the body of a RESULT message of kind Rows.
#[derive(Debug, Clone, Default)]
pub struct RowsBody {
    schema: ColumnSchema,
    rows: Vec<Vec<Option<Vec<u8>>>>,
    paging_state: Option<Vec<u8>>,
    no_metadata: bool,
}

impl RowsBody {
    pub fn new(schema: ColumnSchema) -> Self {
        Self {
            schema,
            ..Self::default()
        }
    }

    pub fn row(mut self, cells: Vec<Option<Vec<u8>>>) -> Self {
        self.rows.push(cells);
        self
    }

    pub fn paging_state(mut self, state: Vec<u8>) -> Self {
        self.paging_state = Some(state);
        self
    }

    pub fn no_metadata(mut self) -> Self {
        self.no_metadata = true;
        self
    }

    pub fn encode(&self) -> Vec<u8> {
        let columns: Vec<_> = self.schema.iter().collect();
        let global = match columns.first() {
            Some(first) if !self.no_metadata => columns
                .iter()
                .all(|c| c.keyspace == first.keyspace && c.table == first.table)
                .then_some(first),
            _ => None,
        };

        let mut flags = 0;
        if global.is_some() {
            flags |= FLAG_GLOBAL_TABLES_SPEC;
        }
        if self.paging_state.is_some() {
            flags |= FLAG_HAS_MORE_PAGES;
        }
        if self.no_metadata {
            flags |= FLAG_NO_METADATA;
        }

        let mut buf = Vec::new();
        buf.put_int(RESULT_KIND_ROWS);
        buf.put_int(flags);
        buf.put_int(columns.len() as i32);
        if let Some(state) = &self.paging_state {
            buf.put_bytes(Some(state.as_slice()));
        }

        if !self.no_metadata {
            if let Some(spec) = global {
                buf.put_string(&spec.keyspace);
                buf.put_string(&spec.table);
            }
            for column in &columns {
                if global.is_none() {
                    buf.put_string(&column.keyspace);
                    buf.put_string(&column.table);
                }
                buf.put_string(&column.name);
                buf.put_type(&column.data_type);
            }
        }

        buf.put_int(self.rows.len() as i32);
        for cell in self.rows.iter().flatten() {
            buf.put_bytes(cell.as_deref());
        }

        buf
    }
}

pub fn bigint(v: i64) -> Vec<u8> {
    v.to_be_bytes().to_vec()
}

pub fn int(v: i32) -> Vec<u8> {
    v.to_be_bytes().to_vec()
}

pub fn smallint(v: i16) -> Vec<u8> {
    v.to_be_bytes().to_vec()
}

pub fn tinyint(v: i8) -> Vec<u8> {
    v.to_be_bytes().to_vec()
}

pub fn boolean(v: bool) -> Vec<u8> {
    vec![v as u8]
}

pub fn double(v: f64) -> Vec<u8> {
    v.to_be_bytes().to_vec()
}

pub fn float(v: f32) -> Vec<u8> {
    v.to_be_bytes().to_vec()
}

pub fn text(v: &str) -> Vec<u8> {
    v.as_bytes().to_vec()
}

pub fn varint(v: &BigInt) -> Vec<u8> {
    v.to_signed_bytes_be()
}

pub fn decimal(v: &Decimal) -> Vec<u8> {
    let mut buf = int(v.scale);
    buf.extend(varint(&v.unscaled));
    buf
}

pub fn timestamp(millis: i64) -> Vec<u8> {
    bigint(millis)
}

pub fn uuid(v: Uuid) -> Vec<u8> {
    v.as_bytes().to_vec()
}

pub fn inet(v: IpAddr) -> Vec<u8> {
    match v {
        IpAddr::V4(addr) => addr.octets().to_vec(),
        IpAddr::V6(addr) => addr.octets().to_vec(),
    }
}

pub fn date(v: NaiveDate) -> Vec<u8> {
    let days = v.num_days_from_ce() as i64 - UNIX_EPOCH_DAYS_FROM_CE;
    ((days + (1 << 31)) as u32).to_be_bytes().to_vec()
}

pub fn time(v: NaiveTime) -> Vec<u8> {
    let nanos = v.num_seconds_from_midnight() as i64 * 1_000_000_000 + v.nanosecond() as i64;
    bigint(nanos)
}

pub fn duration(v: CqlDuration) -> Vec<u8> {
    let mut buf = Vec::new();
    put_signed_vint(&mut buf, v.months as i64);
    put_signed_vint(&mut buf, v.days as i64);
    put_signed_vint(&mut buf, v.nanoseconds);
    buf
}

fn put_signed_vint(buf: &mut Vec<u8>, v: i64) {
    let n = ((v << 1) ^ (v >> 63)) as u64;
    let size = ((639 - (n | 1).leading_zeros() * 9) >> 6) as usize;
    let extra = size - 1;

    if extra == 0 {
        buf.push(n as u8);
        return;
    }

    let first = if extra == 8 {
        0xff
    } else {
        (0xff_u16 << (8 - extra)) as u8 | (n >> (8 * extra)) as u8
    };
    buf.push(first);
    buf.extend_from_slice(&n.to_be_bytes()[8 - extra..]);
}

pub fn list(elements: &[Option<Vec<u8>>]) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.put_int(elements.len() as i32);
    elements.iter().for_each(|e| buf.put_bytes(e.as_deref()));
    buf
}

pub fn set(elements: &[Option<Vec<u8>>]) -> Vec<u8> {
    list(elements)
}

pub fn map(entries: &[(Option<Vec<u8>>, Option<Vec<u8>>)]) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.put_int(entries.len() as i32);
    entries.iter().for_each(|(k, v)| {
        buf.put_bytes(k.as_deref());
        buf.put_bytes(v.as_deref());
    });
    buf
}

pub fn tuple(fields: &[Option<Vec<u8>>]) -> Vec<u8> {
    let mut buf = Vec::new();
    fields.iter().for_each(|f| buf.put_bytes(f.as_deref()));
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vint_sizes() {
        [(0i64, 1usize), (-1, 1), (63, 1), (64, 2), (-65, 2), (i64::MAX, 9), (i64::MIN, 9)]
            .into_iter()
            .for_each(|(v, size)| {
                let mut buf = Vec::new();
                put_signed_vint(&mut buf, v);
                assert_eq!(buf.len(), size, "vint size of {}", v);
            });
    }

    #[test]
    fn global_spec_only_for_a_single_table() {
        use def::ColumnSpec;

        let body = RowsBody::new(ColumnSchema::new(vec![
            ColumnSpec::new("ks", "t", "a", ColumnType::Int),
            ColumnSpec::new("ks", "t", "b", ColumnType::Int),
        ]))
        .encode();

        // kind, then flags
        assert_eq!(&body[4..8], &FLAG_GLOBAL_TABLES_SPEC.to_be_bytes());
    }
}
