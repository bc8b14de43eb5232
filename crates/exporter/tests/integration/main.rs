use {
    access::{encode::{self, RowsBody}, RowsCursor},
    converter::convert_row,
    def::{ColumnSchema, ColumnSpec, ColumnType, Record, Value},
    exporter::{
        Error, ExportOptions, Exporter, LocalStorage, RecordReader, Storage, TempSink,
    },
    std::{
        fs,
        io::{self, Write},
        path::Path,
    },
    tempfile::tempdir,
    url::Url,
};

fn users_schema() -> ColumnSchema {
    ColumnSchema::new(vec![
        ColumnSpec::new("app", "users", "id", ColumnType::BigInt),
        ColumnSpec::new("app", "users", "name", ColumnType::Varchar),
    ])
}

fn users_body() -> Vec<u8> {
    RowsBody::new(users_schema())
        .row(vec![Some(encode::bigint(1)), Some(encode::text("a"))])
        .row(vec![Some(encode::bigint(2)), None])
        .encode()
}

fn users() -> Vec<Record> {
    vec![
        [("id", Value::BigInt(1)), ("name", "a".into())].into_iter().collect(),
        [("id", Value::BigInt(2)), ("name", Value::Null)].into_iter().collect(),
    ]
}

fn fetch() -> ExportOptions {
    ExportOptions {
        fetch: true,
        ..ExportOptions::default()
    }
}

fn store() -> ExportOptions {
    ExportOptions {
        store: true,
        ..ExportOptions::default()
    }
}

fn fetch_one() -> ExportOptions {
    ExportOptions {
        fetch_one: true,
        ..ExportOptions::default()
    }
}

fn count_files(dir: &Path) -> usize {
    fs::read_dir(dir).unwrap().count()
}

#[test]
fn bounded_list() {
    let dir = tempdir().unwrap();
    let exporter = Exporter::new(LocalStorage::new(dir.path()).unwrap());
    let body = users_body();
    let len = body.len() as i32;

    let mut cursor = RowsCursor::new(body).unwrap();
    let result = exporter.export(&mut cursor, &fetch()).unwrap();

    assert_eq!(result.records, Some(users()));
    assert_eq!(result.record_count, Some(2));
    assert_eq!(result.byte_size, len);
    assert!(result.single_record.is_none());
    assert!(result.destination.is_none());
}

#[test]
fn single_record() {
    let dir = tempdir().unwrap();
    let exporter = Exporter::new(LocalStorage::new(dir.path()).unwrap());

    let mut cursor = RowsCursor::new(users_body()).unwrap();
    let result = exporter.export(&mut cursor, &fetch_one()).unwrap();

    assert_eq!(result.single_record, Some(users().remove(0)));
    assert_eq!(result.record_count, Some(1));
    assert!(result.records.is_none());
}

#[test]
fn single_record_on_empty_result() {
    let dir = tempdir().unwrap();
    let exporter = Exporter::new(LocalStorage::new(dir.path()).unwrap());

    let mut cursor = RowsCursor::new(RowsBody::new(users_schema()).encode()).unwrap();
    let err = exporter.export(&mut cursor, &fetch_one()).unwrap_err();

    assert!(matches!(err, Error::EmptyResult { .. }));
}

#[test]
fn streamed_round_trip() {
    let dir = tempdir().unwrap();
    let storage = LocalStorage::new(dir.path()).unwrap();
    let exporter = Exporter::new(&storage);

    let mut cursor = RowsCursor::new(users_body()).unwrap();
    let result = exporter.export(&mut cursor, &store()).unwrap();

    assert_eq!(result.record_count, Some(2));
    assert!(result.records.is_none());

    let path = result.destination.unwrap().to_file_path().unwrap();
    assert!(path.starts_with(storage.data_dir()));

    let file = io::BufReader::new(fs::File::open(path).unwrap());
    let records = RecordReader::new(file)
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap();

    let expected = RowsCursor::new(users_body())
        .unwrap()
        .map(|row| convert_row(&row.unwrap(), &users_schema()).unwrap())
        .collect::<Vec<_>>();
    assert_eq!(records, expected);
    assert_eq!(records, users());
    assert_eq!(count_files(&storage.root().join("tmp")), 0);
}

#[test]
fn streamed_nested_values() {
    let dir = tempdir().unwrap();
    let storage = LocalStorage::new(dir.path()).unwrap();
    let exporter = Exporter::new(&storage);

    let schema = ColumnSchema::new(vec![
        ColumnSpec::new(
            "app",
            "t",
            "scores",
            ColumnType::map(ColumnType::Varchar, ColumnType::Int),
        ),
        ColumnSpec::new(
            "app",
            "t",
            "pair",
            ColumnType::Tuple(vec![ColumnType::Int, ColumnType::Varchar]),
        ),
        ColumnSpec::new("app", "t", "tags", ColumnType::set(ColumnType::Varchar)),
    ]);
    let body = RowsBody::new(schema)
        .row(vec![
            Some(encode::map(&[
                (Some(encode::text("x")), Some(encode::int(1))),
                (Some(encode::text("y")), Some(encode::int(2))),
            ])),
            Some(encode::tuple(&[Some(encode::int(1)), Some(encode::text("x"))])),
            None,
        ])
        .encode();

    let mut cursor = RowsCursor::new(body).unwrap();
    let result = exporter.export(&mut cursor, &store()).unwrap();

    let path = result.destination.unwrap().to_file_path().unwrap();
    let records = RecordReader::new(fs::File::open(path).unwrap())
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap();

    let expected: Record = [
        (
            "scores",
            Value::List(vec![
                Value::List(vec!["x".into(), Value::Int(1)]),
                Value::List(vec!["y".into(), Value::Int(2)]),
            ]),
        ),
        ("pair", Value::List(vec![Value::Int(1), "x".into()])),
        ("tags", Value::List(vec![])),
    ]
    .into_iter()
    .collect();
    assert_eq!(records, vec![expected]);
}

#[test]
fn failed_conversion_publishes_nothing() {
    let dir = tempdir().unwrap();
    let storage = LocalStorage::new(dir.path()).unwrap();
    let exporter = Exporter::new(&storage);

    let schema = ColumnSchema::new(vec![
        ColumnSpec::new("app", "t", "id", ColumnType::Int),
        ColumnSpec::new("app", "t", "shape", ColumnType::Custom("org.example.Shape".into())),
    ]);
    let body = RowsBody::new(schema)
        .row(vec![Some(encode::int(1)), Some(vec![1, 2, 3])])
        .encode();

    let mut cursor = RowsCursor::new(body).unwrap();
    let err = exporter.export(&mut cursor, &store()).unwrap_err();

    match err {
        Error::Convert {
            row: 0,
            source: converter::Error::UnsupportedType { column, .. },
        } => assert_eq!(column, "shape"),
        other => panic!("unexpected error: {}", other),
    }
    assert_eq!(count_files(&storage.data_dir()), 0);
    assert_eq!(count_files(&storage.root().join("tmp")), 0);
}

#[test]
fn no_mode_reads_nothing() {
    let dir = tempdir().unwrap();
    let exporter = Exporter::new(LocalStorage::new(dir.path()).unwrap());

    let mut cursor = RowsCursor::new(users_body()).unwrap().with_response_size(4096);
    let result = exporter.export(&mut cursor, &ExportOptions::default()).unwrap();

    assert_eq!(result.byte_size, 4096);
    assert!(result.single_record.is_none());
    assert!(result.records.is_none());
    assert!(result.destination.is_none());
    assert!(result.record_count.is_none());
    assert_eq!(cursor.remaining(), 2);
}

#[test]
fn precedence_over_several_flags() {
    let dir = tempdir().unwrap();
    let exporter = Exporter::new(LocalStorage::new(dir.path()).unwrap());

    let options = ExportOptions {
        fetch_one: true,
        store: true,
        fetch: true,
    };
    let mut cursor = RowsCursor::new(users_body()).unwrap();
    let result = exporter.export(&mut cursor, &options).unwrap();

    assert_eq!(result.record_count, Some(1));
    assert!(result.single_record.is_some());
    assert!(result.destination.is_none());
}

struct FailingPublish(LocalStorage);

impl Storage for FailingPublish {
    type Sink = TempSink;

    fn temp_file(&self, extension: &str) -> io::Result<TempSink> {
        self.0.temp_file(extension)
    }

    fn publish(&self, _sink: TempSink) -> io::Result<Url> {
        Err(io::Error::new(io::ErrorKind::Other, "disk full"))
    }
}

#[test]
fn publish_failure() {
    let dir = tempdir().unwrap();
    let storage = LocalStorage::new(dir.path()).unwrap();
    let exporter = Exporter::new(FailingPublish(storage.clone()));

    let mut cursor = RowsCursor::new(users_body()).unwrap();
    let err = exporter.export(&mut cursor, &store()).unwrap_err();

    assert!(matches!(err, Error::StorageWrite { stage: "publish", .. }));
    assert_eq!(count_files(&storage.root().join("tmp")), 0);
    assert_eq!(count_files(&storage.data_dir()), 0);
}

/// Accepts `budget` bytes, then fails every write.
struct ShortSink {
    inner: TempSink,
    budget: usize,
}

impl Write for ShortSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.len() > self.budget {
            return Err(io::Error::new(io::ErrorKind::Other, "no space left"));
        }
        self.budget -= buf.len();
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

struct ShortStorage {
    inner: LocalStorage,
    budget: usize,
}

impl Storage for ShortStorage {
    type Sink = ShortSink;

    fn temp_file(&self, extension: &str) -> io::Result<ShortSink> {
        Ok(ShortSink {
            inner: self.inner.temp_file(extension)?,
            budget: self.budget,
        })
    }

    fn publish(&self, sink: ShortSink) -> io::Result<Url> {
        self.inner.publish(sink.inner)
    }
}

#[test]
fn write_failure_publishes_nothing() {
    let dir = tempdir().unwrap();
    let storage = LocalStorage::new(dir.path()).unwrap();
    // Room for the file header only, so the first record write fails.
    let exporter = Exporter::new(ShortStorage {
        inner: storage.clone(),
        budget: 5,
    });

    let mut cursor = RowsCursor::new(users_body()).unwrap();
    let err = exporter.export(&mut cursor, &store()).unwrap_err();

    assert!(matches!(err, Error::StorageWrite { stage: "write", .. }));
    assert_eq!(count_files(&storage.root().join("tmp")), 0);
    assert_eq!(count_files(&storage.data_dir()), 0);
}
