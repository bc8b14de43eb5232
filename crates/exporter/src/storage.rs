use {
    std::{
        fs,
        io::{self, BufWriter, Write},
        path::{Path, PathBuf},
    },
    tempfile::NamedTempFile,
    tracing::debug,
    url::Url,
};

const TEMP_DIR: &str = "tmp";
const DATA_DIR: &str = "data";

/// Durable storage for streamed exports.
///
/// Records are written to a temporary sink first. Nothing is visible to
/// readers until [`Storage::publish`] takes the sink over, so a sink dropped
/// on an error path leaves no artifact behind.
pub trait Storage {
    type Sink: Write;

    fn temp_file(&self, extension: &str) -> io::Result<Self::Sink>;

    /// Commits a sink and returns its location.
    fn publish(&self, sink: Self::Sink) -> io::Result<Url>;
}

impl<S: Storage + ?Sized> Storage for &S {
    type Sink = S::Sink;

    fn temp_file(&self, extension: &str) -> io::Result<Self::Sink> {
        (**self).temp_file(extension)
    }

    fn publish(&self, sink: Self::Sink) -> io::Result<Url> {
        (**self).publish(sink)
    }
}

/// A buffered temporary file. Dropping it removes the file.
#[derive(Debug)]
pub struct TempSink {
    file: BufWriter<NamedTempFile>,
    extension: String,
}

impl TempSink {
    pub fn path(&self) -> &Path {
        self.file.get_ref().path()
    }
}

impl Write for TempSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

/// Storage over a local directory: sinks live in `<root>/tmp` and are
/// published into `<root>/data` under a random name.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: impl AsRef<Path>) -> io::Result<Self> {
        let root = root.as_ref();
        fs::create_dir_all(root.join(TEMP_DIR))?;
        fs::create_dir_all(root.join(DATA_DIR))?;

        Ok(Self {
            root: root.canonicalize()?,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn data_dir(&self) -> PathBuf {
        self.root.join(DATA_DIR)
    }
}

impl Storage for LocalStorage {
    type Sink = TempSink;

    fn temp_file(&self, extension: &str) -> io::Result<TempSink> {
        let file = tempfile::Builder::new()
            .prefix("export-")
            .suffix(&format!(".{}", extension))
            .tempfile_in(self.root.join(TEMP_DIR))?;
        debug!(path = %file.path().display(), "created temporary sink");

        Ok(TempSink {
            file: BufWriter::new(file),
            extension: extension.to_string(),
        })
    }

    fn publish(&self, sink: TempSink) -> io::Result<Url> {
        let TempSink { file, extension } = sink;
        let file = file.into_inner().map_err(io::IntoInnerError::into_error)?;
        file.as_file().sync_all()?;

        let path = self
            .data_dir()
            .join(format!("{}.{}", uuid::Uuid::new_v4(), extension));
        file.persist(&path).map_err(|err| err.error)?;
        debug!(path = %path.display(), "published sink");

        Url::from_file_path(&path).map_err(|_| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is not an absolute path", path.display()),
            )
        })
    }
}
