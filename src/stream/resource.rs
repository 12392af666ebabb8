//! Native byte-oriented I/O handles that a [`Stream`](super::Stream) can own.
//!
//! A [`Resource`] is the raw handle: it reads, writes and seeks, reports the
//! mode it was opened with and whether it can seek. Capability decisions are
//! made once by the owning stream from that information.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Directional modes that permit reading.
const READABLE_MODES: &[&str] = &["r", "r+", "w+", "a+", "x+", "c+"];

/// Directional modes that permit writing.
const WRITABLE_MODES: &[&str] = &["w", "w+", "rw", "r+", "a", "a+", "x", "x+", "c", "c+"];

/// The mode string a handle was opened with.
///
/// Text/binary modifiers (`t`, `b`) are kept in the raw string but ignored
/// when deciding direction, so `"rb"` and `"r"` are equally readable.
///
/// # Examples
///
/// ```
/// use httpmsg::stream::OpenMode;
///
/// let mode = OpenMode::parse("r+b");
/// assert_eq!(mode.as_str(), "r+b");
/// assert!(mode.is_readable());
/// assert!(mode.is_writable());
/// assert!(!OpenMode::parse("w").is_readable());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenMode {
    raw: String,
    direction: String,
}

impl OpenMode {
    /// Parses a mode string. Unknown modes are accepted but grant no capability.
    pub fn parse(mode: &str) -> Self {
        let direction = mode.chars().filter(|c| !matches!(c, 'b' | 't')).collect();
        Self {
            raw: mode.to_owned(),
            direction,
        }
    }

    /// Returns the mode exactly as supplied.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Returns `true` if the mode permits reading.
    pub fn is_readable(&self) -> bool {
        READABLE_MODES.contains(&self.direction.as_str())
    }

    /// Returns `true` if the mode permits writing.
    pub fn is_writable(&self) -> bool {
        WRITABLE_MODES.contains(&self.direction.as_str())
    }

    /// Maps the mode onto file open options, or `None` if no file can be
    /// opened with it (e.g. `"rw"`).
    pub fn open_options(&self) -> Option<OpenOptions> {
        let mut options = OpenOptions::new();
        match self.direction.as_str() {
            "r" => options.read(true),
            "r+" => options.read(true).write(true),
            "w" => options.write(true).create(true).truncate(true),
            "w+" => options.read(true).write(true).create(true).truncate(true),
            "a" => options.append(true).create(true),
            "a+" => options.read(true).append(true).create(true),
            "x" => options.write(true).create_new(true),
            "x+" => options.read(true).write(true).create_new(true),
            "c" => options.write(true).create(true),
            "c+" => options.read(true).write(true).create(true),
            _ => return None,
        };
        Some(options)
    }
}

impl fmt::Display for OpenMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// A native I/O handle owned by a [`Stream`](super::Stream).
///
/// Implementors that cannot seek, read or write should return an
/// [`io::ErrorKind::Unsupported`] error from the corresponding trait method;
/// the stream never calls them when the capability is absent, but a detached
/// handle may be used directly by its new owner.
pub trait Resource: Read + Write + Seek + Send + fmt::Debug {
    /// The mode this handle was opened with.
    fn mode(&self) -> &OpenMode;

    /// Whether the handle supports random access.
    fn is_seekable(&self) -> bool {
        true
    }

    /// Queries the current length of the underlying data in bytes.
    fn byte_len(&mut self) -> io::Result<u64>;

    /// Location of the underlying data, if it has one.
    fn uri(&self) -> Option<String> {
        None
    }

    /// Short name of the wrapper that produced this handle.
    fn wrapper_type(&self) -> &'static str;

    /// Short name of the handle's transport.
    fn stream_type(&self) -> &'static str;

    /// Flushes pending writes before the handle is destroyed.
    fn release(&mut self) -> io::Result<()> {
        self.flush()
    }
}

/// A growable in-memory buffer, the default body of every message.
#[derive(Debug, Clone)]
pub struct MemoryResource {
    buffer: Cursor<Vec<u8>>,
    mode: OpenMode,
}

impl MemoryResource {
    /// Mode of a fresh temporary buffer: read/write, binary.
    pub const TEMP_MODE: &'static str = "w+b";

    /// Creates an empty read/write buffer.
    pub fn new() -> Self {
        Self::with_content(Vec::new())
    }

    /// Creates a read/write buffer holding `content`, positioned at the start.
    pub fn with_content(content: impl Into<Vec<u8>>) -> Self {
        Self::with_mode(content, Self::TEMP_MODE)
    }

    /// Creates a buffer holding `content` that reports `mode` to its stream.
    pub fn with_mode(content: impl Into<Vec<u8>>, mode: &str) -> Self {
        Self {
            buffer: Cursor::new(content.into()),
            mode: OpenMode::parse(mode),
        }
    }

    /// Consumes the buffer and returns its bytes.
    pub fn into_inner(self) -> Vec<u8> {
        self.buffer.into_inner()
    }
}

impl Default for MemoryResource {
    fn default() -> Self {
        Self::new()
    }
}

impl Read for MemoryResource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.buffer.read(buf)
    }
}

impl Write for MemoryResource {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Seek for MemoryResource {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.buffer.seek(pos)
    }
}

impl Resource for MemoryResource {
    fn mode(&self) -> &OpenMode {
        &self.mode
    }

    fn byte_len(&mut self) -> io::Result<u64> {
        Ok(self.buffer.get_ref().len() as u64)
    }

    fn wrapper_type(&self) -> &'static str {
        "memory"
    }

    fn stream_type(&self) -> &'static str {
        "MEMORY"
    }
}

/// A file on disk.
#[derive(Debug)]
pub struct FileResource {
    file: File,
    path: PathBuf,
    mode: OpenMode,
}

impl FileResource {
    /// Opens `path` with an fopen-style `mode`.
    ///
    /// # Errors
    ///
    /// Returns [`io::ErrorKind::InvalidInput`] if the mode cannot open a file,
    /// or the error reported by the operating system.
    pub fn open(path: impl AsRef<Path>, mode: &str) -> io::Result<Self> {
        let mode = OpenMode::parse(mode);
        let options = mode.open_options().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("unsupported open mode `{mode}`"),
            )
        })?;
        let path = path.as_ref().to_path_buf();
        let file = options.open(&path)?;
        Ok(Self { file, path, mode })
    }

    /// Wraps an already-open file. `mode` must describe how it was opened.
    pub fn from_file(file: File, path: impl Into<PathBuf>, mode: &str) -> Self {
        Self {
            file,
            path: path.into(),
            mode: OpenMode::parse(mode),
        }
    }

    /// Path the file was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Read for FileResource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

impl Write for FileResource {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

impl Seek for FileResource {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.file.seek(pos)
    }
}

impl Resource for FileResource {
    fn mode(&self) -> &OpenMode {
        &self.mode
    }

    // `metadata` always stats the file afresh; there is no cache to invalidate.
    fn byte_len(&mut self) -> io::Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    fn uri(&self) -> Option<String> {
        Some(self.path.display().to_string())
    }

    fn wrapper_type(&self) -> &'static str {
        "plainfile"
    }

    fn stream_type(&self) -> &'static str {
        "STDIO"
    }

    fn release(&mut self) -> io::Result<()> {
        self.file.flush()?;
        if self.mode.is_writable() {
            self.file.sync_data()?;
        }
        Ok(())
    }
}

fn unsupported(what: &str) -> io::Error {
    io::Error::new(io::ErrorKind::Unsupported, format!("handle does not support {what}"))
}

/// A forward-only, read-only handle such as a socket or a pipe.
#[derive(Debug)]
pub struct ReaderResource<R> {
    reader: R,
    mode: OpenMode,
}

impl<R: Read + Send + fmt::Debug> ReaderResource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            mode: OpenMode::parse("r"),
        }
    }

    pub fn into_inner(self) -> R {
        self.reader
    }
}

impl<R: Read> Read for ReaderResource<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf)
    }
}

impl<R> Write for ReaderResource<R> {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(unsupported("writing"))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<R> Seek for ReaderResource<R> {
    fn seek(&mut self, _pos: SeekFrom) -> io::Result<u64> {
        Err(unsupported("seeking"))
    }
}

impl<R: Read + Send + fmt::Debug> Resource for ReaderResource<R> {
    fn mode(&self) -> &OpenMode {
        &self.mode
    }

    fn is_seekable(&self) -> bool {
        false
    }

    fn byte_len(&mut self) -> io::Result<u64> {
        Err(unsupported("length queries"))
    }

    fn wrapper_type(&self) -> &'static str {
        "reader"
    }

    fn stream_type(&self) -> &'static str {
        "PIPE"
    }
}

/// A forward-only, write-only handle such as a socket or standard output.
#[derive(Debug)]
pub struct WriterResource<W> {
    writer: W,
    mode: OpenMode,
}

impl<W: Write + Send + fmt::Debug> WriterResource<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            mode: OpenMode::parse("w"),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W> Read for WriterResource<W> {
    fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        Err(unsupported("reading"))
    }
}

impl<W: Write> Write for WriterResource<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.writer.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

impl<W> Seek for WriterResource<W> {
    fn seek(&mut self, _pos: SeekFrom) -> io::Result<u64> {
        Err(unsupported("seeking"))
    }
}

impl<W: Write + Send + fmt::Debug> Resource for WriterResource<W> {
    fn mode(&self) -> &OpenMode {
        &self.mode
    }

    fn is_seekable(&self) -> bool {
        false
    }

    fn byte_len(&mut self) -> io::Result<u64> {
        Err(unsupported("length queries"))
    }

    fn wrapper_type(&self) -> &'static str {
        "writer"
    }

    fn stream_type(&self) -> &'static str {
        "PIPE"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_capabilities() {
        for mode in ["r", "rb", "rt", "r+", "w+", "a+", "x+", "c+", "w+b"] {
            assert!(OpenMode::parse(mode).is_readable(), "{mode} should be readable");
        }
        for mode in ["w", "wb", "a", "x", "c", "rw"] {
            assert!(!OpenMode::parse(mode).is_readable(), "{mode} should not be readable");
        }
        for mode in ["w", "w+", "rw", "r+", "a", "a+", "x", "x+", "c", "c+", "ab"] {
            assert!(OpenMode::parse(mode).is_writable(), "{mode} should be writable");
        }
        assert!(!OpenMode::parse("r").is_writable());
        assert!(!OpenMode::parse("rb").is_writable());
    }

    #[test]
    fn unknown_mode_has_no_file_options() {
        assert!(OpenMode::parse("rw").open_options().is_none());
        assert!(OpenMode::parse("z").open_options().is_none());
        assert!(OpenMode::parse("c+b").open_options().is_some());
    }

    #[test]
    fn memory_len_tracks_writes() {
        let mut mem = MemoryResource::new();
        mem.write_all(b"hello").unwrap();
        assert_eq!(mem.byte_len().unwrap(), 5);
        assert_eq!(mem.into_inner(), b"hello");
    }

    #[test]
    fn reader_refuses_seek_and_write() {
        let mut reader = ReaderResource::new(Cursor::new(b"abc".to_vec()));
        assert!(!reader.is_seekable());
        assert_eq!(
            reader.seek(SeekFrom::Start(0)).unwrap_err().kind(),
            io::ErrorKind::Unsupported
        );
        assert!(reader.write(b"x").is_err());
        assert!(reader.byte_len().is_err());
    }

    #[test]
    fn writer_refuses_read() {
        let mut writer = WriterResource::new(Vec::new());
        let mut buf = [0u8; 4];
        assert!(writer.read(&mut buf).is_err());
        writer.write_all(b"out").unwrap();
        assert_eq!(writer.into_inner(), b"out");
    }
}
