//! Capability-typed byte streams.
//!
//! A [`Stream`] owns exactly one [`Resource`] and decides, once at
//! construction, whether it may be read, written or seeked. Every operation
//! checks those flags before touching the handle, so a read-only file yields
//! [`StreamError::NotWritable`] instead of an opaque OS error.
//!
//! ```text
//!            detach()            close()
//!   Detached <------- Open -------> Closed
//! ```
//!
//! Both transitions are terminal and repeat calls are no-ops. The stream
//! state sits behind a mutex so that a body can be shared between the
//! immutable message values that reference it.

pub mod resource;

use std::fmt;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use serde_json::{Map, Value, json};
use thiserror::Error;
use tracing::{debug, warn};

pub use resource::{
    FileResource, MemoryResource, OpenMode, ReaderResource, Resource, WriterResource,
};

/// Upper bound on the bytes returned by a single `read`.
const MAX_READ_CHUNK: usize = 64 * 1024;

/// Errors produced by [`Stream`] operations.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("stream is detached")]
    Detached,

    #[error("stream is not readable")]
    NotReadable,

    #[error("stream is not writable")]
    NotWritable,

    #[error("stream is not seekable")]
    NotSeekable,

    #[error("unsupported open mode `{mode}`")]
    InvalidMode { mode: String },

    #[error("stream I/O error: {0}")]
    Io(#[from] io::Error),
}

pub type StreamResult<T> = Result<T, StreamError>;

/// Lifecycle state of a [`Stream`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamState {
    /// The stream owns its handle.
    Open,
    /// The handle was handed to a caller through [`Stream::detach`].
    Detached,
    /// The handle was released and destroyed through [`Stream::close`].
    Closed,
}

/// Optional construction parameters for [`Stream::with_options`].
#[derive(Debug, Clone, Default)]
pub struct StreamOptions {
    /// Known size of the stream, used until the first write.
    pub size: Option<u64>,
    /// Extra entries merged over the metadata snapshot.
    pub metadata: Map<String, Value>,
}

#[derive(Debug)]
struct Inner {
    resource: Option<Box<dyn Resource>>,
    state: StreamState,
    size: Option<u64>,
    seekable: bool,
    readable: bool,
    writable: bool,
    eof: bool,
    metadata: Map<String, Value>,
}

impl Inner {
    /// Drops every piece of handle-derived state and enters `state`.
    fn release(&mut self, state: StreamState) -> Option<Box<dyn Resource>> {
        let resource = self.resource.take()?;
        self.state = state;
        self.size = None;
        self.seekable = false;
        self.readable = false;
        self.writable = false;
        self.eof = true;
        self.metadata.clear();
        Some(resource)
    }
}

/// A byte stream wrapping one native I/O handle.
///
/// # Examples
///
/// ```
/// use httpmsg::stream::Stream;
///
/// let stream = Stream::temp();
/// stream.write(b"abc").unwrap();
/// stream.rewind().unwrap();
///
/// assert_eq!(&stream.read(2).unwrap()[..], b"ab");
/// assert_eq!(&stream.contents().unwrap()[..], b"c");
/// assert_eq!(stream.to_string(), "abc");
/// ```
#[derive(Debug)]
pub struct Stream {
    inner: Mutex<Inner>,
}

impl Stream {
    /// Wraps `resource`, deriving capabilities from its mode.
    pub fn new(resource: impl Resource + 'static) -> Self {
        Self::from_boxed(Box::new(resource), StreamOptions::default())
    }

    /// Wraps `resource` with a size hint and extra metadata.
    pub fn with_options(resource: impl Resource + 'static, options: StreamOptions) -> Self {
        Self::from_boxed(Box::new(resource), options)
    }

    /// Wraps an already boxed handle, e.g. one obtained from [`Stream::detach`].
    pub fn from_boxed(resource: Box<dyn Resource>, options: StreamOptions) -> Self {
        let mode = resource.mode();
        let readable = mode.is_readable();
        let writable = mode.is_writable();
        let seekable = resource.is_seekable();

        let mut metadata = snapshot(resource.as_ref());
        metadata.extend(options.metadata);

        Self {
            inner: Mutex::new(Inner {
                resource: Some(resource),
                state: StreamState::Open,
                size: options.size,
                seekable,
                readable,
                writable,
                eof: false,
                metadata,
            }),
        }
    }

    /// Creates an empty read/write stream backed by memory.
    pub fn temp() -> Self {
        Self::new(MemoryResource::new())
    }

    /// Creates a read/write memory stream holding `content`, positioned at the start.
    pub fn from_bytes(content: impl Into<Vec<u8>>) -> Self {
        Self::new(MemoryResource::with_content(content))
    }

    /// Opens the file at `path` with an fopen-style `mode` (`"r"`, `"w+b"`, `"a"`, ...).
    ///
    /// # Errors
    ///
    /// - [`StreamError::InvalidMode`]: `mode` cannot open a file.
    /// - [`StreamError::Io`]: the operating system refused to open it.
    pub fn open(path: impl AsRef<Path>, mode: &str) -> StreamResult<Self> {
        if OpenMode::parse(mode).open_options().is_none() {
            return Err(StreamError::InvalidMode {
                mode: mode.to_owned(),
            });
        }
        Ok(Self::new(FileResource::open(path, mode)?))
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current lifecycle state.
    pub fn state(&self) -> StreamState {
        self.lock().state
    }

    /// Size of the stream in bytes, if it can be determined.
    ///
    /// The first successful query is cached until the next write.
    pub fn size(&self) -> Option<u64> {
        let mut inner = self.lock();
        if inner.size.is_some() {
            return inner.size;
        }
        let size = inner.resource.as_mut()?.byte_len().ok()?;
        inner.size = Some(size);
        Some(size)
    }

    /// Current position of the read/write pointer.
    ///
    /// # Errors
    ///
    /// [`StreamError::Detached`] without a handle, [`StreamError::Io`] if the
    /// handle cannot report its position.
    pub fn tell(&self) -> StreamResult<u64> {
        let mut inner = self.lock();
        let resource = inner.resource.as_mut().ok_or(StreamError::Detached)?;
        Ok(resource.stream_position()?)
    }

    /// Returns `true` once a read has hit the end of the data, or when detached.
    pub fn eof(&self) -> bool {
        let inner = self.lock();
        inner.resource.is_none() || inner.eof
    }

    pub fn is_seekable(&self) -> bool {
        self.lock().seekable
    }

    pub fn is_readable(&self) -> bool {
        self.lock().readable
    }

    pub fn is_writable(&self) -> bool {
        self.lock().writable
    }

    /// Moves the read/write pointer.
    ///
    /// # Errors
    ///
    /// - [`StreamError::Detached`]: no handle.
    /// - [`StreamError::NotSeekable`]: the handle cannot seek.
    /// - [`StreamError::Io`]: the seek itself failed (e.g. before offset 0).
    pub fn seek(&self, pos: SeekFrom) -> StreamResult<()> {
        let mut guard = self.lock();
        let inner = &mut *guard;
        let resource = inner.resource.as_mut().ok_or(StreamError::Detached)?;
        if !inner.seekable {
            return Err(StreamError::NotSeekable);
        }
        resource.seek(pos)?;
        inner.eof = false;
        Ok(())
    }

    /// Seeks to the beginning of the stream.
    pub fn rewind(&self) -> StreamResult<()> {
        self.seek(SeekFrom::Start(0))
    }

    /// Reads up to `length` bytes from the current position.
    ///
    /// Issues one read call on the handle, so a pipe or socket returns what
    /// is available instead of blocking until `length` bytes arrive. At most
    /// 64 KiB are returned per call. [`eof`](Self::eof) becomes `true` when the
    /// handle returns nothing, or when a seekable handle returns fewer bytes
    /// than asked for. A `length` of zero returns an empty buffer without
    /// touching the handle.
    ///
    /// # Errors
    ///
    /// [`StreamError::Detached`], [`StreamError::NotReadable`], or
    /// [`StreamError::Io`] if the underlying read call fails.
    pub fn read(&self, length: usize) -> StreamResult<Bytes> {
        let mut guard = self.lock();
        let inner = &mut *guard;
        let resource = inner.resource.as_mut().ok_or(StreamError::Detached)?;
        if !inner.readable {
            return Err(StreamError::NotReadable);
        }
        if length == 0 {
            return Ok(Bytes::new());
        }

        let mut buf = vec![0; length.min(MAX_READ_CHUNK)];
        let n = loop {
            match resource.read(&mut buf) {
                Ok(n) => break n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        };
        if n == 0 || (inner.seekable && n < buf.len()) {
            inner.eof = true;
        }
        buf.truncate(n);
        Ok(Bytes::from(buf))
    }

    /// Writes all of `data` at the current position, returning the byte count.
    ///
    /// Invalidates the cached size.
    ///
    /// # Errors
    ///
    /// [`StreamError::Detached`], [`StreamError::NotWritable`], or
    /// [`StreamError::Io`] if the handle rejects the write.
    pub fn write(&self, data: &[u8]) -> StreamResult<usize> {
        let mut guard = self.lock();
        let inner = &mut *guard;
        let resource = inner.resource.as_mut().ok_or(StreamError::Detached)?;
        if !inner.writable {
            return Err(StreamError::NotWritable);
        }
        inner.size = None;
        resource.write_all(data)?;
        inner.eof = false;
        Ok(data.len())
    }

    /// Reads everything from the current position to the end.
    ///
    /// An empty result at the end of the data is not an error; only a failing
    /// read call is.
    ///
    /// # Errors
    ///
    /// [`StreamError::Detached`], [`StreamError::NotReadable`], or
    /// [`StreamError::Io`].
    pub fn contents(&self) -> StreamResult<Bytes> {
        let mut guard = self.lock();
        let inner = &mut *guard;
        let resource = inner.resource.as_mut().ok_or(StreamError::Detached)?;
        if !inner.readable {
            return Err(StreamError::NotReadable);
        }
        let mut buf = Vec::new();
        resource.read_to_end(&mut buf)?;
        inner.eof = true;
        Ok(Bytes::from(buf))
    }

    /// Hands the underlying handle to the caller and leaves the stream inert.
    ///
    /// Returns `None` if the stream is already detached or closed.
    pub fn detach(&self) -> Option<Box<dyn Resource>> {
        let resource = self.lock().release(StreamState::Detached)?;
        debug!(mode = %resource.mode(), "stream detached");
        Some(resource)
    }

    /// Releases and destroys the underlying handle. Repeat calls do nothing.
    pub fn close(&self) {
        let Some(mut resource) = self.lock().release(StreamState::Closed) else {
            return;
        };
        if let Err(e) = resource.release() {
            warn!(error = %e, "failed to flush stream handle on close");
        }
        debug!(mode = %resource.mode(), "stream closed");
    }

    /// The metadata snapshot taken at construction, or an empty map once detached.
    pub fn metadata(&self) -> Map<String, Value> {
        self.lock().metadata.clone()
    }

    /// A single metadata entry, if present.
    pub fn metadata_value(&self, key: &str) -> Option<Value> {
        self.lock().metadata.get(key).cloned()
    }

    /// Best-effort rendering of the full contents.
    ///
    /// Rewinds when possible and reads to the end. Any failure yields an empty
    /// buffer instead of an error; this is the only stream operation that
    /// never reports failure.
    pub fn to_bytes_lossy(&self) -> Bytes {
        if !self.is_readable() {
            return Bytes::new();
        }
        let rendered = if self.is_seekable() {
            self.rewind().and_then(|()| self.contents())
        } else {
            self.contents()
        };
        rendered.unwrap_or_else(|e| {
            warn!(error = %e, "stream rendering failed, returning empty contents");
            Bytes::new()
        })
    }
}

impl fmt::Display for Stream {
    /// Renders the full contents as (lossy) UTF-8; see [`Stream::to_bytes_lossy`].
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.to_bytes_lossy()))
    }
}

fn snapshot(resource: &dyn Resource) -> Map<String, Value> {
    let mut metadata = Map::new();
    metadata.insert("timed_out".to_owned(), json!(false));
    metadata.insert("blocked".to_owned(), json!(true));
    metadata.insert("eof".to_owned(), json!(false));
    metadata.insert("wrapper_type".to_owned(), json!(resource.wrapper_type()));
    metadata.insert("stream_type".to_owned(), json!(resource.stream_type()));
    metadata.insert("mode".to_owned(), json!(resource.mode().as_str()));
    metadata.insert("unread_bytes".to_owned(), json!(0));
    metadata.insert("seekable".to_owned(), json!(resource.is_seekable()));
    if let Some(uri) = resource.uri() {
        metadata.insert("uri".to_owned(), json!(uri));
    }
    metadata
}
