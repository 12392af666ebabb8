//! Files received through a multipart upload.
//!
//! An [`UploadedFile`] wraps the temporary data as a [`Stream`] and can be
//! moved to its final location exactly once.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;
use tracing::debug;

use crate::stream::{Stream, StreamError};

/// Chunk size used when copying an upload to its destination.
pub const DEFAULT_CHUNK_SIZE: usize = 8192;

/// Upload status codes as reported by the receiving server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum UploadErrorCode {
    /// The upload completed.
    Ok = 0,
    /// The file exceeds the server's size limit.
    IniSize = 1,
    /// The file exceeds the form's declared size limit.
    FormSize = 2,
    /// Only part of the file arrived.
    Partial = 3,
    /// No file was sent.
    NoFile = 4,
    /// The server has no temporary directory.
    NoTmpDir = 6,
    /// The temporary file could not be written.
    CantWrite = 7,
    /// A server extension stopped the upload.
    Extension = 8,
}

impl UploadErrorCode {
    pub fn as_i64(self) -> i64 {
        i64::from(self as u8)
    }

    pub fn is_ok(self) -> bool {
        self == Self::Ok
    }
}

impl TryFrom<i64> for UploadErrorCode {
    type Error = UploadError;

    fn try_from(code: i64) -> Result<Self, Self::Error> {
        Ok(match code {
            0 => Self::Ok,
            1 => Self::IniSize,
            2 => Self::FormSize,
            3 => Self::Partial,
            4 => Self::NoFile,
            6 => Self::NoTmpDir,
            7 => Self::CantWrite,
            8 => Self::Extension,
            _ => return Err(UploadError::InvalidErrorCode { code }),
        })
    }
}

impl fmt::Display for UploadErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Ok => "upload completed",
            Self::IniSize => "file exceeds the server size limit",
            Self::FormSize => "file exceeds the form size limit",
            Self::Partial => "file was only partially uploaded",
            Self::NoFile => "no file was uploaded",
            Self::NoTmpDir => "missing temporary directory",
            Self::CantWrite => "failed to write file to disk",
            Self::Extension => "upload stopped by an extension",
        };
        write!(f, "{text} (code {})", self.as_i64())
    }
}

/// Errors produced while creating, reading or moving an upload.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("upload error code {code} is not recognised")]
    InvalidErrorCode { code: i64 },

    #[error("uploaded file was already moved")]
    AlreadyMoved,

    #[error("upload did not complete: {code}")]
    UploadFailed { code: UploadErrorCode },

    #[error("target path must not be empty")]
    EmptyTarget,

    #[error("cannot open uploaded file {}: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: StreamError,
    },

    #[error("cannot open move destination {}: {source}", path.display())]
    Destination {
        path: PathBuf,
        #[source]
        source: StreamError,
    },

    #[error("invalid upload specification: {reason}")]
    InvalidSpec { reason: String },

    #[error(transparent)]
    Stream(#[from] StreamError),
}

/// A single uploaded file.
///
/// # Examples
///
/// ```
/// use httpmsg::stream::Stream;
/// use httpmsg::upload::UploadedFile;
///
/// let file = UploadedFile::from_stream(Stream::from_bytes("hello"), Some(5), 0)
///     .unwrap()
///     .with_client_filename("hello.txt");
///
/// assert_eq!(file.client_filename(), Some("hello.txt"));
/// assert_eq!(file.stream().unwrap().to_string(), "hello");
/// assert!(UploadedFile::from_stream(Stream::temp(), None, 5).is_err());
/// ```
#[derive(Debug)]
pub struct UploadedFile {
    stream: Option<Arc<Stream>>,
    size: Option<u64>,
    error: UploadErrorCode,
    client_filename: Option<String>,
    client_media_type: Option<String>,
    chunk_size: usize,
    moved: Mutex<bool>,
}

impl UploadedFile {
    fn with_source(
        stream: Option<Arc<Stream>>,
        size: Option<u64>,
        error: UploadErrorCode,
    ) -> Self {
        Self {
            stream,
            size,
            error,
            client_filename: None,
            client_media_type: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
            moved: Mutex::new(false),
        }
    }

    /// Wraps an existing stream.
    ///
    /// # Errors
    ///
    /// [`UploadError::InvalidErrorCode`] for unknown error codes.
    pub fn from_stream(
        stream: impl Into<Arc<Stream>>,
        size: Option<u64>,
        error: i64,
    ) -> Result<Self, UploadError> {
        let error = UploadErrorCode::try_from(error)?;
        Ok(Self::with_source(Some(stream.into()), size, error))
    }

    /// Opens the file at `path` for reading.
    ///
    /// The file is only opened when `error` reports a completed upload; a
    /// failed upload usually has no temporary file at all.
    ///
    /// # Errors
    ///
    /// [`UploadError::InvalidErrorCode`] for unknown error codes,
    /// [`UploadError::Unreadable`] if the file cannot be opened.
    pub fn from_path(
        path: impl AsRef<Path>,
        size: Option<u64>,
        error: i64,
    ) -> Result<Self, UploadError> {
        let error = UploadErrorCode::try_from(error)?;
        if !error.is_ok() {
            return Ok(Self::with_source(None, size, error));
        }
        let path = path.as_ref();
        let stream = Stream::open(path, "r").map_err(|source| UploadError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::with_source(Some(Arc::new(stream)), size, error))
    }

    #[must_use]
    pub fn with_client_filename(mut self, name: impl Into<String>) -> Self {
        self.client_filename = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_client_media_type(mut self, media_type: impl Into<String>) -> Self {
        self.client_media_type = Some(media_type.into());
        self
    }

    /// Sets the copy chunk size used by [`move_to`](Self::move_to). Zero is ignored.
    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        if chunk_size > 0 {
            self.chunk_size = chunk_size;
        }
        self
    }

    pub fn size(&self) -> Option<u64> {
        self.size
    }

    pub fn error(&self) -> UploadErrorCode {
        self.error
    }

    pub fn client_filename(&self) -> Option<&str> {
        self.client_filename.as_deref()
    }

    pub fn client_media_type(&self) -> Option<&str> {
        self.client_media_type.as_deref()
    }

    /// Returns `true` once [`move_to`](Self::move_to) has succeeded.
    pub fn is_moved(&self) -> bool {
        *self.moved.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn usable_stream(&self) -> Result<&Arc<Stream>, UploadError> {
        if !self.error.is_ok() {
            return Err(UploadError::UploadFailed { code: self.error });
        }
        self.stream
            .as_ref()
            .ok_or(UploadError::UploadFailed { code: self.error })
    }

    /// The uploaded data.
    ///
    /// # Errors
    ///
    /// [`UploadError::AlreadyMoved`] after a successful move,
    /// [`UploadError::UploadFailed`] if the upload did not complete.
    pub fn stream(&self) -> Result<Arc<Stream>, UploadError> {
        if self.is_moved() {
            return Err(UploadError::AlreadyMoved);
        }
        self.usable_stream().cloned()
    }

    /// Copies the upload to `target` and marks it moved. Succeeds at most once.
    ///
    /// # Errors
    ///
    /// - [`UploadError::AlreadyMoved`]: a previous call succeeded.
    /// - [`UploadError::EmptyTarget`]: `target` is blank.
    /// - [`UploadError::UploadFailed`]: the upload did not complete.
    /// - [`UploadError::Destination`]: `target` cannot be opened for writing.
    /// - [`UploadError::Stream`]: reading or writing failed mid-copy.
    pub fn move_to(&self, target: impl AsRef<Path>) -> Result<(), UploadError> {
        let target = target.as_ref();
        let mut moved = self.moved.lock().unwrap_or_else(PoisonError::into_inner);
        if *moved {
            return Err(UploadError::AlreadyMoved);
        }
        if target.to_string_lossy().trim().is_empty() {
            return Err(UploadError::EmptyTarget);
        }
        let source = self.usable_stream()?;

        if source.is_seekable() {
            source.rewind()?;
        }
        let destination =
            Stream::open(target, "w").map_err(|source| UploadError::Destination {
                path: target.to_path_buf(),
                source,
            })?;

        let mut copied = 0usize;
        loop {
            let chunk = source.read(self.chunk_size)?;
            if chunk.is_empty() {
                break;
            }
            copied += destination.write(&chunk)?;
            if source.eof() {
                break;
            }
        }
        destination.close();

        *moved = true;
        debug!(target = %target.display(), bytes = copied, "uploaded file moved");
        Ok(())
    }
}

/// A node in a tree of uploaded files keyed by form field name.
#[derive(Debug, Clone)]
pub enum UploadedFileTree {
    File(Arc<UploadedFile>),
    Nested(BTreeMap<String, UploadedFileTree>),
}

impl UploadedFileTree {
    /// The file at this node, if it is a leaf.
    pub fn as_file(&self) -> Option<&Arc<UploadedFile>> {
        match self {
            Self::File(file) => Some(file),
            Self::Nested(_) => None,
        }
    }

    /// The child named `key`, if this is a nested node.
    pub fn get(&self, key: &str) -> Option<&UploadedFileTree> {
        match self {
            Self::File(_) => None,
            Self::Nested(children) => children.get(key),
        }
    }
}

impl From<UploadedFile> for UploadedFileTree {
    fn from(file: UploadedFile) -> Self {
        Self::File(Arc::new(file))
    }
}

/// Uploaded files of a request, keyed by top-level field name.
pub type UploadedFiles = BTreeMap<String, UploadedFileTree>;
