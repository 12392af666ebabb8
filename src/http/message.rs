//! The header/body record shared by every message, and the capability traits
//! built on top of it.
//!
//! Requests and responses embed a [`MessageParts`] by value and implement
//! [`HttpMessage`]; header and body behavior then comes for free through the
//! blanket [`HasHeaders`] and [`HasBody`] implementations.
//!
//! Every mutator follows the same copy-on-write rule: validate first, return
//! the *same* instance when nothing would change, otherwise copy the record,
//! replace what changed and share everything else (in particular the body
//! stream).

use std::sync::Arc;

use super::headers::{self, Headers, IntoHeaderValues};
use super::{MessageError, Version};
use crate::stream::Stream;

/// Headers, body and protocol version of a message.
#[derive(Debug, Clone)]
pub struct MessageParts {
    headers: Headers,
    body: Option<Arc<Stream>>,
    version: Version,
}

impl MessageParts {
    /// An HTTP/1.1 record with no headers and an empty temporary body.
    pub fn new() -> Self {
        Self {
            headers: Headers::new(),
            body: Some(Arc::new(Stream::temp())),
            version: Version::default(),
        }
    }

    /// Builds a record from headers supplied in bulk.
    ///
    /// Names must be tokens and values must not contain CR or LF. Empty values
    /// are kept. Entries whose names differ only in case are merged in order.
    ///
    /// # Errors
    ///
    /// [`MessageError::InvalidHeaderName`] or [`MessageError::InvalidHeaderChar`].
    pub fn from_headers<N, V>(
        headers: impl IntoIterator<Item = (N, V)>,
        body: Option<Arc<Stream>>,
        version: Version,
    ) -> Result<Self, MessageError>
    where
        N: AsRef<str>,
        V: IntoHeaderValues,
    {
        let mut table = Headers::new();
        for (name, value) in headers {
            let name = name.as_ref();
            headers::validate_name(name)?;
            table.append(name, value.into_header_values().validate_lenient(name)?);
        }
        Ok(Self {
            headers: table,
            body: Some(body.unwrap_or_else(|| Arc::new(Stream::temp()))),
            version,
        })
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub(crate) fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    pub fn version(&self) -> Version {
        self.version
    }
}

impl Default for MessageParts {
    fn default() -> Self {
        Self::new()
    }
}

/// A message value that owns a [`MessageParts`] record.
///
/// Implementors provide access to the record and a way to produce a modified
/// copy; everything else is derived.
pub trait HttpMessage: Clone {
    fn parts(&self) -> &MessageParts;

    /// Returns a new instance whose record is a modified copy of this one.
    fn map_parts(&self, f: impl FnOnce(&mut MessageParts)) -> Self;

    /// Returns `true` if both values are the same instance, not merely equal.
    fn same_instance(&self, other: &Self) -> bool;

    fn protocol_version(&self) -> Version {
        self.parts().version
    }

    /// Replaces the protocol version (`1.0`, `1.1`, `2` or `2.0`).
    ///
    /// # Errors
    ///
    /// [`MessageError::InvalidProtocolVersion`] for anything else.
    fn with_protocol_version(&self, version: &str) -> Result<Self, MessageError> {
        let version: Version = version.parse()?;
        if version == self.parts().version {
            return Ok(self.clone());
        }
        Ok(self.map_parts(|parts| parts.version = version))
    }
}

/// Case-insensitive, multi-valued header access for any [`HttpMessage`].
///
/// # Examples
///
/// ```
/// use httpmsg::http::{HasHeaders, Response};
///
/// let response = Response::new(200).unwrap()
///     .with_header("X-Trace", "a").unwrap()
///     .with_added_header("x-trace", ["b", "c"]).unwrap();
///
/// assert_eq!(response.header("X-TRACE"), ["a", "b", "c"]);
/// assert_eq!(response.header_line("x-trace"), "a, b, c");
/// ```
pub trait HasHeaders: HttpMessage {
    fn headers(&self) -> &Headers {
        &self.parts().headers
    }

    fn has_header(&self, name: &str) -> bool {
        self.parts().headers.contains(name)
    }

    /// Every value of `name`, or an empty slice.
    fn header(&self, name: &str) -> &[String] {
        self.parts().headers.get(name)
    }

    /// Every value of `name` joined with `", "`, or an empty string.
    fn header_line(&self, name: &str) -> String {
        self.parts().headers.line(name)
    }

    /// Replaces all values of `name`.
    ///
    /// # Errors
    ///
    /// - [`MessageError::InvalidHeaderName`]: `name` is not an HTTP token.
    /// - [`MessageError::EmptyHeader`]: no values, or a single empty string.
    /// - [`MessageError::InvalidHeaderChar`]: a value contains CR or LF.
    fn with_header(&self, name: &str, value: impl IntoHeaderValues) -> Result<Self, MessageError> {
        headers::validate_name(name)?;
        let values = value.into_header_values().validate(name)?;
        if self.header(name) == values.as_slice() {
            return Ok(self.clone());
        }
        Ok(self.map_parts(|parts| parts.headers.set(name, values)))
    }

    /// Appends values to `name`, creating it if absent.
    ///
    /// # Errors
    ///
    /// The same validation errors as [`with_header`](Self::with_header).
    fn with_added_header(
        &self,
        name: &str,
        value: impl IntoHeaderValues,
    ) -> Result<Self, MessageError> {
        headers::validate_name(name)?;
        let values = value.into_header_values().validate(name)?;
        Ok(self.map_parts(|parts| parts.headers.append(name, values)))
    }

    /// Removes `name`. Returns the same instance if it was absent.
    fn without_header(&self, name: &str) -> Self {
        if !self.has_header(name) {
            return self.clone();
        }
        self.map_parts(|parts| {
            parts.headers.remove(name);
        })
    }
}

impl<T: HttpMessage> HasHeaders for T {}

/// Body access for any [`HttpMessage`].
pub trait HasBody: HttpMessage {
    /// The body stream, shared with every copy of this message.
    ///
    /// # Errors
    ///
    /// [`MessageError::BodyNotSet`] if no stream was ever attached. Every
    /// constructor attaches one, so this only guards against a record built
    /// by hand.
    fn body(&self) -> Result<Arc<Stream>, MessageError> {
        self.parts().body.clone().ok_or(MessageError::BodyNotSet)
    }

    /// Replaces the body. Returns the same instance if `body` is already attached.
    fn with_body(&self, body: impl Into<Arc<Stream>>) -> Self {
        let body = body.into();
        if self
            .parts()
            .body
            .as_ref()
            .is_some_and(|current| Arc::ptr_eq(current, &body))
        {
            return self.clone();
        }
        self.map_parts(|parts| parts.body = Some(body))
    }
}

impl<T: HttpMessage> HasBody for T {}
