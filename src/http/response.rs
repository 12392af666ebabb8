//! Immutable HTTP response.
//!
//! Provides a fluent builder API for constructing responses; the reason
//! phrase falls back to the canonical phrase of the status code.

use std::sync::Arc;

use super::headers::{HeaderValues, IntoHeaderValues};
use super::message::{HttpMessage, MessageParts};
use super::{MessageError, StatusCode, Version};
use crate::stream::Stream;

#[derive(Debug, Clone)]
struct ResponseInner {
    parts: MessageParts,
    status: StatusCode,
    reason: String,
}

/// An HTTP response.
///
/// # Examples
///
/// ```
/// use httpmsg::http::{HasBody, HasHeaders, Response};
/// use httpmsg::stream::Stream;
///
/// let response = Response::builder(404)
///     .header("Content-Type", "application/json")
///     .body(Stream::from_bytes(r#"{"error":"missing"}"#))
///     .build()
///     .unwrap();
///
/// assert_eq!(response.status().as_u16(), 404);
/// assert_eq!(response.reason_phrase(), "Not Found");
/// assert_eq!(response.header_line("content-type"), "application/json");
/// assert_eq!(response.body().unwrap().to_string(), r#"{"error":"missing"}"#);
/// ```
#[derive(Debug, Clone)]
pub struct Response {
    inner: Arc<ResponseInner>,
}

impl Response {
    /// Creates a response with the given status, no headers and an empty body.
    ///
    /// # Errors
    ///
    /// [`MessageError::InvalidStatus`] for codes outside `100..=599`.
    pub fn new(status: u16) -> Result<Self, MessageError> {
        Self::builder(status).build()
    }

    /// Starts a response with the given status code.
    pub fn builder(status: u16) -> ResponseBuilder {
        ResponseBuilder {
            status,
            reason: None,
            headers: Vec::new(),
            body: None,
            version: None,
        }
    }

    /// Returns the status code of this response.
    pub fn status(&self) -> StatusCode {
        self.inner.status
    }

    /// The explicit reason phrase, or the canonical one, or `""` for unassigned codes.
    pub fn reason_phrase(&self) -> &str {
        &self.inner.reason
    }

    /// Replaces the status. An empty `reason` selects the canonical phrase.
    ///
    /// # Errors
    ///
    /// [`MessageError::InvalidStatus`] or [`MessageError::InvalidReasonPhrase`].
    pub fn with_status(&self, code: u16, reason: &str) -> Result<Self, MessageError> {
        let status = StatusCode::from_u16(code)?;
        let reason = resolve_reason(status, reason)?;
        if status == self.inner.status && reason == self.inner.reason {
            return Ok(self.clone());
        }
        let mut inner = (*self.inner).clone();
        inner.status = status;
        inner.reason = reason;
        Ok(Self {
            inner: Arc::new(inner),
        })
    }
}

fn resolve_reason(status: StatusCode, reason: &str) -> Result<String, MessageError> {
    if reason.contains(['\r', '\n']) {
        return Err(MessageError::InvalidReasonPhrase);
    }
    if reason.is_empty() {
        return Ok(status.canonical_reason().unwrap_or_default().to_owned());
    }
    Ok(reason.to_owned())
}

impl HttpMessage for Response {
    fn parts(&self) -> &MessageParts {
        &self.inner.parts
    }

    fn map_parts(&self, f: impl FnOnce(&mut MessageParts)) -> Self {
        let mut inner = (*self.inner).clone();
        f(&mut inner.parts);
        Self {
            inner: Arc::new(inner),
        }
    }

    fn same_instance(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Default for Response {
    fn default() -> Self {
        Self {
            inner: Arc::new(ResponseInner {
                parts: MessageParts::new(),
                status: StatusCode::OK,
                reason: "OK".to_owned(),
            }),
        }
    }
}

/// Fluent builder for [`Response`]. Nothing is validated until [`build`](Self::build).
#[derive(Debug)]
pub struct ResponseBuilder {
    status: u16,
    reason: Option<String>,
    headers: Vec<(String, HeaderValues)>,
    body: Option<Arc<Stream>>,
    version: Option<String>,
}

impl ResponseBuilder {
    /// Appends a response header. Multiple calls with the same name are additive.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl IntoHeaderValues) -> Self {
        self.headers.push((name.into(), value.into_header_values()));
        self
    }

    /// Sets an explicit reason phrase instead of the canonical one.
    #[must_use]
    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Sets the body stream. Defaults to an empty temporary buffer.
    #[must_use]
    pub fn body(mut self, body: impl Into<Arc<Stream>>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Sets the protocol version. Defaults to `1.1`.
    #[must_use]
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Validates everything and produces the response.
    ///
    /// # Errors
    ///
    /// [`MessageError::InvalidStatus`], [`MessageError::InvalidReasonPhrase`],
    /// [`MessageError::InvalidProtocolVersion`] or any header validation error.
    pub fn build(self) -> Result<Response, MessageError> {
        let status = StatusCode::from_u16(self.status)?;
        let reason = resolve_reason(status, self.reason.as_deref().unwrap_or_default())?;
        let version = match self.version {
            Some(v) => v.parse()?,
            None => Version::default(),
        };
        let parts = MessageParts::from_headers(self.headers, self.body, version)?;

        Ok(Response {
            inner: Arc::new(ResponseInner {
                parts,
                status,
                reason,
            }),
        })
    }
}
