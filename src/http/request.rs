//! Immutable HTTP request.

use std::sync::Arc;

use super::headers::{HeaderValues, IntoHeaderValues};
use super::message::{HasHeaders, HttpMessage, MessageParts};
use super::uri::{IntoUri, Uri, UriError};
use super::{MessageError, Method, Version};
use crate::stream::Stream;

#[derive(Debug, Clone)]
struct RequestInner {
    parts: MessageParts,
    method: Method,
    uri: Uri,
    target: Option<String>,
}

/// An outgoing or incoming HTTP request.
///
/// Constructing a request whose URI has a host, without an explicit `Host`
/// header, adds one (`host[:port]`) at the front of the header table.
///
/// # Examples
///
/// ```
/// use httpmsg::http::{HasHeaders, Request};
///
/// let request = Request::builder("get", "http://example.com:8080/search?q=rust")
///     .header("Accept", "text/html")
///     .build()
///     .unwrap();
///
/// assert_eq!(request.method().as_str(), "GET");
/// assert_eq!(request.request_target(), "/search?q=rust");
/// assert_eq!(request.header_line("host"), "example.com:8080");
/// ```
#[derive(Debug, Clone)]
pub struct Request {
    inner: Arc<RequestInner>,
}

impl Request {
    /// Creates a request with no headers and an empty body.
    ///
    /// # Errors
    ///
    /// [`MessageError::InvalidMethod`] or [`MessageError::Uri`].
    pub fn new(method: &str, uri: impl IntoUri) -> Result<Self, MessageError> {
        Self::builder(method, uri).build()
    }

    /// Starts a request with the given method and target URI.
    pub fn builder(method: &str, uri: impl IntoUri) -> RequestBuilder {
        RequestBuilder {
            method: method.to_owned(),
            uri: uri.into_uri(),
            headers: Vec::new(),
            body: None,
            version: None,
        }
    }

    fn map(&self, f: impl FnOnce(&mut RequestInner)) -> Self {
        let mut inner = (*self.inner).clone();
        f(&mut inner);
        Self {
            inner: Arc::new(inner),
        }
    }

    /// Returns the HTTP method.
    pub fn method(&self) -> &Method {
        &self.inner.method
    }

    /// Replaces the method. The name is matched case-insensitively and stored uppercase.
    ///
    /// # Errors
    ///
    /// [`MessageError::InvalidMethod`] unless `method` is a non-empty HTTP token.
    pub fn with_method(&self, method: &str) -> Result<Self, MessageError> {
        let method: Method = method.parse()?;
        if method == self.inner.method {
            return Ok(self.clone());
        }
        Ok(self.map(|inner| inner.method = method))
    }

    pub fn uri(&self) -> &Uri {
        &self.inner.uri
    }

    /// Replaces the URI.
    ///
    /// The `Host` header is recomputed from the new URI unless
    /// `preserve_host` is set and a `Host` header already exists. A URI
    /// without a host never touches the header.
    pub fn with_uri(&self, uri: Uri, preserve_host: bool) -> Self {
        if uri == self.inner.uri {
            return self.clone();
        }
        let sync_host = !preserve_host || !self.has_header("host");
        self.map(|inner| {
            if sync_host {
                sync_host_header(&mut inner.parts, &uri);
            }
            inner.uri = uri;
        })
    }

    /// The request target: the explicit override if set, otherwise the URI's
    /// path (defaulting to `/`) followed by `?query` when there is one.
    pub fn request_target(&self) -> String {
        if let Some(target) = &self.inner.target {
            return target.clone();
        }
        let uri = &self.inner.uri;
        let mut target = if uri.path().is_empty() {
            "/".to_owned()
        } else {
            uri.path().to_owned()
        };
        if !uri.query().is_empty() {
            target.push('?');
            target.push_str(uri.query());
        }
        target
    }

    /// Overrides the request target (e.g. `*` or an absolute-form URI).
    ///
    /// # Errors
    ///
    /// [`MessageError::InvalidRequestTarget`] if `target` contains whitespace.
    pub fn with_request_target(&self, target: &str) -> Result<Self, MessageError> {
        if target.chars().any(char::is_whitespace) {
            return Err(MessageError::InvalidRequestTarget {
                target: target.to_owned(),
            });
        }
        if self.inner.target.as_deref() == Some(target) {
            return Ok(self.clone());
        }
        let target = target.to_owned();
        Ok(self.map(|inner| inner.target = Some(target)))
    }
}

impl HttpMessage for Request {
    fn parts(&self) -> &MessageParts {
        &self.inner.parts
    }

    fn map_parts(&self, f: impl FnOnce(&mut MessageParts)) -> Self {
        self.map(|inner| f(&mut inner.parts))
    }

    fn same_instance(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

/// Sets `host` to `host[:port]` from `uri`, first in enumeration order.
fn sync_host_header(parts: &mut MessageParts, uri: &Uri) {
    if uri.host().is_empty() {
        return;
    }
    let host = match uri.port() {
        Some(port) => format!("{}:{port}", uri.host()),
        None => uri.host().to_owned(),
    };
    parts.headers_mut().set_first("host", vec![host]);
}

/// Fluent builder for [`Request`]. Nothing is validated until [`build`](Self::build).
#[derive(Debug)]
pub struct RequestBuilder {
    method: String,
    uri: Result<Uri, UriError>,
    headers: Vec<(String, HeaderValues)>,
    body: Option<Arc<Stream>>,
    version: Option<String>,
}

impl RequestBuilder {
    /// Adds a header. Repeated names (in any case) accumulate values.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl IntoHeaderValues) -> Self {
        self.headers.push((name.into(), value.into_header_values()));
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

    /// Validates everything and produces the request.
    ///
    /// # Errors
    ///
    /// - [`MessageError::InvalidMethod`]: the method is not an HTTP token.
    /// - [`MessageError::Uri`]: the URI failed to parse.
    /// - [`MessageError::InvalidProtocolVersion`]: unsupported version.
    /// - any header validation error.
    pub fn build(self) -> Result<Request, MessageError> {
        let method: Method = self.method.parse()?;
        let uri = self.uri?;
        let version = match self.version {
            Some(v) => v.parse()?,
            None => Version::default(),
        };
        let mut parts = MessageParts::from_headers(self.headers, self.body, version)?;
        if !parts.headers().contains("host") {
            sync_host_header(&mut parts, &uri);
        }

        Ok(Request {
            inner: Arc::new(RequestInner {
                parts,
                method,
                uri,
                target: None,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::HasBody;

    #[test]
    fn host_header_from_uri() {
        let req = Request::new("GET", "http://example.com/").unwrap();
        assert_eq!(req.header_line("host"), "example.com");

        let req = Request::new("GET", "http://example.com:8080/").unwrap();
        assert_eq!(req.header_line("Host"), "example.com:8080");

        let req = Request::new("GET", "http://example.com:80/").unwrap();
        assert_eq!(req.header_line("host"), "example.com");
    }

    #[test]
    fn explicit_host_header_wins_at_construction() {
        let req = Request::builder("GET", "http://example.com/")
            .header("Host", "proxy.local")
            .build()
            .unwrap();
        assert_eq!(req.header("host"), ["proxy.local"]);
    }

    #[test]
    fn no_host_header_without_uri_host() {
        let req = Request::new("GET", "/relative").unwrap();
        assert!(!req.has_header("host"));
    }

    #[test]
    fn host_header_is_first() {
        let req = Request::builder("GET", "http://example.com/")
            .header("Accept", "*/*")
            .build()
            .unwrap();
        let first = req.headers().iter().next().map(|(name, _)| name);
        assert_eq!(first, Some("host"));
    }

    #[test]
    fn with_uri_syncs_host() {
        let req = Request::new("GET", "http://example.com/").unwrap();
        let other = Uri::parse("http://other.com/").unwrap();

        let replaced = req.with_uri(other.clone(), false);
        assert_eq!(replaced.header_line("host"), "other.com");

        let preserved = req.with_uri(other, true);
        assert_eq!(preserved.header_line("host"), "example.com");
        assert_eq!(preserved.uri().host(), "other.com");
    }

    #[test]
    fn preserve_host_still_sets_missing_header() {
        let req = Request::new("GET", "/path").unwrap();
        let replaced = req.with_uri(Uri::parse("http://new.com/").unwrap(), true);
        assert_eq!(replaced.header_line("host"), "new.com");
    }

    #[test]
    fn with_uri_without_host_keeps_header() {
        let req = Request::new("GET", "http://example.com/").unwrap();
        let replaced = req.with_uri(Uri::parse("/only/path").unwrap(), false);
        assert_eq!(replaced.header_line("host"), "example.com");
    }

    #[test]
    fn method_validation() {
        assert!(matches!(
            Request::new("", "/"),
            Err(MessageError::InvalidMethod { .. })
        ));
        assert!(matches!(
            Request::new("GE T", "/"),
            Err(MessageError::InvalidMethod { .. })
        ));
        let req = Request::new("patch", "/").unwrap();
        assert_eq!(req.method(), &Method::Patch);
    }

    #[test]
    fn bad_uri_fails_build() {
        assert!(matches!(
            Request::new("GET", "http://host:99999/"),
            Err(MessageError::Uri(UriError::InvalidPort { .. }))
        ));
    }

    #[test]
    fn request_target_derivation() {
        assert_eq!(Request::new("GET", "http://h").unwrap().request_target(), "/");
        assert_eq!(
            Request::new("GET", "http://h/a?b=c").unwrap().request_target(),
            "/a?b=c"
        );
        let req = Request::new("OPTIONS", "http://h/a").unwrap();
        let star = req.with_request_target("*").unwrap();
        assert_eq!(star.request_target(), "*");
        assert!(req.with_request_target("/a b").is_err());
    }

    #[test]
    fn no_op_mutators_return_same_instance() {
        let req = Request::new("GET", "http://example.com/a").unwrap();
        assert!(req.with_method("get").unwrap().same_instance(&req));
        assert!(
            req.with_uri(Uri::parse("http://example.com/a").unwrap(), false)
                .same_instance(&req)
        );
        let targeted = req.with_request_target("/x").unwrap();
        assert!(targeted.with_request_target("/x").unwrap().same_instance(&targeted));
        assert!(!req.with_method("POST").unwrap().same_instance(&req));
    }

    #[test]
    fn builder_version_and_body() {
        let req = Request::builder("POST", "/submit")
            .version("2.0")
            .body(Stream::from_bytes("payload"))
            .build()
            .unwrap();
        assert_eq!(req.protocol_version(), Version::Http2);
        assert_eq!(req.body().unwrap().to_string(), "payload");

        assert!(matches!(
            Request::builder("GET", "/").version("0.9").build(),
            Err(MessageError::InvalidProtocolVersion { .. })
        ));
    }
}
