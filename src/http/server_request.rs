//! Server-side view of an incoming request.
//!
//! A [`ServerRequest`] is a [`Request`] plus everything the receiving server
//! derived from it: environment parameters, cookies, query parameters,
//! uploaded files, a parsed body and free-form attributes.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::{Map, Value};

use super::message::{HttpMessage, MessageParts};
use super::request::Request;
use super::uri::Uri;
use super::{MessageError, Method};
use crate::upload::UploadedFiles;

#[derive(Debug, Clone, Default)]
struct ServerParams {
    server: Map<String, Value>,
    cookies: BTreeMap<String, String>,
    query: Map<String, Value>,
    files: UploadedFiles,
    parsed_body: Option<Value>,
    attributes: BTreeMap<String, Value>,
}

/// An incoming request as seen by the server.
///
/// Server parameters are fixed at construction; everything else has a
/// copy-on-write mutator.
///
/// # Examples
///
/// ```
/// use httpmsg::http::{Request, ServerRequest};
/// use serde_json::json;
///
/// let request = ServerRequest::from_request(Request::new("POST", "/login").unwrap())
///     .with_attribute("user_id", json!(42))
///     .with_parsed_body(json!({ "name": "ada" }))
///     .unwrap();
///
/// assert_eq!(request.attribute("user_id"), Some(&json!(42)));
/// assert_eq!(request.attribute_or("role", json!("guest")), json!("guest"));
/// assert!(request.with_parsed_body(json!("scalar")).is_err());
/// ```
#[derive(Debug, Clone)]
pub struct ServerRequest {
    request: Request,
    params: Arc<ServerParams>,
}

impl ServerRequest {
    /// Wraps `request` with the given server parameters and nothing else.
    pub fn new(request: Request, server: Map<String, Value>) -> Self {
        Self {
            request,
            params: Arc::new(ServerParams {
                server,
                ..ServerParams::default()
            }),
        }
    }

    /// Wraps `request` with no server parameters.
    pub fn from_request(request: Request) -> Self {
        Self::new(request, Map::new())
    }

    /// The underlying request without the server-side data.
    pub fn request(&self) -> &Request {
        &self.request
    }

    fn with_request(&self, request: Request) -> Self {
        if request.same_instance(&self.request) {
            return self.clone();
        }
        Self {
            request,
            params: Arc::clone(&self.params),
        }
    }

    fn map_params(&self, f: impl FnOnce(&mut ServerParams)) -> Self {
        let mut params = (*self.params).clone();
        f(&mut params);
        Self {
            request: self.request.clone(),
            params: Arc::new(params),
        }
    }

    pub fn method(&self) -> &Method {
        self.request.method()
    }

    /// See [`Request::with_method`].
    pub fn with_method(&self, method: &str) -> Result<Self, MessageError> {
        Ok(self.with_request(self.request.with_method(method)?))
    }

    pub fn uri(&self) -> &Uri {
        self.request.uri()
    }

    /// See [`Request::with_uri`].
    pub fn with_uri(&self, uri: Uri, preserve_host: bool) -> Self {
        self.with_request(self.request.with_uri(uri, preserve_host))
    }

    pub fn request_target(&self) -> String {
        self.request.request_target()
    }

    /// See [`Request::with_request_target`].
    pub fn with_request_target(&self, target: &str) -> Result<Self, MessageError> {
        Ok(self.with_request(self.request.with_request_target(target)?))
    }

    /// Environment parameters supplied at construction.
    pub fn server_params(&self) -> &Map<String, Value> {
        &self.params.server
    }

    pub fn cookie_params(&self) -> &BTreeMap<String, String> {
        &self.params.cookies
    }

    pub fn with_cookie_params(&self, cookies: BTreeMap<String, String>) -> Self {
        if cookies == self.params.cookies {
            return self.clone();
        }
        self.map_params(|params| params.cookies = cookies)
    }

    pub fn query_params(&self) -> &Map<String, Value> {
        &self.params.query
    }

    /// Replaces the query parameters. The URI is left untouched.
    pub fn with_query_params(&self, query: Map<String, Value>) -> Self {
        if query == self.params.query {
            return self.clone();
        }
        self.map_params(|params| params.query = query)
    }

    pub fn uploaded_files(&self) -> &UploadedFiles {
        &self.params.files
    }

    pub fn with_uploaded_files(&self, files: UploadedFiles) -> Self {
        self.map_params(|params| params.files = files)
    }

    /// The deserialized body, if one was set.
    pub fn parsed_body(&self) -> Option<&Value> {
        self.params.parsed_body.as_ref()
    }

    /// Replaces the parsed body.
    ///
    /// `null` clears it; arrays and objects are stored as given.
    ///
    /// # Errors
    ///
    /// [`MessageError::InvalidParsedBody`] for strings, numbers and booleans.
    pub fn with_parsed_body(&self, body: Value) -> Result<Self, MessageError> {
        let body = match body {
            Value::Null => None,
            Value::Array(_) | Value::Object(_) => Some(body),
            Value::Bool(_) | Value::Number(_) | Value::String(_) => {
                return Err(MessageError::InvalidParsedBody);
            }
        };
        if body == self.params.parsed_body {
            return Ok(self.clone());
        }
        Ok(self.map_params(|params| params.parsed_body = body))
    }

    pub fn attributes(&self) -> &BTreeMap<String, Value> {
        &self.params.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.params.attributes.get(name)
    }

    /// The attribute `name`, or `default` when it is absent.
    pub fn attribute_or(&self, name: &str, default: Value) -> Value {
        self.attribute(name).cloned().unwrap_or(default)
    }

    pub fn with_attribute(&self, name: impl Into<String>, value: Value) -> Self {
        let name = name.into();
        if self.params.attributes.get(&name) == Some(&value) {
            return self.clone();
        }
        self.map_params(|params| {
            params.attributes.insert(name, value);
        })
    }

    /// Removes the attribute `name`. Returns the same instance if it was absent.
    pub fn without_attribute(&self, name: &str) -> Self {
        if !self.params.attributes.contains_key(name) {
            return self.clone();
        }
        self.map_params(|params| {
            params.attributes.remove(name);
        })
    }
}

impl HttpMessage for ServerRequest {
    fn parts(&self) -> &MessageParts {
        self.request.parts()
    }

    fn map_parts(&self, f: impl FnOnce(&mut MessageParts)) -> Self {
        self.with_request(self.request.map_parts(f))
    }

    fn same_instance(&self, other: &Self) -> bool {
        self.request.same_instance(&other.request) && Arc::ptr_eq(&self.params, &other.params)
    }
}

impl From<Request> for ServerRequest {
    fn from(request: Request) -> Self {
        Self::from_request(request)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::http::{HasBody, HasHeaders};
    use crate::stream::Stream;
    use crate::upload::{UploadedFile, UploadedFileTree};

    fn sample() -> ServerRequest {
        let mut server = Map::new();
        server.insert("REMOTE_ADDR".to_owned(), json!("127.0.0.1"));
        ServerRequest::new(Request::new("GET", "http://example.com/a").unwrap(), server)
    }

    #[test]
    fn server_params_survive_mutation() {
        let req = sample().with_attribute("k", json!(1));
        assert_eq!(req.server_params()["REMOTE_ADDR"], json!("127.0.0.1"));
        let req = req.with_header("X-Test", "1").unwrap();
        assert_eq!(req.server_params().len(), 1);
        assert_eq!(req.attribute("k"), Some(&json!(1)));
    }

    #[test]
    fn attributes() {
        let req = sample();
        let with = req.with_attribute("user", json!({ "id": 7 }));
        assert_eq!(with.attribute("user"), Some(&json!({ "id": 7 })));
        assert!(req.attribute("user").is_none());
        assert_eq!(req.attribute_or("user", json!(null)), json!(null));

        let without = with.without_attribute("user");
        assert!(without.attributes().is_empty());
        assert!(with.attribute("user").is_some());
    }

    #[test]
    fn without_missing_attribute_is_same_instance() {
        let req = sample();
        assert!(req.without_attribute("missing").same_instance(&req));
        let with = req.with_attribute("a", json!(1));
        assert!(with.with_attribute("a", json!(1)).same_instance(&with));
    }

    #[test]
    fn parsed_body_shapes() {
        let req = sample();
        assert!(req.parsed_body().is_none());

        let obj = req.with_parsed_body(json!({ "a": 1 })).unwrap();
        assert_eq!(obj.parsed_body(), Some(&json!({ "a": 1 })));

        let arr = obj.with_parsed_body(json!([1, 2])).unwrap();
        assert_eq!(arr.parsed_body(), Some(&json!([1, 2])));

        let cleared = arr.with_parsed_body(Value::Null).unwrap();
        assert!(cleared.parsed_body().is_none());

        for scalar in [json!(1), json!("x"), json!(true)] {
            assert!(matches!(
                req.with_parsed_body(scalar),
                Err(MessageError::InvalidParsedBody)
            ));
        }
    }

    #[test]
    fn query_params_do_not_touch_uri() {
        let mut query = Map::new();
        query.insert("page".to_owned(), json!("2"));
        let req = sample().with_query_params(query);
        assert_eq!(req.query_params()["page"], json!("2"));
        assert_eq!(req.uri().query(), "");
    }

    #[test]
    fn cookie_params() {
        let mut cookies = BTreeMap::new();
        cookies.insert("session".to_owned(), "abc".to_owned());
        let req = sample();
        let with = req.with_cookie_params(cookies.clone());
        assert_eq!(with.cookie_params().get("session").map(String::as_str), Some("abc"));
        assert!(with.with_cookie_params(cookies).same_instance(&with));
        assert!(req.cookie_params().is_empty());
    }

    #[test]
    fn uploaded_files() {
        let file = UploadedFile::from_stream(Stream::from_bytes("data"), Some(4), 0).unwrap();
        let mut files = UploadedFiles::new();
        files.insert("doc".to_owned(), UploadedFileTree::from(file));
        let req = sample().with_uploaded_files(files);
        let doc = req.uploaded_files()["doc"].as_file().unwrap();
        assert_eq!(doc.size(), Some(4));
    }

    #[test]
    fn request_delegation() {
        let req = sample();
        let posted = req.with_method("post").unwrap();
        assert_eq!(posted.method(), &Method::Post);
        assert_eq!(req.method(), &Method::Get);
        assert!(req.with_method("GET").unwrap().same_instance(&req));

        let moved = req.with_uri(Uri::parse("http://other.org/b").unwrap(), false);
        assert_eq!(moved.header_line("host"), "other.org");
        assert_eq!(moved.request_target(), "/b");
        assert_eq!(moved.server_params().len(), 1);
    }

    #[test]
    fn message_mutators_keep_params() {
        let req = sample().with_attribute("a", json!(1));
        let with_body = req.with_body(Stream::from_bytes("x"));
        assert_eq!(with_body.attribute("a"), Some(&json!(1)));
        assert!(req.with_protocol_version("1.1").unwrap().same_instance(&req));
    }
}
