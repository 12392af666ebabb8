//! Building a [`ServerRequest`] from the server-parameter table a hosting
//! environment hands to a request handler.
//!
//! The table follows the CGI naming convention: request headers appear as
//! `HTTP_*` keys, the request line as `REQUEST_METHOD`, `REQUEST_URI`,
//! `QUERY_STRING` and `SERVER_PROTOCOL`, and the connection as `HTTPS`,
//! `SERVER_NAME` and `SERVER_PORT`.

use std::collections::BTreeMap;
use std::sync::Arc;

use percent_encoding::percent_decode_str;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{trace, warn};

use crate::config::Config;
use crate::http::headers::{self, HeaderValues};
use crate::http::{HasHeaders, MessageError, Request, ServerRequest, Uri, UriError, Version};
use crate::stream::Stream;
use crate::upload::{UploadError, UploadedFile, UploadedFileTree, UploadedFiles};

/// Keys mapped to headers without the `HTTP_` prefix.
const CONTENT_KEYS: [(&str, &str); 3] = [
    ("CONTENT_TYPE", "content-type"),
    ("CONTENT_LENGTH", "content-length"),
    ("CONTENT_MD5", "content-md5"),
];

const AUTH_USER: &str = "AUTH_USER";
const AUTH_PASSWORD: &str = "AUTH_PW";

#[derive(Debug, Error)]
pub enum FactoryError {
    #[error(transparent)]
    Uri(#[from] UriError),

    #[error(transparent)]
    Message(#[from] MessageError),

    #[error(transparent)]
    Upload(#[from] UploadError),
}

/// One node of an upload specification tree.
#[derive(Debug, Clone)]
pub enum UploadSpec {
    /// An already-built file, kept as is.
    File(Arc<UploadedFile>),
    /// A JSON description: either a leaf with at least `tmp_name` and
    /// `error` (plus optional `size`, `name`, `type`), or an object of
    /// further descriptions.
    Value(Value),
    /// Named children.
    Tree(BTreeMap<String, UploadSpec>),
}

impl From<UploadedFile> for UploadSpec {
    fn from(file: UploadedFile) -> Self {
        Self::File(Arc::new(file))
    }
}

impl From<Value> for UploadSpec {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

/// The ambient state of one incoming request.
///
/// Only `server` is required. When `cookies` or `query` is `None` it is
/// derived from the `Cookie` header or the URI query.
#[derive(Debug, Default)]
pub struct Environment {
    pub server: Map<String, Value>,
    pub files: BTreeMap<String, UploadSpec>,
    pub cookies: Option<BTreeMap<String, String>>,
    pub query: Option<Map<String, Value>>,
    pub parsed_body: Option<Value>,
    pub body: Option<Arc<Stream>>,
}

impl Environment {
    pub fn new(server: Map<String, Value>) -> Self {
        Self {
            server,
            ..Self::default()
        }
    }
}

/// Creates server requests.
///
/// # Examples
///
/// ```
/// use httpmsg::factory::{Environment, ServerRequestFactory};
/// use httpmsg::http::HasHeaders;
/// use serde_json::json;
///
/// let server = json!({
///     "REQUEST_METHOD": "POST",
///     "REQUEST_URI": "/items?page=2",
///     "HTTP_HOST": "shop.example:8080",
///     "HTTP_X_REQUEST_ID": "abc",
///     "CONTENT_TYPE": "application/json",
/// });
/// let env = Environment::new(server.as_object().unwrap().clone());
/// let request = ServerRequestFactory::default().from_environment(env).unwrap();
///
/// assert_eq!(request.method().as_str(), "POST");
/// assert_eq!(request.uri().to_string(), "http://shop.example:8080/items?page=2");
/// assert_eq!(request.header_line("x-request-id"), "abc");
/// assert_eq!(request.query_params()["page"], json!("2"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct ServerRequestFactory {
    config: Config,
}

impl ServerRequestFactory {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Creates a bare server request from a method, URI and server parameters.
    ///
    /// # Errors
    ///
    /// [`FactoryError::Message`] for an invalid method or URI.
    pub fn create_server_request(
        &self,
        method: &str,
        uri: &str,
        server: Map<String, Value>,
    ) -> Result<ServerRequest, FactoryError> {
        let version = self.config.protocol_version().unwrap_or_default();
        let request = Request::builder(method, uri)
            .version(version.as_str())
            .build()?;
        Ok(ServerRequest::new(request, server))
    }

    /// Builds a server request from `env`.
    ///
    /// # Errors
    ///
    /// - [`FactoryError::Uri`]: the host, scheme or port is invalid.
    /// - [`FactoryError::Message`]: bad method or protocol version, or a
    ///   scalar parsed body.
    /// - [`FactoryError::Upload`]: an upload specification is malformed or
    ///   its temporary file cannot be opened.
    pub fn from_environment(&self, env: Environment) -> Result<ServerRequest, FactoryError> {
        let server = &env.server;
        let method = server_str(server, "REQUEST_METHOD").unwrap_or_else(|| "GET".to_owned());
        let version = match server_str(server, "SERVER_PROTOCOL") {
            Some(protocol) => protocol
                .strip_prefix("HTTP/")
                .unwrap_or(&protocol)
                .parse::<Version>()?,
            None => self.config.protocol_version().unwrap_or_default(),
        };
        let uri = uri_from_server(server, &self.config.default_host)?;

        let mut builder = Request::builder(&method, uri.clone()).version(version.as_str());
        for (name, values) in headers_from_server(server) {
            builder = builder.header(name, values);
        }
        if let Some(body) = env.body {
            builder = builder.body(body);
        }
        let request = builder.build()?;

        let cookies = match env.cookies {
            Some(cookies) => cookies,
            None => parse_cookie_header(request.header("cookie")),
        };
        let query = match env.query {
            Some(query) => query,
            None => parse_query(uri.query()),
        };
        let files = self.normalize_files(env.files)?;

        let mut server_request = ServerRequest::new(request, env.server)
            .with_cookie_params(cookies)
            .with_query_params(query)
            .with_uploaded_files(files);
        if let Some(body) = env.parsed_body {
            server_request = server_request.with_parsed_body(body)?;
        }
        Ok(server_request)
    }

    /// Turns an upload specification tree into [`UploadedFiles`].
    ///
    /// # Errors
    ///
    /// [`UploadError::InvalidSpec`] for leaves that are neither files nor
    /// complete descriptions, or any error opening a described file.
    pub fn normalize_files(
        &self,
        files: BTreeMap<String, UploadSpec>,
    ) -> Result<UploadedFiles, UploadError> {
        files
            .into_iter()
            .map(|(key, spec)| Ok((key, self.normalize_spec(spec)?)))
            .collect()
    }

    fn normalize_spec(&self, spec: UploadSpec) -> Result<UploadedFileTree, UploadError> {
        match spec {
            UploadSpec::File(file) => Ok(UploadedFileTree::File(file)),
            UploadSpec::Tree(children) => Ok(UploadedFileTree::Nested(self.normalize_files(children)?)),
            UploadSpec::Value(value) => self.normalize_value(value),
        }
    }

    fn normalize_value(&self, value: Value) -> Result<UploadedFileTree, UploadError> {
        let Value::Object(fields) = value else {
            return Err(UploadError::InvalidSpec {
                reason: format!("expected an object, found `{value}`"),
            });
        };
        let multi = fields
            .get("tmp_name")
            .map(|tmp_name| tmp_name.is_array() || tmp_name.is_object());
        match multi {
            Some(true) => self.expand_multi_file(&fields),
            Some(false) => self.file_from_fields(&fields).map(UploadedFileTree::from),
            None if fields.contains_key("error") => Err(UploadError::InvalidSpec {
                reason: "missing `tmp_name`".to_owned(),
            }),
            None => {
                let children = fields
                    .into_iter()
                    .map(|(key, child)| Ok((key, self.normalize_value(child)?)))
                    .collect::<Result<_, UploadError>>()?;
                Ok(UploadedFileTree::Nested(children))
            }
        }
    }

    /// Splits a description whose fields are parallel lists or maps into one
    /// description per entry of `tmp_name`.
    fn expand_multi_file(&self, fields: &Map<String, Value>) -> Result<UploadedFileTree, UploadError> {
        let keys: Vec<String> = match fields.get("tmp_name") {
            Some(Value::Array(items)) => (0..items.len()).map(|i| i.to_string()).collect(),
            Some(Value::Object(map)) => map.keys().cloned().collect(),
            _ => Vec::new(),
        };
        let mut children = BTreeMap::new();
        for key in keys {
            let mut entry = Map::new();
            for field in ["tmp_name", "error", "size", "name", "type"] {
                if let Some(value) = fields.get(field).and_then(|v| index(v, &key)) {
                    entry.insert(field.to_owned(), value.clone());
                }
            }
            children.insert(key, self.normalize_value(Value::Object(entry))?);
        }
        Ok(UploadedFileTree::Nested(children))
    }

    fn file_from_fields(&self, fields: &Map<String, Value>) -> Result<UploadedFile, UploadError> {
        let tmp_name = fields
            .get("tmp_name")
            .and_then(Value::as_str)
            .ok_or_else(|| UploadError::InvalidSpec {
                reason: "`tmp_name` must be a string".to_owned(),
            })?;
        let error = fields
            .get("error")
            .and_then(as_integer)
            .ok_or_else(|| UploadError::InvalidSpec {
                reason: "missing or non-integer `error`".to_owned(),
            })?;
        let size = fields.get("size").and_then(as_integer).and_then(|s| u64::try_from(s).ok());

        let mut file = UploadedFile::from_path(tmp_name, size, error)?
            .with_chunk_size(self.config.copy_chunk_size);
        if let Some(name) = fields.get("name").and_then(Value::as_str) {
            file = file.with_client_filename(name);
        }
        if let Some(media_type) = fields.get("type").and_then(Value::as_str) {
            file = file.with_client_media_type(media_type);
        }
        Ok(file)
    }
}

fn index<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    match value {
        Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
        Value::Object(map) => map.get(key),
        _ => None,
    }
}

fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Renders a scalar as a string; `null` and containers become `""`.
fn scalar_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(true) => "1".to_owned(),
        Value::Bool(false) | Value::Null | Value::Array(_) | Value::Object(_) => String::new(),
    }
}

fn server_str(server: &Map<String, Value>, key: &str) -> Option<String> {
    server
        .get(key)
        .map(scalar_string)
        .filter(|value| !value.is_empty())
}

/// Extracts headers from `HTTP_*` and `CONTENT_*` keys.
///
/// Non-scalar values become an empty string. Values containing CR or LF are
/// skipped.
pub fn headers_from_server(server: &Map<String, Value>) -> Vec<(String, Vec<String>)> {
    let mut headers = Vec::new();
    for (key, value) in server {
        let name = if let Some(rest) = key.strip_prefix("HTTP_") {
            rest.to_ascii_lowercase().replace('_', "-")
        } else if let Some((_, name)) = CONTENT_KEYS.iter().find(|(k, _)| k == key) {
            (*name).to_owned()
        } else {
            continue;
        };

        let values = match value {
            Value::Array(items) => HeaderValues::List(items.iter().map(scalar_string).collect()),
            other => HeaderValues::Single(scalar_string(other)),
        };
        if let Err(e) = headers::validate_name(&name) {
            warn!(key = %key, error = %e, "skipping server parameter");
            continue;
        }
        match values.validate_lenient(&name) {
            Ok(values) => {
                trace!(header = %name, "header extracted from server parameters");
                headers.push((name, values));
            }
            Err(e) => trace!(header = %name, error = %e, "skipping header value"),
        }
    }
    headers
}

/// Derives the request URI from the server parameters.
///
/// # Errors
///
/// [`UriError`] if the derived scheme, host or port is invalid.
pub fn uri_from_server(server: &Map<String, Value>, default_host: &str) -> Result<Uri, UriError> {
    let https = server_str(server, "HTTPS").is_some_and(|v| !v.eq_ignore_ascii_case("off"));
    let scheme = if https {
        "https".to_owned()
    } else {
        server_str(server, "HTTP_X_FORWARDED_PROTO")
            .or_else(|| server_str(server, "REQUEST_SCHEME"))
            .unwrap_or_else(|| "http".to_owned())
    };

    let host_field = server_str(server, "HTTP_HOST")
        .or_else(|| server_str(server, "SERVER_NAME"))
        .unwrap_or_else(|| default_host.to_owned());
    let (host, embedded_port) = split_host_port(&host_field);
    let port = match embedded_port.or_else(|| server_str(server, "SERVER_PORT")) {
        Some(port) => Some(port.parse::<u16>().map_err(|_| UriError::InvalidPort { port })?),
        None => None,
    };

    let request_uri = server_str(server, "REQUEST_URI").unwrap_or_default();
    let (path, uri_query) = match request_uri.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (request_uri.as_str(), None),
    };
    let path = if path.is_empty() { "/" } else { path };
    let query = server_str(server, "QUERY_STRING")
        .or_else(|| uri_query.map(str::to_owned))
        .unwrap_or_default();

    let mut uri = Uri::default()
        .with_scheme(&scheme)?
        .with_host(host)?
        .with_port(port)?
        .with_path(path)
        .with_query(&query);
    if let Some(user) = server_str(server, AUTH_USER) {
        uri = uri.with_user_info(&user, server_str(server, AUTH_PASSWORD).as_deref());
    }
    Ok(uri)
}

/// Splits `host[:port]`, leaving bracketed IPv6 literals intact.
fn split_host_port(field: &str) -> (&str, Option<String>) {
    let port_start = match field.rfind(':') {
        Some(i) if !field[i..].contains(']') => i,
        _ => return (field, None),
    };
    if field[..port_start].contains(':') && !field.starts_with('[') {
        return (field, None);
    }
    (&field[..port_start], Some(field[port_start + 1..].to_owned()))
}

/// Parses `Cookie` header values as `;`-separated pairs. The first
/// occurrence of a name wins.
fn parse_cookie_header(values: &[String]) -> BTreeMap<String, String> {
    let mut cookies = BTreeMap::new();
    for pair in values.iter().flat_map(|value| value.split(';')) {
        let Some((name, value)) = pair.trim().split_once('=') else {
            continue;
        };
        let name = name.trim();
        if name.is_empty() {
            continue;
        }
        let value = percent_decode_str(value.trim().trim_matches('"')).decode_utf8_lossy();
        cookies
            .entry(name.to_owned())
            .or_insert_with(|| value.into_owned());
    }
    cookies
}

/// Parses a flat `application/x-www-form-urlencoded` query. The last
/// occurrence of a name wins.
fn parse_query(query: &str) -> Map<String, Value> {
    let mut params = Map::new();
    for pair in query.split('&').filter(|pair| !pair.is_empty()) {
        let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
        let name = decode_form(name);
        if name.is_empty() {
            continue;
        }
        params.insert(name, Value::String(decode_form(value)));
    }
    params
}

fn decode_form(input: &str) -> String {
    percent_decode_str(&input.replace('+', " "))
        .decode_utf8_lossy()
        .into_owned()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::http::{HasBody, HttpMessage};
    use crate::upload::UploadErrorCode;

    fn server(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("server parameters must be an object"),
        }
    }

    fn temp_file(name: &str, content: &str) -> String {
        let path = std::env::temp_dir().join(format!("httpmsg-factory-{}-{name}", std::process::id()));
        std::fs::write(&path, content).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn header_extraction() {
        let headers = headers_from_server(&server(json!({
            "HTTP_ACCEPT_LANGUAGE": "en",
            "HTTP_X_LIST": ["a", "b"],
            "CONTENT_TYPE": "text/plain",
            "CONTENT_LENGTH": 12,
            "REMOTE_ADDR": "127.0.0.1",
        })));
        let find = |name: &str| headers.iter().find(|(n, _)| n == name).map(|(_, v)| v.clone());
        assert_eq!(find("accept-language"), Some(vec!["en".to_owned()]));
        assert_eq!(find("x-list"), Some(vec!["a".to_owned(), "b".to_owned()]));
        assert_eq!(find("content-type"), Some(vec!["text/plain".to_owned()]));
        assert_eq!(find("content-length"), Some(vec!["12".to_owned()]));
        assert_eq!(headers.len(), 4);
    }

    #[test]
    fn invalid_header_values_are_skipped() {
        let headers = headers_from_server(&server(json!({
            "HTTP_X_EMPTY": "",
            "HTTP_X_OBJECT": { "a": 1 },
            "HTTP_X_CRLF": "a\r\nb",
            "HTTP_X_OK": "ok",
        })));
        let expected = [("x-empty", ""), ("x-object", ""), ("x-ok", "ok")]
            .map(|(name, value)| (name.to_owned(), vec![value.to_owned()]));
        assert_eq!(headers, expected);
    }

    #[test]
    fn empty_server_headers_reach_the_request() {
        let env = Environment::new(server(json!({
            "REQUEST_METHOD": "GET",
            "HTTP_REFERER": "",
            "HTTP_X_OBJ": { "a": 1 },
        })));
        let req = ServerRequestFactory::default().from_environment(env).unwrap();
        assert!(req.has_header("referer"));
        assert_eq!(req.header("referer"), [""]);
        assert_eq!(req.header("x-obj"), [""]);
    }

    #[test]
    fn uri_defaults() {
        let uri = uri_from_server(&Map::new(), "localhost").unwrap();
        assert_eq!(uri.to_string(), "http://localhost/");
    }

    #[test]
    fn uri_scheme_selection() {
        let https = uri_from_server(&server(json!({ "HTTPS": "on" })), "h").unwrap();
        assert_eq!(https.scheme(), "https");
        let off = uri_from_server(&server(json!({ "HTTPS": "off" })), "h").unwrap();
        assert_eq!(off.scheme(), "http");
        let forwarded =
            uri_from_server(&server(json!({ "HTTP_X_FORWARDED_PROTO": "https" })), "h").unwrap();
        assert_eq!(forwarded.scheme(), "https");
    }

    #[test]
    fn embedded_port_wins() {
        let uri = uri_from_server(
            &server(json!({ "HTTP_HOST": "example.com:8080", "SERVER_PORT": "9090" })),
            "h",
        )
        .unwrap();
        assert_eq!(uri.host(), "example.com");
        assert_eq!(uri.port(), Some(8080));

        let uri = uri_from_server(
            &server(json!({ "SERVER_NAME": "example.com", "SERVER_PORT": 9090 })),
            "h",
        )
        .unwrap();
        assert_eq!(uri.port(), Some(9090));
    }

    #[test]
    fn ipv6_host() {
        let uri = uri_from_server(&server(json!({ "HTTP_HOST": "[::1]:8080" })), "h").unwrap();
        assert_eq!(uri.host(), "[::1]");
        assert_eq!(uri.port(), Some(8080));
    }

    #[test]
    fn bad_port() {
        assert!(matches!(
            uri_from_server(&server(json!({ "HTTP_HOST": "h:http" })), "h"),
            Err(UriError::InvalidPort { .. })
        ));
    }

    #[test]
    fn path_query_and_auth() {
        let uri = uri_from_server(
            &server(json!({
                "REQUEST_URI": "/a/b?x=1",
                "AUTH_USER": "ada",
                "AUTH_PW": "secret",
            })),
            "h",
        )
        .unwrap();
        assert_eq!(uri.path(), "/a/b");
        assert_eq!(uri.query(), "x=1");
        assert_eq!(uri.user_info(), "ada:secret");

        let uri = uri_from_server(
            &server(json!({ "REQUEST_URI": "/a?x=1", "QUERY_STRING": "y=2" })),
            "h",
        )
        .unwrap();
        assert_eq!(uri.query(), "y=2");
    }

    #[test]
    fn from_environment_full() {
        let mut env = Environment::new(server(json!({
            "REQUEST_METHOD": "put",
            "SERVER_PROTOCOL": "HTTP/1.0",
            "REQUEST_URI": "/things?a=1&b=two+words",
            "HTTP_HOST": "api.test",
            "HTTP_COOKIE": "session=abc%20def; theme=dark",
        })));
        env.body = Some(Arc::new(Stream::from_bytes("payload")));
        env.parsed_body = Some(json!({ "k": "v" }));

        let req = ServerRequestFactory::default().from_environment(env).unwrap();
        assert_eq!(req.method().as_str(), "PUT");
        assert_eq!(req.protocol_version(), Version::Http10);
        assert_eq!(req.header_line("host"), "api.test");
        assert_eq!(req.cookie_params()["session"], "abc def");
        assert_eq!(req.cookie_params()["theme"], "dark");
        assert_eq!(req.query_params()["b"], json!("two words"));
        assert_eq!(req.parsed_body(), Some(&json!({ "k": "v" })));
        assert_eq!(req.body().unwrap().to_string(), "payload");
        assert_eq!(req.server_params()["REQUEST_METHOD"], json!("put"));
    }

    #[test]
    fn explicit_tables_win() {
        let mut env = Environment::new(server(json!({
            "REQUEST_URI": "/?a=1",
            "HTTP_COOKIE": "a=1",
        })));
        env.cookies = Some(BTreeMap::new());
        env.query = Some(Map::new());
        let req = ServerRequestFactory::default().from_environment(env).unwrap();
        assert!(req.cookie_params().is_empty());
        assert!(req.query_params().is_empty());
    }

    #[test]
    fn default_host_and_version_from_config() {
        let config = Config::from_json_str(r#"{"default_host":"fallback.test","default_protocol_version":"2"}"#)
            .unwrap();
        let req = ServerRequestFactory::new(config)
            .from_environment(Environment::default())
            .unwrap();
        assert_eq!(req.uri().host(), "fallback.test");
        assert_eq!(req.protocol_version(), Version::Http2);
        assert_eq!(req.method().as_str(), "GET");
    }

    #[test]
    fn scalar_parsed_body_is_rejected() {
        let mut env = Environment::default();
        env.parsed_body = Some(json!(5));
        assert!(matches!(
            ServerRequestFactory::default().from_environment(env),
            Err(FactoryError::Message(MessageError::InvalidParsedBody))
        ));
    }

    #[test]
    fn single_upload_spec() {
        let path = temp_file("single", "hello");
        let mut files = BTreeMap::new();
        files.insert(
            "avatar".to_owned(),
            UploadSpec::from(json!({
                "tmp_name": path,
                "error": 0,
                "size": 5,
                "name": "me.png",
                "type": "image/png",
            })),
        );
        let tree = ServerRequestFactory::default().normalize_files(files).unwrap();
        let file = tree["avatar"].as_file().unwrap();
        assert_eq!(file.size(), Some(5));
        assert_eq!(file.client_filename(), Some("me.png"));
        assert_eq!(file.client_media_type(), Some("image/png"));
        assert_eq!(file.stream().unwrap().to_string(), "hello");
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn multi_file_spec_expands() {
        let first = temp_file("multi-0", "one");
        let mut files = BTreeMap::new();
        files.insert(
            "docs".to_owned(),
            UploadSpec::from(json!({
                "tmp_name": [first, ""],
                "error": [0, 4],
                "size": [3, 0],
                "name": ["one.txt", ""],
            })),
        );
        let tree = ServerRequestFactory::default().normalize_files(files).unwrap();
        let docs = &tree["docs"];
        let one = docs.get("0").and_then(UploadedFileTree::as_file).unwrap();
        assert_eq!(one.client_filename(), Some("one.txt"));
        assert_eq!(one.stream().unwrap().to_string(), "one");
        let missing = docs.get("1").and_then(UploadedFileTree::as_file).unwrap();
        assert_eq!(missing.error(), UploadErrorCode::NoFile);
        std::fs::remove_file(first).unwrap();
    }

    #[test]
    fn nested_specs_and_built_files() {
        let built = UploadedFile::from_stream(Stream::from_bytes("x"), Some(1), 0).unwrap();
        let mut inner = BTreeMap::new();
        inner.insert("built".to_owned(), UploadSpec::from(built));
        inner.insert(
            "described".to_owned(),
            UploadSpec::from(json!({ "photo": { "tmp_name": "", "error": 4 } })),
        );
        let mut files = BTreeMap::new();
        files.insert("form".to_owned(), UploadSpec::Tree(inner));

        let tree = ServerRequestFactory::default().normalize_files(files).unwrap();
        let form = &tree["form"];
        assert!(form.get("built").and_then(UploadedFileTree::as_file).is_some());
        let photo = form
            .get("described")
            .and_then(|t| t.get("photo"))
            .and_then(UploadedFileTree::as_file)
            .unwrap();
        assert_eq!(photo.error(), UploadErrorCode::NoFile);
    }

    #[test]
    fn malformed_specs_fail() {
        let factory = ServerRequestFactory::default();
        for spec in [json!("string"), json!({ "error": 0 }), json!({ "tmp_name": "x" })] {
            let mut files = BTreeMap::new();
            files.insert("f".to_owned(), UploadSpec::from(spec));
            assert!(matches!(
                factory.normalize_files(files),
                Err(UploadError::InvalidSpec { .. })
            ));
        }
    }

    #[test]
    fn cookie_parsing() {
        let values = [r#"a=1; b="quoted""#, "a=2; broken; =x"].map(str::to_owned);
        let cookies = parse_cookie_header(&values);
        assert_eq!(cookies.len(), 2);
        assert_eq!(cookies["a"], "1");
        assert_eq!(cookies["b"], "quoted");
    }

    #[test]
    fn cookie_values_keep_commas() {
        let values = ["list=a,b; c=d".to_owned()];
        let cookies = parse_cookie_header(&values);
        assert_eq!(cookies["list"], "a,b");
        assert_eq!(cookies["c"], "d");
    }

    #[test]
    fn create_server_request_directly() {
        let req = ServerRequestFactory::default()
            .create_server_request("GET", "https://example.com/x", Map::new())
            .unwrap();
        assert_eq!(req.header_line("host"), "example.com");
        assert!(req.server_params().is_empty());
        assert!(ServerRequestFactory::default()
            .create_server_request("BAD METHOD", "/", Map::new())
            .is_err());
    }
}
