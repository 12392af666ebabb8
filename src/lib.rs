//! # httpmsg
//!
//! Immutable HTTP message values: requests, responses, server-side requests,
//! URIs, body streams and uploaded files.
//!
//! Every `with_*` method returns a new value and leaves the original
//! untouched; when the call would change nothing, the same instance comes
//! back. Body streams are the one shared, stateful piece and are passed
//! around as `Arc<Stream>`.
//!
//! ## Quick Start
//!
//! ```rust
//! use httpmsg::http::{HasBody, HasHeaders, Request, Response};
//! use httpmsg::stream::Stream;
//!
//! let request = Request::new("GET", "https://example.com/users?page=1").unwrap();
//! assert_eq!(request.header_line("host"), "example.com");
//!
//! let response = Response::new(200).unwrap()
//!     .with_header("Content-Type", "text/plain").unwrap()
//!     .with_body(Stream::from_bytes("Hello, World!"));
//! assert_eq!(response.body().unwrap().to_string(), "Hello, World!");
//! ```
//!
//! The crate logs through [`tracing`]; install a subscriber to see events.

pub mod config;
pub mod error;
pub mod factory;
pub mod http;
pub mod stream;
pub mod upload;

pub use config::Config;
pub use error::{Error, Result};
pub use factory::{Environment, ServerRequestFactory, UploadSpec};
pub use http::{
    HasBody, HasHeaders, Headers, HttpMessage, Method, Request, Response, ServerRequest,
    StatusCode, Uri, Version,
};
pub use stream::Stream;
pub use upload::{UploadedFile, UploadedFileTree, UploadedFiles};
