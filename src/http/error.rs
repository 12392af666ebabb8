use thiserror::Error;

use super::uri::UriError;

/// Errors raised while constructing or modifying a message.
///
/// Validation always happens before a modified copy is produced, so a failed
/// `with_*` call leaves the original message untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MessageError {
    #[error("header `{name}` must have at least one non-empty value")]
    EmptyHeader { name: String },

    #[error("header `{name}` contains a carriage return or line feed")]
    InvalidHeaderChar { name: String },

    #[error("invalid header name `{name}`")]
    InvalidHeaderName { name: String },

    #[error("unsupported protocol version `{version}`")]
    InvalidProtocolVersion { version: String },

    #[error("invalid request method `{method}`")]
    InvalidMethod { method: String },

    #[error("status code {code} is outside 100..=599")]
    InvalidStatus { code: u16 },

    #[error("reason phrase contains a carriage return or line feed")]
    InvalidReasonPhrase,

    #[error("request target `{target}` contains whitespace")]
    InvalidRequestTarget { target: String },

    #[error("parsed body must be absent, an array or an object")]
    InvalidParsedBody,

    #[error("message has no body")]
    BodyNotSet,

    #[error(transparent)]
    Uri(#[from] UriError),
}
