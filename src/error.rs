//! Crate-wide error type.

use thiserror::Error;

use crate::config::ConfigError;
use crate::factory::FactoryError;
use crate::http::{MessageError, UriError};
use crate::stream::StreamError;
use crate::upload::UploadError;

/// Any error produced by this crate.
///
/// Each module has its own error enum; this wraps them so callers can use
/// `?` across module boundaries.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid URI: {0}")]
    Uri(#[from] UriError),

    #[error("stream error: {0}")]
    Stream(#[from] StreamError),

    #[error("invalid message: {0}")]
    Message(#[from] MessageError),

    #[error("upload error: {0}")]
    Upload(#[from] UploadError),

    #[error("factory error: {0}")]
    Factory(#[from] FactoryError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
