use reqwest::StatusCode;
use thiserror::Error;

use crate::api::decoder::DecodeError;

/// Everything that can end a turn other than a normal completion or a
/// user-requested cancellation.
#[derive(Debug, Error)]
pub enum TurnError {
    #[error("question is empty")]
    Validation,
    #[error(transparent)]
    Request(#[from] RequestError),
    #[error(transparent)]
    Stream(#[from] StreamError),
}

impl TurnError {
    pub fn is_validation(&self) -> bool {
        matches!(self, TurnError::Validation)
    }
}

/// Failures before the response body starts flowing.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("server error: {status} {body}")]
    Status { status: StatusCode, body: String },
    #[error("cannot reach answer service '{url}': {message}")]
    Connect { url: String, message: String },
    #[error("request to '{url}' timed out: {message}")]
    Timeout { url: String, message: String },
    #[error("answer service returned an unreadable body: {0}")]
    InvalidBody(String),
    #[error("request to '{url}' failed: {message}")]
    Other { url: String, message: String },
}

/// Failures after streaming has started.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("stream interrupted: {0}")]
    Read(String),
    #[error(transparent)]
    Decode(#[from] DecodeError),
}
