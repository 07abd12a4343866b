//! Error taxonomy produced by the call pipeline.
//!
//! [`ApiError`] is a closed set: every failure that leaves
//! [`WebRepository`](crate::WebRepository) is one of its four variants.
//! Lower-level transport and decode failures are normalized into it.

use std::error::Error as StdError;
use std::fmt::{Display, Formatter};

use thiserror::Error;

/// Classified failure of a single API call.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The endpoint and base URL could not form a valid request target.
    #[error("invalid URL")]
    InvalidUrl,

    /// The transport returned no usable status code, or failed for a reason
    /// unrelated to HTTP semantics.
    #[error("unexpected response")]
    UnexpectedResponse,

    /// A response arrived but its status code is outside the success policy.
    #[error("unexpected HTTP status code {0}")]
    HttpCode(u16),

    /// The response body did not match the expected type.
    #[error("failed to decode response body: {0}")]
    Decoding(#[source] DecodeError),
}

impl ApiError {
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidUrl => "api.invalid_url",
            Self::UnexpectedResponse => "api.unexpected_response",
            Self::HttpCode(_) => "api.http_code",
            Self::Decoding(_) => "api.decoding",
        }
    }

    /// Status code carried by [`ApiError::HttpCode`].
    pub const fn status_code(&self) -> Option<u16> {
        match self {
            Self::HttpCode(code) => Some(*code),
            _ => None,
        }
    }

    pub const fn is_decoding(&self) -> bool {
        matches!(self, Self::Decoding(_))
    }
}

/// Shorthand for results produced by the call pipeline.
pub type ApiResult<T> = Result<T, ApiError>;

type BoxedCause = Box<dyn StdError + Send + Sync + 'static>;

/// Failure reported by a [`Decoder`](crate::Decoder).
///
/// Keeps the underlying cause reachable through [`StdError::source`] so
/// callers can inspect e.g. the `serde_json::Error` line and column.
#[derive(Debug)]
pub struct DecodeError {
    message: String,
    cause: Option<BoxedCause>,
}

impl DecodeError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            cause: None,
        }
    }

    pub fn from_cause<E>(cause: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self {
            message: cause.to_string(),
            cause: Some(Box::new(cause)),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Attempts to view the underlying cause as a concrete error type.
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: StdError + 'static,
    {
        self.cause.as_deref().and_then(|cause| cause.downcast_ref::<E>())
    }
}

impl Display for DecodeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl StdError for DecodeError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.cause
            .as_deref()
            .map(|cause| cause as &(dyn StdError + 'static))
    }
}

impl From<serde_json::Error> for DecodeError {
    fn from(error: serde_json::Error) -> Self {
        Self::from_cause(error)
    }
}
