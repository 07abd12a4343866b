//! Decode capability: raw bytes into a typed value.

use serde::de::DeserializeOwned;

use crate::error::DecodeError;

/// Turns a response body into `T` or fails with a [`DecodeError`].
pub trait Decoder: Send + Sync {
    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, DecodeError>;
}

/// `serde_json`-backed decoder, the default for [`WebRepository`](crate::WebRepository).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JsonDecoder {
    empty_body_as_null: bool,
}

impl JsonDecoder {
    pub const fn new() -> Self {
        Self {
            empty_body_as_null: false,
        }
    }

    /// Decode an empty (or whitespace-only) body as JSON `null`, so `()` and
    /// `Option<T>` targets accept `204 No Content` responses.
    pub const fn empty_body_as_null(mut self, enabled: bool) -> Self {
        self.empty_body_as_null = enabled;
        self
    }
}

impl Decoder for JsonDecoder {
    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, DecodeError> {
        if self.empty_body_as_null && bytes.iter().all(u8::is_ascii_whitespace) {
            return serde_json::from_slice(b"null").map_err(DecodeError::from);
        }

        serde_json::from_slice(bytes).map_err(|error| {
            tracing::debug!(
                line = error.line(),
                column = error.column(),
                "response body did not match the expected type: {error}"
            );
            DecodeError::from(error)
        })
    }
}
