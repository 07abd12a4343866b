use apiwire_core::{ApiError, ConfigError, TransportError};
use thiserror::Error;

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("transport setup failed: {0}")]
    Transport(#[from] TransportError),

    #[error("request body is not valid JSON: {0}")]
    Body(serde_json::Error),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

impl CliError {
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Api(ApiError::InvalidUrl) => 2,
            Self::Api(ApiError::HttpCode(_)) => 3,
            Self::Api(ApiError::Decoding(_)) => 4,
            Self::Api(ApiError::UnexpectedResponse) => 5,
            Self::Config(_) | Self::Transport(_) => 6,
            Self::Body(_) => 2,
            Self::Serialization(_) => 4,
        }
    }
}
