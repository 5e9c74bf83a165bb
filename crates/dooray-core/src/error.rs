//! Error types for dooray-tools.

use thiserror::Error;

/// Main error type for dooray-tools operations.
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(String),

    /// Authentication failed
    #[error("Authentication error: {0}")]
    Auth(String),

    /// API returned an error
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Serialization/deserialization failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Response could not be interpreted
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Generic error
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Map an HTTP status code to the appropriate error variant.
    pub fn from_status(status: u16, message: String) -> Self {
        match status {
            401 | 403 => Error::Auth(message),
            _ => Error::Api { status, message },
        }
    }
}

/// Result type alias for dooray-tools operations.
pub type Result<T> = std::result::Result<T, Error>;
