//! Error handling and custom error types
//!
//! Provides unified error handling across the crate using thiserror.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid aspect ratio '{0}': expected W/H with positive numbers")]
    InvalidAspectRatio(String),

    #[error("Invalid dimensions {width}x{height}: both sides must be positive")]
    InvalidDimensions { width: u32, height: u32 },

    /// Non-2xx or unusable response from the inference endpoint.
    #[error("Inference API error: {message}")]
    Upstream { status: Option<u16>, message: String },

    #[error("Invariant violation: {0}")]
    Invariant(String),
}

impl Error {
    /// True for failures that happened before a response was received.
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Transport(_) | Error::Http(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
