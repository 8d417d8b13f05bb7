//! SBI Error Types

use thiserror::Error;

/// SBI Error type
#[derive(Error, Debug)]
pub enum SbiError {
    /// TCP connect or HTTP/2 handshake failed
    #[error("HTTP/2 connection error: {0}")]
    ConnectionError(String),

    /// Connect or request timed out
    #[error("Request timeout")]
    Timeout,

    #[error("Invalid URI: {0}")]
    InvalidUri(String),

    #[error("Invalid HTTP method: {0}")]
    InvalidMethod(String),

    /// A header or the body could not be put on the wire
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Listener could not be bound or the server is in the wrong state
    #[error("Server error: {0}")]
    ServerError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// The HTTP/2 exchange failed after the connection was up
    #[error("Hyper error: {0}")]
    HyperError(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl SbiError {
    /// Check if the request never got an answer from the peer
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Timeout | Self::ConnectionError(_) | Self::HyperError(_) | Self::IoError(_)
        )
    }
}

/// Result type for SBI operations
pub type SbiResult<T> = Result<T, SbiError>;
