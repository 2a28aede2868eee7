//! Error types for terminal sessions.

use thiserror::Error;

/// Errors that can occur while driving a terminal session.
#[derive(Error, Debug)]
pub enum ShellError {
    /// A WebSocket transport error.
    #[error("WebSocket error: {0}")]
    WebSocket(Box<tokio_tungstenite::tungstenite::Error>),

    /// A JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A URL parsing error.
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// A filesystem error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No bearer credential was available at connect time.
    #[error("Authentication token not found; log in again")]
    MissingCredential,

    /// `connect` was called on a session that is not disconnected.
    #[error("Session is already connecting or connected")]
    AlreadyConnecting,

    /// The channel is not open.
    #[error("Terminal channel not connected")]
    NotConnected,

    /// A target descriptor could not be parsed.
    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    /// Configuration input (catalog, credential file, URL) was malformed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ShellError {
    /// Check if this error came from the transport and may clear up on reconnect.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::WebSocket(_) | Self::NotConnected)
    }

    /// Check if this is a local precondition failure that never reached the backend.
    pub fn is_precondition(&self) -> bool {
        matches!(self, Self::MissingCredential | Self::AlreadyConnecting)
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for ShellError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::WebSocket(Box::new(err))
    }
}

/// Result type alias for terminal session operations.
pub type Result<T> = std::result::Result<T, ShellError>;
