//! Protocol error types.

use std::fmt;
use std::io;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors raised while encoding requests or decoding responses.
///
/// None of these involve I/O; they are raised before a frame is written
/// or right after one has been received.
#[derive(Debug)]
pub enum ProtocolError {
    /// MIME type other than `application/json` requested
    UnsupportedEncoding(String),

    /// `processor == "session"` without a session id
    MissingSession,

    /// Response payload is not a valid response envelope
    MalformedResponse(String),

    /// Request could not be serialized
    Serialization(serde_json::Error),

    /// I/O error surfaced through the frame encoder
    Io(io::Error),
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::UnsupportedEncoding(mime) => {
                write!(f, "Unsupported encoding: {}", mime)
            }
            ProtocolError::MissingSession => {
                write!(f, "Session processor requires a session id")
            }
            ProtocolError::MalformedResponse(msg) => write!(f, "Malformed response: {}", msg),
            ProtocolError::Serialization(e) => write!(f, "Serialization error: {}", e),
            ProtocolError::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for ProtocolError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ProtocolError::Serialization(e) => Some(e),
            ProtocolError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for ProtocolError {
    fn from(err: serde_json::Error) -> Self {
        ProtocolError::Serialization(err)
    }
}

impl From<io::Error> for ProtocolError {
    fn from(err: io::Error) -> Self {
        ProtocolError::Io(err)
    }
}
