use crate::config::ConfigError;
use crate::handshake::HandshakeError;
use crate::media::{DecodeError, EncodeError};
use crate::sessions::ClientSessionError;
use crate::transport::TransportError;
use thiserror::Error;

/// Status returned by the view operations on success
pub const STATUS_OK: i32 = 0;

/// Anything that can stop a player or publisher from starting or keep it from running
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("A session is already active")]
    AlreadyActive,

    #[error("No session is active")]
    NotActive,

    #[error("Handshake failed: {0}")]
    Handshake(#[from] HandshakeError),

    #[error("Transport failed: {0}")]
    Transport(#[from] TransportError),

    #[error("Session failed: {0}")]
    Session(#[from] ClientSessionError),

    #[error("The server rejected the request: {description}")]
    Rejected { description: String },

    #[error("Encoding failed: {0}")]
    Encode(#[from] EncodeError),

    #[error("Decoding failed: {0}")]
    Decode(#[from] DecodeError),

    #[error("Runtime failure: {reason}")]
    Runtime { reason: String },
}

impl StreamError {
    /// Stable non-zero code handed back from `start()` and friends
    pub fn status_code(&self) -> i32 {
        match self {
            StreamError::Config(_) => -1,
            StreamError::AlreadyActive => -2,
            StreamError::NotActive => -3,
            StreamError::Handshake(_) => -4,
            StreamError::Transport(_) => -5,
            StreamError::Session(_) => -6,
            StreamError::Rejected { .. } => -7,
            StreamError::Encode(_) => -8,
            StreamError::Decode(_) => -9,
            StreamError::Runtime { .. } => -10,
        }
    }

    /// Whether reconnecting could get past this error
    pub fn is_retryable(&self) -> bool {
        match self {
            StreamError::Transport(error) => error.is_retryable(),
            StreamError::Handshake(HandshakeError::Timeout { .. })
            | StreamError::Handshake(HandshakeError::TransportClosed)
            | StreamError::Handshake(HandshakeError::Io(_)) => true,
            _ => false,
        }
    }

    /// Whether this is a read or write timeout rather than a hard failure
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            StreamError::Transport(TransportError::Timeout { .. })
                | StreamError::Handshake(HandshakeError::Timeout { .. })
        )
    }
}
