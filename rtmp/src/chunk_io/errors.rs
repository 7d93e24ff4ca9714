use crate::messages::MessageSerializationError;
use std::io;
use thiserror::Error;

/// Errors raised while turning messages into chunks or chunks back into messages.  Any of these
/// on an established connection means the chunk stream can no longer be trusted.
#[derive(Debug, Error)]
pub enum FramingError {
    #[error("Malformed chunk header: {reason}")]
    MalformedHeader { reason: String },

    #[error("Message of {size} bytes exceeds the limit of {max_size} bytes")]
    OversizedMessage { size: u32, max_size: u32 },

    /// A compressed header referenced a chunk stream we have never seen a full header for
    #[error("Received a compressed chunk header on csid {csid} before any full header")]
    UnknownChunkStream { csid: u32 },

    #[error("Requested an invalid max chunk size of {chunk_size}, it must be between 1 and 2147483647")]
    InvalidMaxChunkSize { chunk_size: u32 },

    #[error("Failed to build control message: {0}")]
    ControlMessage(#[from] MessageSerializationError),

    #[error("{0}")]
    Io(#[from] io::Error),
}

impl FramingError {
    pub(crate) fn malformed(reason: impl Into<String>) -> FramingError {
        FramingError::MalformedHeader {
            reason: reason.into(),
        }
    }
}
