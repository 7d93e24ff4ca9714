use rtmp_stream_amf0::{Amf0DeserializationError, Amf0SerializationError};
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MessageSerializationError {
    #[error("Failed to encode AMF0 values: {0}")]
    Amf0(#[from] Amf0SerializationError),

    #[error("{0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Error)]
pub enum MessageDeserializationError {
    /// The payload's bytes do not form a valid message of its declared type
    #[error("Payload was not a valid message of type {type_id}")]
    InvalidMessageFormat { type_id: u8 },

    #[error("Failed to decode AMF0 values: {0}")]
    Amf0(#[from] Amf0DeserializationError),

    #[error("{0}")]
    Io(#[from] io::Error),
}
