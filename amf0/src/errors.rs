use std::{io, string};
use thiserror::Error;

/// Errors raised while decoding AMF0 bytes into values
#[derive(Debug, Error)]
pub enum Amf0DeserializationError {
    #[error("Encountered unknown AMF0 marker {marker}")]
    UnknownMarker { marker: u8 },

    #[error("Object property had an empty name but was not followed by an object end marker")]
    UnexpectedEmptyObjectPropertyName,

    #[error("Hit the end of the input while a value was still expected")]
    UnexpectedEof,

    #[error("Values were nested deeper than {max_depth} levels")]
    NestingTooDeep { max_depth: usize },

    #[error("Declared length of {length} exceeds the remaining input")]
    LengthOutOfBounds { length: u64 },

    #[error("{0}")]
    Io(#[from] io::Error),

    #[error("String value was not valid UTF-8: {0}")]
    FromUtf8Error(#[from] string::FromUtf8Error),
}

/// Errors raised while encoding AMF0 values into bytes
#[derive(Debug, Error)]
pub enum Amf0SerializationError {
    #[error("Object property names cannot be longer than 65,535 bytes")]
    PropertyNameTooLong,

    #[error("String values cannot be longer than 4,294,967,295 bytes")]
    StringTooLong,

    #[error("{0}")]
    Io(#[from] io::Error),
}
