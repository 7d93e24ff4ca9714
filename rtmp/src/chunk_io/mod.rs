//! RTMP chunk stream framing.
//!
//! Messages are split into chunks no larger than the negotiated max chunk size, each with a
//! header that may be compressed against the previous header on the same chunk stream id.
//! `ChunkSerializer` produces those chunks and `ChunkDeserializer` reassembles them, including
//! chunks from different chunk streams interleaved with each other.

mod chunk_header;
mod deserializer;
mod errors;
mod serializer;

pub use self::deserializer::ChunkDeserializer;
pub use self::errors::FramingError;
pub use self::serializer::{ChunkSerializer, Packet};

/// Chunk size every connection starts with
pub const INITIAL_MAX_CHUNK_SIZE: u32 = 128;

/// Largest chunk size a `SetChunkSize` message can carry
pub const MAX_CHUNK_SIZE: u32 = 0x7fff_ffff;

/// Largest message length a chunk header can carry
pub const MAX_MESSAGE_LENGTH: u32 = 0x00ff_ffff;

pub(crate) const EXTENDED_TIMESTAMP_MARKER: u32 = 0x00ff_ffff;
