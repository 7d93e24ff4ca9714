use super::FramingError;
use crate::time::RtmpTimestamp;
use byteorder::WriteBytesExt;

pub const MIN_CHUNK_STREAM_ID: u32 = 2;
pub const MAX_CHUNK_STREAM_ID: u32 = 65599;

#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum ChunkHeaderFormat {
    /// Type 0: absolute timestamp, length, type id and message stream id
    Full,
    /// Type 1: timestamp delta, length and type id
    TimeDeltaWithoutMessageStreamId,
    /// Type 2: timestamp delta only
    TimeDeltaOnly,
    /// Type 3: everything repeated from the previous chunk
    Empty,
}

impl ChunkHeaderFormat {
    pub fn from_basic_header_byte(byte: u8) -> ChunkHeaderFormat {
        match byte >> 6 {
            0 => ChunkHeaderFormat::Full,
            1 => ChunkHeaderFormat::TimeDeltaWithoutMessageStreamId,
            2 => ChunkHeaderFormat::TimeDeltaOnly,
            _ => ChunkHeaderFormat::Empty,
        }
    }

    fn mask(self) -> u8 {
        match self {
            ChunkHeaderFormat::Full => 0b0000_0000,
            ChunkHeaderFormat::TimeDeltaWithoutMessageStreamId => 0b0100_0000,
            ChunkHeaderFormat::TimeDeltaOnly => 0b1000_0000,
            ChunkHeaderFormat::Empty => 0b1100_0000,
        }
    }

    /// Bytes in the message header that follows the basic header, excluding any extended timestamp
    pub fn message_header_length(self) -> usize {
        match self {
            ChunkHeaderFormat::Full => 11,
            ChunkHeaderFormat::TimeDeltaWithoutMessageStreamId => 7,
            ChunkHeaderFormat::TimeDeltaOnly => 3,
            ChunkHeaderFormat::Empty => 0,
        }
    }
}

/// The last header seen (or sent) on a chunk stream
#[derive(Debug, Clone, Default)]
pub struct ChunkHeader {
    pub timestamp: RtmpTimestamp,

    /// Delta applied by the last type 1 or 2 header, reused by type 3 headers that start a new
    /// message.  Zero after a type 0 header.
    pub timestamp_delta: u32,

    /// Value of the extended timestamp field, if the last type 0-2 header needed one.
    /// Type 3 chunks on the stream repeat it.
    pub extended_timestamp: Option<u32>,
    pub message_length: u32,
    pub message_type_id: u8,
    pub message_stream_id: u32,
    pub can_be_dropped: bool,
}

/// Reads the chunk stream id from the start of `buffer`, returning it along with the size of
/// the basic header.  `None` means more bytes are needed.
pub fn read_basic_header(buffer: &[u8]) -> Option<(ChunkHeaderFormat, u32, usize)> {
    let first = *buffer.first()?;
    let format = ChunkHeaderFormat::from_basic_header_byte(first);

    match first & 0b0011_1111 {
        0 => {
            let second = *buffer.get(1)?;
            Some((format, second as u32 + 64, 2))
        }

        1 => {
            let second = *buffer.get(1)? as u32;
            let third = *buffer.get(2)? as u32;
            Some((format, third * 256 + second + 64, 3))
        }

        csid => Some((format, csid as u32, 1)),
    }
}

pub fn write_basic_header(
    bytes: &mut Vec<u8>,
    format: ChunkHeaderFormat,
    csid: u32,
) -> Result<(), FramingError> {
    if !(MIN_CHUNK_STREAM_ID..=MAX_CHUNK_STREAM_ID).contains(&csid) {
        return Err(FramingError::malformed(format!(
            "chunk stream id {} is outside of {}-{}",
            csid, MIN_CHUNK_STREAM_ID, MAX_CHUNK_STREAM_ID
        )));
    }

    match csid {
        2..=63 => bytes.write_u8(format.mask() | csid as u8)?,
        64..=319 => {
            bytes.write_u8(format.mask())?;
            bytes.write_u8((csid - 64) as u8)?;
        }

        _ => {
            let value = csid - 64;
            bytes.write_u8(format.mask() | 1)?;
            bytes.write_u8((value & 0xff) as u8)?;
            bytes.write_u8((value >> 8) as u8)?;
        }
    }

    Ok(())
}
