use super::chunk_header::{write_basic_header, ChunkHeader, ChunkHeaderFormat};
use super::{FramingError, EXTENDED_TIMESTAMP_MARKER, INITIAL_MAX_CHUNK_SIZE, MAX_CHUNK_SIZE, MAX_MESSAGE_LENGTH};
use crate::messages::{type_ids, MessagePayload, RtmpMessage};
use crate::time::RtmpTimestamp;
use byteorder::{BigEndian, LittleEndian, WriteBytesExt};
use std::collections::HashMap;

/// Outbound bytes holding every chunk of a single RTMP message.
///
/// Audio and video packets may be flagged as droppable.  The chunk after a droppable packet on
/// the same chunk stream always carries a full header, so the peer can still decode the stream
/// if the packet never gets sent.
#[derive(Debug, PartialEq)]
pub struct Packet {
    pub bytes: Vec<u8>,
    pub can_be_dropped: bool,
}

/// Splits RTMP messages into chunks, compressing headers against the previous chunk sent on
/// the same chunk stream id.  One serializer must be used for everything sent to a peer.
pub struct ChunkSerializer {
    previous_headers: HashMap<u32, ChunkHeader>,
    max_chunk_size: u32,
}

impl ChunkSerializer {
    /// Creates a serializer using the protocol's initial 128 byte chunk size
    pub fn new() -> ChunkSerializer {
        ChunkSerializer {
            previous_headers: HashMap::new(),
            max_chunk_size: INITIAL_MAX_CHUNK_SIZE,
        }
    }

    pub fn get_max_chunk_size(&self) -> u32 {
        self.max_chunk_size
    }

    /// Changes the size of outbound chunks.  The returned `SetChunkSize` packet must be sent
    /// before anything else serialized afterwards.
    pub fn set_max_chunk_size(
        &mut self,
        new_size: u32,
        time: RtmpTimestamp,
    ) -> Result<Packet, FramingError> {
        if new_size == 0 || new_size > MAX_CHUNK_SIZE {
            return Err(FramingError::InvalidMaxChunkSize {
                chunk_size: new_size,
            });
        }

        let payload = RtmpMessage::SetChunkSize { size: new_size }.into_message_payload(time, 0)?;
        let packet = self.serialize(&payload, true, false)?;

        self.max_chunk_size = new_size;
        Ok(packet)
    }

    /// Turns a message payload into chunk bytes.
    ///
    /// `force_uncompressed` makes the first chunk use a full (type 0) header, which some peers
    /// require for the first messages after the handshake.  `can_be_dropped` marks the packet
    /// as safe to discard when the connection is backed up.
    pub fn serialize(
        &mut self,
        message: &MessagePayload,
        force_uncompressed: bool,
        can_be_dropped: bool,
    ) -> Result<Packet, FramingError> {
        if message.data.len() > MAX_MESSAGE_LENGTH as usize {
            return Err(FramingError::OversizedMessage {
                size: message.data.len().min(u32::MAX as usize) as u32,
                max_size: MAX_MESSAGE_LENGTH,
            });
        }

        let csid = get_csid_for_message_type(message.type_id);
        let mut header = ChunkHeader {
            timestamp: message.timestamp,
            timestamp_delta: 0,
            extended_timestamp: None,
            message_length: message.data.len() as u32,
            message_type_id: message.type_id,
            message_stream_id: message.message_stream_id,
            can_be_dropped,
        };

        let format = if force_uncompressed {
            ChunkHeaderFormat::Full
        } else {
            match self.previous_headers.get(&csid) {
                Some(previous) => select_header_format(&mut header, previous),
                None => ChunkHeaderFormat::Full,
            }
        };

        let timestamp_value = match format {
            ChunkHeaderFormat::Full => header.timestamp.value,
            _ => header.timestamp_delta,
        };

        if timestamp_value >= EXTENDED_TIMESTAMP_MARKER {
            header.extended_timestamp = Some(timestamp_value);
        }

        let chunk_size = self.max_chunk_size as usize;
        let chunk_count = message.data.len().max(1).div_ceil(chunk_size);
        let mut bytes = Vec::with_capacity(message.data.len() + chunk_count * 16);

        for (index, slice) in message.data.chunks(chunk_size).enumerate() {
            // Continuation chunks always use type 3 headers
            let chunk_format = if index == 0 { format } else { ChunkHeaderFormat::Empty };
            write_chunk_header(&mut bytes, chunk_format, csid, &header, timestamp_value)?;
            bytes.extend_from_slice(slice);
        }

        if message.data.is_empty() {
            write_chunk_header(&mut bytes, format, csid, &header, timestamp_value)?;
        }

        self.previous_headers.insert(csid, header);
        Ok(Packet {
            bytes,
            can_be_dropped,
        })
    }
}

impl Default for ChunkSerializer {
    fn default() -> Self {
        ChunkSerializer::new()
    }
}

fn write_chunk_header(
    bytes: &mut Vec<u8>,
    format: ChunkHeaderFormat,
    csid: u32,
    header: &ChunkHeader,
    timestamp_value: u32,
) -> Result<(), FramingError> {
    write_basic_header(bytes, format, csid)?;

    if format != ChunkHeaderFormat::Empty {
        bytes.write_u24::<BigEndian>(timestamp_value.min(EXTENDED_TIMESTAMP_MARKER))?;
    }

    if format == ChunkHeaderFormat::Full || format == ChunkHeaderFormat::TimeDeltaWithoutMessageStreamId {
        bytes.write_u24::<BigEndian>(header.message_length)?;
        bytes.write_u8(header.message_type_id)?;
    }

    if format == ChunkHeaderFormat::Full {
        bytes.write_u32::<LittleEndian>(header.message_stream_id)?;
    }

    if let Some(extended) = header.extended_timestamp {
        bytes.write_u32::<BigEndian>(extended)?;
    }

    Ok(())
}

fn get_csid_for_message_type(message_type_id: u8) -> u32 {
    match message_type_id {
        type_ids::SET_CHUNK_SIZE..=type_ids::SET_PEER_BANDWIDTH => 2,
        type_ids::AMF0_COMMAND => 3,
        type_ids::AUDIO => 4,
        type_ids::AMF0_DATA => 5,
        type_ids::VIDEO => 6,
        _ => 7,
    }
}

fn select_header_format(header: &mut ChunkHeader, previous: &ChunkHeader) -> ChunkHeaderFormat {
    // The peer may never see a droppable packet, and deltas can't express going backwards
    if previous.can_be_dropped
        || header.message_stream_id != previous.message_stream_id
        || header.timestamp < previous.timestamp
    {
        return ChunkHeaderFormat::Full;
    }

    header.timestamp_delta = header.timestamp.millis_since(previous.timestamp);

    if header.message_type_id != previous.message_type_id
        || header.message_length != previous.message_length
    {
        return ChunkHeaderFormat::TimeDeltaWithoutMessageStreamId;
    }

    // A type 3 header only repeats the previous delta if no extended field is involved
    if header.timestamp_delta != previous.timestamp_delta
        || header.timestamp_delta >= EXTENDED_TIMESTAMP_MARKER
        || previous.extended_timestamp.is_some()
    {
        return ChunkHeaderFormat::TimeDeltaOnly;
    }

    ChunkHeaderFormat::Empty
}
