use super::chunk_header::{read_basic_header, ChunkHeader, ChunkHeaderFormat};
use super::{FramingError, EXTENDED_TIMESTAMP_MARKER, INITIAL_MAX_CHUNK_SIZE, MAX_CHUNK_SIZE, MAX_MESSAGE_LENGTH};
use crate::messages::{type_ids, MessagePayload};
use crate::time::RtmpTimestamp;
use byteorder::{BigEndian, ByteOrder, LittleEndian};
use bytes::{Buf, BytesMut};
use std::collections::HashMap;
use tracing::{debug, trace};

/// Reassembly state for one chunk stream id
#[derive(Default)]
struct ChunkStream {
    header: ChunkHeader,
    partial: BytesMut,
}

/// A fully parsed chunk header, before it is applied to its chunk stream
struct ParsedChunkHeader {
    format: ChunkHeaderFormat,
    csid: u32,
    timestamp_field: u32,
    extended_timestamp: Option<u32>,
    message_length: u32,
    message_type_id: u8,
    message_stream_id: u32,
    header_length: usize,
}

/// Turns the bytes coming off the wire back into RTMP message payloads.
///
/// Every byte received after the handshake must pass through the same deserializer, since
/// compressed chunk headers rely on the state left by earlier chunks.  Chunks for different
/// chunk stream ids may be interleaved; each stream is reassembled independently.
///
/// `SetChunkSize` and `Abort` messages are applied as soon as they are read, so the chunks that
/// follow them in the same read are split correctly.  They are still returned to the caller.
///
/// ```
/// use bytes::Bytes;
/// use rtmp_stream::chunk_io::{ChunkDeserializer, ChunkSerializer};
/// use rtmp_stream::messages::MessagePayload;
/// use rtmp_stream::time::RtmpTimestamp;
///
/// let input = MessagePayload {
///     timestamp: RtmpTimestamp::new(55),
///     type_id: 9,
///     message_stream_id: 1,
///     data: Bytes::from(vec![0x17; 300]),
/// };
///
/// let mut serializer = ChunkSerializer::new();
/// let packet = serializer.serialize(&input, false, false).unwrap();
///
/// let mut deserializer = ChunkDeserializer::new();
/// let first_half = deserializer.deframe(&packet.bytes[..100]).unwrap();
/// let second_half = deserializer.deframe(&packet.bytes[100..]).unwrap();
///
/// assert!(first_half.is_empty());
/// assert_eq!(second_half, vec![input]);
/// ```
pub struct ChunkDeserializer {
    max_chunk_size: u32,
    max_message_size: u32,
    buffer: BytesMut,
    streams: HashMap<u32, ChunkStream>,
}

impl ChunkDeserializer {
    pub fn new() -> ChunkDeserializer {
        ChunkDeserializer::with_max_message_size(MAX_MESSAGE_LENGTH)
    }

    /// Creates a deserializer that rejects any message longer than `max_message_size` bytes
    /// instead of buffering it.
    pub fn with_max_message_size(max_message_size: u32) -> ChunkDeserializer {
        ChunkDeserializer {
            max_chunk_size: INITIAL_MAX_CHUNK_SIZE,
            max_message_size,
            buffer: BytesMut::with_capacity(4096),
            streams: HashMap::new(),
        }
    }

    /// Tells the deserializer the peer will send chunks of up to `new_size` bytes from now on.
    /// Normally this happens automatically when a `SetChunkSize` message is read.
    pub fn set_max_chunk_size(&mut self, new_size: u32) -> Result<(), FramingError> {
        if new_size == 0 || new_size > MAX_CHUNK_SIZE {
            return Err(FramingError::InvalidMaxChunkSize {
                chunk_size: new_size,
            });
        }

        self.max_chunk_size = new_size;
        Ok(())
    }

    pub fn get_max_chunk_size(&self) -> u32 {
        self.max_chunk_size
    }

    /// Feeds bytes received from the peer and returns every message they completed, in the
    /// order their final chunks arrived.  Partial chunks are kept until more bytes arrive.
    pub fn deframe(&mut self, bytes: &[u8]) -> Result<Vec<MessagePayload>, FramingError> {
        self.buffer.extend_from_slice(bytes);

        let mut messages = Vec::new();
        while let Some(message) = self.read_chunk()? {
            if let Some(message) = message {
                self.apply_protocol_control(&message)?;
                messages.push(message);
            }
        }

        Ok(messages)
    }

    /// Reads a single chunk.  Returns `None` when the buffer does not hold a complete chunk,
    /// and `Some(None)` when a chunk was consumed without completing a message.
    fn read_chunk(&mut self) -> Result<Option<Option<MessagePayload>>, FramingError> {
        let parsed = match self.parse_header()? {
            Some(parsed) => parsed,
            None => return Ok(None),
        };

        let stream = self.streams.get(&parsed.csid);
        let in_progress = stream.map(|x| x.partial.len()).unwrap_or(0);
        let message_length = match (parsed.format, stream) {
            (ChunkHeaderFormat::Full, _) | (ChunkHeaderFormat::TimeDeltaWithoutMessageStreamId, _) => {
                parsed.message_length
            }

            (_, Some(stream)) => stream.header.message_length,
            (_, None) => return Err(FramingError::UnknownChunkStream { csid: parsed.csid }),
        };

        if parsed.format != ChunkHeaderFormat::Empty && in_progress > 0 {
            return Err(FramingError::malformed(format!(
                "type {:?} header on csid {} while a message was still being assembled",
                parsed.format, parsed.csid
            )));
        }

        if message_length > self.max_message_size {
            return Err(FramingError::OversizedMessage {
                size: message_length,
                max_size: self.max_message_size,
            });
        }

        let remaining = message_length as usize - in_progress;
        let chunk_data_length = remaining.min(self.max_chunk_size as usize);
        if self.buffer.len() < parsed.header_length + chunk_data_length {
            return Ok(None);
        }

        self.buffer.advance(parsed.header_length);
        let data = self.buffer.split_to(chunk_data_length);

        let stream = self.streams.entry(parsed.csid).or_default();
        if in_progress == 0 {
            apply_header(&mut stream.header, &parsed);
            stream.partial.reserve(message_length as usize);
        }

        stream.partial.extend_from_slice(&data);
        trace!(
            csid = parsed.csid,
            received = stream.partial.len(),
            length = message_length,
            "Read chunk"
        );

        if stream.partial.len() < message_length as usize {
            return Ok(Some(None));
        }

        let payload = MessagePayload {
            timestamp: stream.header.timestamp,
            type_id: stream.header.message_type_id,
            message_stream_id: stream.header.message_stream_id,
            data: stream.partial.split().freeze(),
        };

        Ok(Some(Some(payload)))
    }

    fn parse_header(&self) -> Result<Option<ParsedChunkHeader>, FramingError> {
        let buffer = &self.buffer[..];
        let (format, csid, basic_length) = match read_basic_header(buffer) {
            Some(x) => x,
            None => return Ok(None),
        };

        let mut index = basic_length;
        let message_header_length = format.message_header_length();
        if buffer.len() < index + message_header_length {
            return Ok(None);
        }

        let fields = &buffer[index..index + message_header_length];
        let mut parsed = ParsedChunkHeader {
            format,
            csid,
            timestamp_field: 0,
            extended_timestamp: None,
            message_length: 0,
            message_type_id: 0,
            message_stream_id: 0,
            header_length: 0,
        };

        if format != ChunkHeaderFormat::Empty {
            parsed.timestamp_field = BigEndian::read_u24(&fields[0..3]);
        }

        if message_header_length >= 7 {
            parsed.message_length = BigEndian::read_u24(&fields[3..6]);
            parsed.message_type_id = fields[6];
        }

        if format == ChunkHeaderFormat::Full {
            parsed.message_stream_id = LittleEndian::read_u32(&fields[7..11]);
        }

        index += message_header_length;

        let has_extended_timestamp = match format {
            ChunkHeaderFormat::Empty => self
                .streams
                .get(&csid)
                .map(|x| x.header.extended_timestamp.is_some())
                .unwrap_or(false),
            _ => parsed.timestamp_field == EXTENDED_TIMESTAMP_MARKER,
        };

        if has_extended_timestamp {
            if buffer.len() < index + 4 {
                return Ok(None);
            }

            parsed.extended_timestamp = Some(BigEndian::read_u32(&buffer[index..index + 4]));
            index += 4;
        }

        parsed.header_length = index;
        Ok(Some(parsed))
    }

    fn apply_protocol_control(&mut self, message: &MessagePayload) -> Result<(), FramingError> {
        if message.message_stream_id != 0 || message.data.len() < 4 {
            return Ok(());
        }

        let value = BigEndian::read_u32(&message.data[..4]);
        match message.type_id {
            type_ids::SET_CHUNK_SIZE => {
                let size = value & MAX_CHUNK_SIZE;
                debug!(size, "Peer changed its chunk size");
                self.set_max_chunk_size(size)?;
            }

            type_ids::ABORT => {
                if let Some(stream) = self.streams.get_mut(&value) {
                    debug!(csid = value, dropped = stream.partial.len(), "Peer aborted message");
                    stream.partial.clear();
                }
            }

            _ => (),
        }

        Ok(())
    }
}

impl Default for ChunkDeserializer {
    fn default() -> Self {
        ChunkDeserializer::new()
    }
}

/// Applies the header of a chunk that starts a new message to the stream's cached header
fn apply_header(header: &mut ChunkHeader, parsed: &ParsedChunkHeader) {
    let field = parsed.extended_timestamp.unwrap_or(parsed.timestamp_field);
    match parsed.format {
        ChunkHeaderFormat::Full => {
            header.timestamp = RtmpTimestamp::new(field);
            header.timestamp_delta = 0;
            header.message_length = parsed.message_length;
            header.message_type_id = parsed.message_type_id;
            header.message_stream_id = parsed.message_stream_id;
        }

        ChunkHeaderFormat::TimeDeltaWithoutMessageStreamId => {
            header.timestamp = header.timestamp + field;
            header.timestamp_delta = field;
            header.message_length = parsed.message_length;
            header.message_type_id = parsed.message_type_id;
        }

        ChunkHeaderFormat::TimeDeltaOnly => {
            header.timestamp = header.timestamp + field;
            header.timestamp_delta = field;
        }

        // A type 3 chunk starting a new message repeats the previous delta
        ChunkHeaderFormat::Empty => {
            header.timestamp = header.timestamp + header.timestamp_delta;
        }
    }

    if parsed.format != ChunkHeaderFormat::Empty {
        header.extended_timestamp = parsed.extended_timestamp;
    }
}
