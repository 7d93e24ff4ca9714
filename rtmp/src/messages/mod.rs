/*!
Typed RTMP messages and their conversion to and from raw `MessagePayload`s.

A `MessagePayload` is what the chunk layer moves around: a type id, timestamp, message stream id
and opaque bytes.  `RtmpMessage` is the decoded form the session and multiplexer work with.
*/

mod errors;
mod message_payload;
mod types;

pub use self::errors::{MessageDeserializationError, MessageSerializationError};
pub use self::message_payload::MessagePayload;

use crate::time::RtmpTimestamp;
use bytes::Bytes;
use rtmp_stream_amf0::Amf0Value;

/// Message type ids as they appear in chunk headers
pub mod type_ids {
    pub const SET_CHUNK_SIZE: u8 = 1;
    pub const ABORT: u8 = 2;
    pub const ACKNOWLEDGEMENT: u8 = 3;
    pub const USER_CONTROL: u8 = 4;
    pub const WINDOW_ACKNOWLEDGEMENT_SIZE: u8 = 5;
    pub const SET_PEER_BANDWIDTH: u8 = 6;
    pub const AUDIO: u8 = 8;
    pub const VIDEO: u8 = 9;
    pub const AMF0_DATA: u8 = 18;
    pub const AMF0_COMMAND: u8 = 20;
}

/// The type of bandwidth limiting that is being requested
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum PeerBandwidthLimitType {
    /// Peer should limit its output bandwidth to the indicated window size
    Hard,

    /// Limit to the indicated window or the limit already in effect, whichever is smaller
    Soft,

    /// Treat as hard if the previous limit was hard, otherwise ignore
    Dynamic,
}

/// Stream and connection events carried by user control messages
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum UserControlEvent {
    StreamBegin { stream_id: u32 },
    StreamEof { stream_id: u32 },
    StreamDry { stream_id: u32 },

    /// Client tells the server how many milliseconds of media it buffers
    SetBufferLength { stream_id: u32, buffer_length: u32 },
    StreamIsRecorded { stream_id: u32 },
    PingRequest { timestamp: RtmpTimestamp },
    PingResponse { timestamp: RtmpTimestamp },

    /// Unofficial: the server has sent a complete buffer and will pause before the next one
    BufferEmpty { stream_id: u32 },

    /// Unofficial: the server starts sending the next buffer
    BufferReady { stream_id: u32 },
}

/// Every kind of RTMP message this crate understands
#[derive(PartialEq, Debug, Clone)]
pub enum RtmpMessage {
    /// A message with a type id we do not handle
    Unknown { type_id: u8, data: Bytes },

    /// Discard any partially received message on the chunk stream
    Abort { stream_id: u32 },

    /// Total number of bytes received so far (wrapping)
    Acknowledgement { sequence_number: u32 },

    Amf0Command {
        command_name: String,
        transaction_id: f64,
        command_object: Amf0Value,
        additional_arguments: Vec<Amf0Value>,
    },

    Amf0Data { values: Vec<Amf0Value> },
    AudioData { data: Bytes },

    /// The sender's chunks will be at most `size` bytes from now on
    SetChunkSize { size: u32 },

    SetPeerBandwidth {
        size: u32,
        limit_type: PeerBandwidthLimitType,
    },

    UserControl(UserControlEvent),
    VideoData { data: Bytes },

    /// How many bytes the peer may receive before it must send an `Acknowledgement`
    WindowAcknowledgement { size: u32 },
}

impl RtmpMessage {
    pub fn into_message_payload(
        self,
        timestamp: RtmpTimestamp,
        message_stream_id: u32,
    ) -> Result<MessagePayload, MessageSerializationError> {
        MessagePayload::from_rtmp_message(self, timestamp, message_stream_id)
    }

    pub fn get_message_type_id(&self) -> u8 {
        match self {
            RtmpMessage::Unknown { type_id, .. } => *type_id,
            RtmpMessage::Abort { .. } => type_ids::ABORT,
            RtmpMessage::Acknowledgement { .. } => type_ids::ACKNOWLEDGEMENT,
            RtmpMessage::Amf0Command { .. } => type_ids::AMF0_COMMAND,
            RtmpMessage::Amf0Data { .. } => type_ids::AMF0_DATA,
            RtmpMessage::AudioData { .. } => type_ids::AUDIO,
            RtmpMessage::SetChunkSize { .. } => type_ids::SET_CHUNK_SIZE,
            RtmpMessage::SetPeerBandwidth { .. } => type_ids::SET_PEER_BANDWIDTH,
            RtmpMessage::UserControl(_) => type_ids::USER_CONTROL,
            RtmpMessage::VideoData { .. } => type_ids::VIDEO,
            RtmpMessage::WindowAcknowledgement { .. } => type_ids::WINDOW_ACKNOWLEDGEMENT_SIZE,
        }
    }
}
