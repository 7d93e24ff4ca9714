use super::types;
use super::{type_ids, MessageDeserializationError, MessageSerializationError, RtmpMessage};
use crate::time::RtmpTimestamp;
use bytes::Bytes;

/// A raw RTMP message as carried by the chunk stream
#[derive(PartialEq, Debug, Clone, Default)]
pub struct MessagePayload {
    pub timestamp: RtmpTimestamp,
    pub type_id: u8,
    pub message_stream_id: u32,
    pub data: Bytes,
}

impl MessagePayload {
    pub fn new() -> MessagePayload {
        MessagePayload::default()
    }

    pub fn to_rtmp_message(&self) -> Result<RtmpMessage, MessageDeserializationError> {
        let data = self.data.clone();
        match self.type_id {
            type_ids::SET_CHUNK_SIZE
            | type_ids::ABORT
            | type_ids::ACKNOWLEDGEMENT
            | type_ids::WINDOW_ACKNOWLEDGEMENT_SIZE
            | type_ids::SET_PEER_BANDWIDTH => types::protocol_control::deserialize(self.type_id, data),
            type_ids::USER_CONTROL => types::user_control::deserialize(data),
            type_ids::AUDIO => Ok(RtmpMessage::AudioData { data }),
            type_ids::VIDEO => Ok(RtmpMessage::VideoData { data }),
            type_ids::AMF0_DATA => types::amf0_data::deserialize(data),
            type_ids::AMF0_COMMAND => types::amf0_command::deserialize(data),
            type_id => Ok(RtmpMessage::Unknown { type_id, data }),
        }
    }

    pub fn from_rtmp_message(
        message: RtmpMessage,
        timestamp: RtmpTimestamp,
        message_stream_id: u32,
    ) -> Result<MessagePayload, MessageSerializationError> {
        let type_id = message.get_message_type_id();
        let data = match message {
            RtmpMessage::Unknown { data, .. } => data,
            RtmpMessage::AudioData { data } => data,
            RtmpMessage::VideoData { data } => data,
            RtmpMessage::UserControl(event) => types::user_control::serialize(&event)?,
            RtmpMessage::Amf0Data { values } => types::amf0_data::serialize(&values)?,
            RtmpMessage::Amf0Command {
                command_name,
                transaction_id,
                command_object,
                additional_arguments,
            } => types::amf0_command::serialize(
                command_name,
                transaction_id,
                command_object,
                additional_arguments,
            )?,

            RtmpMessage::SetChunkSize { size } => types::protocol_control::serialize_u32(size & 0x7fff_ffff)?,
            RtmpMessage::Abort { stream_id } => types::protocol_control::serialize_u32(stream_id)?,
            RtmpMessage::Acknowledgement { sequence_number } => {
                types::protocol_control::serialize_u32(sequence_number)?
            }

            RtmpMessage::WindowAcknowledgement { size } => types::protocol_control::serialize_u32(size)?,
            RtmpMessage::SetPeerBandwidth { size, limit_type } => {
                types::protocol_control::serialize_peer_bandwidth(size, limit_type)?
            }
        };

        Ok(MessagePayload {
            timestamp,
            type_id,
            message_stream_id,
            data,
        })
    }
}
