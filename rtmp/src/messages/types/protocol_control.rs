//! Protocol control messages (type ids 1, 2, 3, 5 and 6).  All of them are one big endian u32,
//! with set peer bandwidth adding a limit type byte.

use crate::messages::{
    type_ids, MessageDeserializationError, MessageSerializationError, PeerBandwidthLimitType,
    RtmpMessage,
};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use bytes::Bytes;
use std::io::Cursor;

pub fn serialize_u32(value: u32) -> Result<Bytes, MessageSerializationError> {
    let mut bytes = Vec::with_capacity(4);
    bytes.write_u32::<BigEndian>(value)?;
    Ok(Bytes::from(bytes))
}

pub fn serialize_peer_bandwidth(
    size: u32,
    limit_type: PeerBandwidthLimitType,
) -> Result<Bytes, MessageSerializationError> {
    let limit_byte = match limit_type {
        PeerBandwidthLimitType::Hard => 0,
        PeerBandwidthLimitType::Soft => 1,
        PeerBandwidthLimitType::Dynamic => 2,
    };

    let mut bytes = Vec::with_capacity(5);
    bytes.write_u32::<BigEndian>(size)?;
    bytes.write_u8(limit_byte)?;
    Ok(Bytes::from(bytes))
}

pub fn deserialize(type_id: u8, data: Bytes) -> Result<RtmpMessage, MessageDeserializationError> {
    let invalid = || MessageDeserializationError::InvalidMessageFormat { type_id };
    let mut cursor = Cursor::new(data);
    let value = cursor.read_u32::<BigEndian>().map_err(|_| invalid())?;

    let message = match type_id {
        // The high bit of a chunk size must be zero
        type_ids::SET_CHUNK_SIZE => RtmpMessage::SetChunkSize {
            size: value & 0x7fff_ffff,
        },

        type_ids::ABORT => RtmpMessage::Abort { stream_id: value },
        type_ids::ACKNOWLEDGEMENT => RtmpMessage::Acknowledgement {
            sequence_number: value,
        },

        type_ids::WINDOW_ACKNOWLEDGEMENT_SIZE => RtmpMessage::WindowAcknowledgement { size: value },
        type_ids::SET_PEER_BANDWIDTH => {
            let limit_type = match cursor.read_u8().map_err(|_| invalid())? {
                0 => PeerBandwidthLimitType::Hard,
                1 => PeerBandwidthLimitType::Soft,
                2 => PeerBandwidthLimitType::Dynamic,
                _ => return Err(invalid()),
            };

            RtmpMessage::SetPeerBandwidth {
                size: value,
                limit_type,
            }
        }

        _ => return Err(invalid()),
    };

    Ok(message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_chunk_size_ignores_high_bit() {
        let data = Bytes::from_static(&[0x80, 0x00, 0x10, 0x00]);
        let message = deserialize(type_ids::SET_CHUNK_SIZE, data).unwrap();

        assert_eq!(message, RtmpMessage::SetChunkSize { size: 4096 });
    }

    #[test]
    fn peer_bandwidth_serializes_limit_type_after_size() {
        let bytes = serialize_peer_bandwidth(2_500_000, PeerBandwidthLimitType::Soft).unwrap();
        assert_eq!(&bytes[..], &[0x00, 0x26, 0x25, 0xa0, 1]);
    }

    #[test]
    fn invalid_limit_type_is_rejected() {
        let data = Bytes::from_static(&[0, 0, 0, 1, 7]);
        match deserialize(type_ids::SET_PEER_BANDWIDTH, data) {
            Err(MessageDeserializationError::InvalidMessageFormat { type_id: 6 }) => (),
            x => panic!("Expected InvalidMessageFormat, instead received {:?}", x),
        }
    }

    #[test]
    fn truncated_payload_is_rejected() {
        let data = Bytes::from_static(&[0, 1]);
        assert!(deserialize(type_ids::ACKNOWLEDGEMENT, data).is_err());
    }
}
