use crate::messages::{
    type_ids, MessageDeserializationError, MessageSerializationError, RtmpMessage,
    UserControlEvent,
};
use crate::time::RtmpTimestamp;
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use bytes::Bytes;
use std::io::Cursor;

const STREAM_BEGIN: u16 = 0;
const STREAM_EOF: u16 = 1;
const STREAM_DRY: u16 = 2;
const SET_BUFFER_LENGTH: u16 = 3;
const STREAM_IS_RECORDED: u16 = 4;
const PING_REQUEST: u16 = 6;
const PING_RESPONSE: u16 = 7;
const BUFFER_EMPTY: u16 = 31;
const BUFFER_READY: u16 = 32;

pub fn serialize(event: &UserControlEvent) -> Result<Bytes, MessageSerializationError> {
    let mut bytes = Vec::with_capacity(10);
    match *event {
        UserControlEvent::StreamBegin { stream_id } => write_u32_event(&mut bytes, STREAM_BEGIN, stream_id)?,
        UserControlEvent::StreamEof { stream_id } => write_u32_event(&mut bytes, STREAM_EOF, stream_id)?,
        UserControlEvent::StreamDry { stream_id } => write_u32_event(&mut bytes, STREAM_DRY, stream_id)?,
        UserControlEvent::StreamIsRecorded { stream_id } => {
            write_u32_event(&mut bytes, STREAM_IS_RECORDED, stream_id)?
        }

        UserControlEvent::SetBufferLength {
            stream_id,
            buffer_length,
        } => {
            write_u32_event(&mut bytes, SET_BUFFER_LENGTH, stream_id)?;
            bytes.write_u32::<BigEndian>(buffer_length)?;
        }

        UserControlEvent::PingRequest { timestamp } => {
            write_u32_event(&mut bytes, PING_REQUEST, timestamp.value)?
        }

        UserControlEvent::PingResponse { timestamp } => {
            write_u32_event(&mut bytes, PING_RESPONSE, timestamp.value)?
        }

        UserControlEvent::BufferEmpty { stream_id } => write_u32_event(&mut bytes, BUFFER_EMPTY, stream_id)?,
        UserControlEvent::BufferReady { stream_id } => write_u32_event(&mut bytes, BUFFER_READY, stream_id)?,
    }

    Ok(Bytes::from(bytes))
}

pub fn deserialize(data: Bytes) -> Result<RtmpMessage, MessageDeserializationError> {
    let invalid = || MessageDeserializationError::InvalidMessageFormat {
        type_id: type_ids::USER_CONTROL,
    };

    let mut cursor = Cursor::new(data);
    let event_type = cursor.read_u16::<BigEndian>().map_err(|_| invalid())?;
    let value = cursor.read_u32::<BigEndian>().map_err(|_| invalid())?;

    let event = match event_type {
        STREAM_BEGIN => UserControlEvent::StreamBegin { stream_id: value },
        STREAM_EOF => UserControlEvent::StreamEof { stream_id: value },
        STREAM_DRY => UserControlEvent::StreamDry { stream_id: value },
        STREAM_IS_RECORDED => UserControlEvent::StreamIsRecorded { stream_id: value },
        SET_BUFFER_LENGTH => UserControlEvent::SetBufferLength {
            stream_id: value,
            buffer_length: cursor.read_u32::<BigEndian>().map_err(|_| invalid())?,
        },

        PING_REQUEST => UserControlEvent::PingRequest {
            timestamp: RtmpTimestamp::new(value),
        },

        PING_RESPONSE => UserControlEvent::PingResponse {
            timestamp: RtmpTimestamp::new(value),
        },

        BUFFER_EMPTY => UserControlEvent::BufferEmpty { stream_id: value },
        BUFFER_READY => UserControlEvent::BufferReady { stream_id: value },
        _ => return Err(invalid()),
    };

    Ok(RtmpMessage::UserControl(event))
}

fn write_u32_event(bytes: &mut Vec<u8>, event_type: u16, value: u32) -> Result<(), MessageSerializationError> {
    bytes.write_u16::<BigEndian>(event_type)?;
    bytes.write_u32::<BigEndian>(value)?;
    Ok(())
}
