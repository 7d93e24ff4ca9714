use crate::messages::{MessageDeserializationError, MessageSerializationError, RtmpMessage};
use bytes::Bytes;
use rtmp_stream_amf0::{self as amf0, Amf0Value};

pub fn serialize(values: &[Amf0Value]) -> Result<Bytes, MessageSerializationError> {
    Ok(Bytes::from(amf0::serialize(values)?))
}

pub fn deserialize(data: Bytes) -> Result<RtmpMessage, MessageDeserializationError> {
    let values = amf0::deserialize(&mut &data[..])?;
    Ok(RtmpMessage::Amf0Data { values })
}
