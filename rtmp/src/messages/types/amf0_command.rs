use crate::messages::{
    type_ids, MessageDeserializationError, MessageSerializationError, RtmpMessage,
};
use bytes::Bytes;
use rtmp_stream_amf0::{self as amf0, Amf0Value};

pub fn serialize(
    command_name: String,
    transaction_id: f64,
    command_object: Amf0Value,
    additional_arguments: Vec<Amf0Value>,
) -> Result<Bytes, MessageSerializationError> {
    let mut values = Vec::with_capacity(additional_arguments.len() + 3);
    values.push(Amf0Value::Utf8String(command_name));
    values.push(Amf0Value::Number(transaction_id));
    values.push(command_object);
    values.extend(additional_arguments);

    Ok(Bytes::from(amf0::serialize(&values)?))
}

pub fn deserialize(data: Bytes) -> Result<RtmpMessage, MessageDeserializationError> {
    let invalid = || MessageDeserializationError::InvalidMessageFormat {
        type_id: type_ids::AMF0_COMMAND,
    };

    let mut values = amf0::deserialize(&mut &data[..])?.into_iter();
    let command_name = values.next().and_then(|x| x.get_string()).ok_or_else(invalid)?;
    let transaction_id = values.next().and_then(|x| x.get_number()).ok_or_else(invalid)?;

    // Some servers omit the command object on `onStatus` and friends
    let command_object = values.next().unwrap_or(Amf0Value::Null);

    Ok(RtmpMessage::Amf0Command {
        command_name,
        transaction_id,
        command_object,
        additional_arguments: values.collect(),
    })
}
