//! Encoding of `Amf0Value`s into AMF0 bytes.

use crate::errors::Amf0SerializationError;
use crate::markers;
use crate::Amf0Value;
use byteorder::{BigEndian, WriteBytesExt};
use std::collections::HashMap;

/// Serializes values into an amf0 encoded vector of bytes
pub fn serialize(values: &[Amf0Value]) -> Result<Vec<u8>, Amf0SerializationError> {
    let mut bytes = Vec::with_capacity(values.len() * 16);
    for value in values {
        write_value(value, &mut bytes)?;
    }

    Ok(bytes)
}

fn write_value(value: &Amf0Value, bytes: &mut Vec<u8>) -> Result<(), Amf0SerializationError> {
    match value {
        Amf0Value::Number(number) => {
            bytes.push(markers::NUMBER_MARKER);
            bytes.write_f64::<BigEndian>(*number)?;
        }

        Amf0Value::Boolean(flag) => {
            bytes.push(markers::BOOLEAN_MARKER);
            bytes.push(*flag as u8);
        }

        Amf0Value::Utf8String(text) => write_string(text, bytes)?,
        Amf0Value::Null => bytes.push(markers::NULL_MARKER),
        Amf0Value::Undefined => bytes.push(markers::UNDEFINED_MARKER),

        Amf0Value::Object(properties) => {
            bytes.push(markers::OBJECT_MARKER);
            write_properties(properties, bytes)?;
        }

        Amf0Value::EcmaArray(properties) => {
            bytes.push(markers::ECMA_ARRAY_MARKER);
            bytes.write_u32::<BigEndian>(properties.len() as u32)?;
            write_properties(properties, bytes)?;
        }

        Amf0Value::StrictArray(items) => {
            bytes.push(markers::STRICT_ARRAY_MARKER);
            bytes.write_u32::<BigEndian>(items.len() as u32)?;
            for item in items {
                write_value(item, bytes)?;
            }
        }
    }

    Ok(())
}

// Strings that don't fit a u16 length are promoted to the long string marker
fn write_string(text: &str, bytes: &mut Vec<u8>) -> Result<(), Amf0SerializationError> {
    if text.len() <= u16::MAX as usize {
        bytes.push(markers::STRING_MARKER);
        bytes.write_u16::<BigEndian>(text.len() as u16)?;
    } else if text.len() <= u32::MAX as usize {
        bytes.push(markers::LONG_STRING_MARKER);
        bytes.write_u32::<BigEndian>(text.len() as u32)?;
    } else {
        return Err(Amf0SerializationError::StringTooLong);
    }

    bytes.extend_from_slice(text.as_bytes());
    Ok(())
}

fn write_properties(
    properties: &HashMap<String, Amf0Value>,
    bytes: &mut Vec<u8>,
) -> Result<(), Amf0SerializationError> {
    for (name, value) in properties {
        if name.len() > u16::MAX as usize {
            return Err(Amf0SerializationError::PropertyNameTooLong);
        }

        bytes.write_u16::<BigEndian>(name.len() as u16)?;
        bytes.extend_from_slice(name.as_bytes());
        write_value(value, bytes)?;
    }

    bytes.write_u16::<BigEndian>(markers::UTF_8_EMPTY_MARKER)?;
    bytes.push(markers::OBJECT_END_MARKER);
    Ok(())
}
