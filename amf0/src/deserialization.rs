//! Decoding of AMF0 bytes into `Amf0Value`s.

use crate::errors::Amf0DeserializationError;
use crate::markers;
use crate::{Amf0Value, MAX_NESTING_DEPTH};
use byteorder::{BigEndian, ReadBytesExt};
use std::collections::HashMap;
use std::io::Read;

/// Reads every value from the byte stream until it is exhausted
pub fn deserialize<R: Read>(bytes: &mut R) -> Result<Vec<Amf0Value>, Amf0DeserializationError> {
    let mut results = Vec::new();
    while let Some(value) = read_value(bytes, 0)? {
        results.push(value);
    }

    Ok(results)
}

// `None` marks a clean end of input (or a stray object end marker at the top level)
fn read_value<R: Read>(
    bytes: &mut R,
    depth: usize,
) -> Result<Option<Amf0Value>, Amf0DeserializationError> {
    let mut marker = [0_u8; 1];
    if bytes.read(&mut marker)? == 0 {
        return Ok(None);
    }

    if depth > MAX_NESTING_DEPTH {
        return Err(Amf0DeserializationError::NestingTooDeep {
            max_depth: MAX_NESTING_DEPTH,
        });
    }

    let value = match marker[0] {
        markers::OBJECT_END_MARKER => return Ok(None),
        markers::NUMBER_MARKER => Amf0Value::Number(bytes.read_f64::<BigEndian>()?),
        markers::BOOLEAN_MARKER => Amf0Value::Boolean(bytes.read_u8()? != 0),
        markers::NULL_MARKER => Amf0Value::Null,
        markers::UNDEFINED_MARKER => Amf0Value::Undefined,
        markers::STRING_MARKER => {
            let length = bytes.read_u16::<BigEndian>()? as u64;
            Amf0Value::Utf8String(read_utf8(bytes, length)?)
        }

        markers::LONG_STRING_MARKER => {
            let length = bytes.read_u32::<BigEndian>()? as u64;
            Amf0Value::Utf8String(read_utf8(bytes, length)?)
        }

        markers::OBJECT_MARKER => Amf0Value::Object(read_properties(bytes, depth)?),

        // The declared count is unreliable in the wild, the end marker is what terminates it
        markers::ECMA_ARRAY_MARKER => {
            let _declared_count = bytes.read_u32::<BigEndian>()?;
            Amf0Value::EcmaArray(read_properties(bytes, depth)?)
        }

        markers::STRICT_ARRAY_MARKER => {
            let count = bytes.read_u32::<BigEndian>()?;
            let mut items = Vec::with_capacity(count.min(64) as usize);
            for _ in 0..count {
                match read_value(bytes, depth + 1)? {
                    Some(item) => items.push(item),
                    None => return Err(Amf0DeserializationError::UnexpectedEof),
                }
            }

            Amf0Value::StrictArray(items)
        }

        marker => return Err(Amf0DeserializationError::UnknownMarker { marker }),
    };

    Ok(Some(value))
}

fn read_utf8<R: Read>(bytes: &mut R, length: u64) -> Result<String, Amf0DeserializationError> {
    let mut buffer = Vec::new();
    let read = bytes.take(length).read_to_end(&mut buffer)?;
    if (read as u64) < length {
        return Err(Amf0DeserializationError::LengthOutOfBounds { length });
    }

    Ok(String::from_utf8(buffer)?)
}

fn read_properties<R: Read>(
    bytes: &mut R,
    depth: usize,
) -> Result<HashMap<String, Amf0Value>, Amf0DeserializationError> {
    let mut properties = HashMap::new();

    loop {
        let name_length = bytes.read_u16::<BigEndian>()?;
        if name_length == markers::UTF_8_EMPTY_MARKER {
            if bytes.read_u8()? != markers::OBJECT_END_MARKER {
                return Err(Amf0DeserializationError::UnexpectedEmptyObjectPropertyName);
            }

            return Ok(properties);
        }

        let name = read_utf8(bytes, name_length as u64)?;
        match read_value(bytes, depth + 1)? {
            Some(value) => properties.insert(name, value),
            None => return Err(Amf0DeserializationError::UnexpectedEof),
        };
    }
}
