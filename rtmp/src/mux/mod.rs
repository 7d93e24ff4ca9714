//! The message multiplexer sits between media frames and RTMP messages.
//!
//! Outbound, it packages `MediaFrame`s and stream metadata as audio, video and data messages.
//! Inbound, it turns reassembled messages back into frames, metadata or typed `ControlEvent`s
//! for the session state machine.  Per stream, media timestamps leaving in either direction
//! never go backwards.

mod control;
mod ordering;

pub use self::control::{ControlEvent, StatusInfo};
pub use self::ordering::TimestampGuard;

use crate::media::{flv, DecodeError, EncodeError, MediaFrame, MediaKind, StreamMetadata};
use crate::messages::{MessagePayload, RtmpMessage};
use crate::time::RtmpTimestamp;
use rtmp_stream_amf0::Amf0Value;

const SET_DATA_FRAME: &str = "@setDataFrame";
const ON_META_DATA: &str = "onMetaData";

/// The result of decoding one inbound message
#[derive(PartialEq, Debug)]
pub enum Demuxed {
    Frame { stream_id: u32, frame: MediaFrame },
    Metadata { stream_id: u32, metadata: StreamMetadata },
    Control(ControlEvent),

    /// Protocol control and user control messages, left for the session to handle
    Protocol(RtmpMessage),

    /// Messages carrying nothing to act on, such as empty video keep-alives
    Ignored,
}

pub struct MessageMultiplexer {
    enhanced_rtmp: bool,
    outbound: TimestampGuard,
    inbound: TimestampGuard,
}

impl MessageMultiplexer {
    /// `enhanced_rtmp` allows codecs that are only carried by the FourCC video tag format
    pub fn new(enhanced_rtmp: bool) -> MessageMultiplexer {
        MessageMultiplexer {
            enhanced_rtmp,
            outbound: TimestampGuard::new("outbound"),
            inbound: TimestampGuard::new("inbound"),
        }
    }

    pub fn is_enhanced(&self) -> bool {
        self.enhanced_rtmp
    }

    /// Packages a media frame as an audio or video message on the given stream
    pub fn encode_frame(&mut self, frame: &MediaFrame, stream_id: u32) -> Result<MessagePayload, EncodeError> {
        let timestamp = self.outbound.admit(stream_id, frame.kind(), frame.timestamp());
        let message = match frame.kind() {
            MediaKind::Video => RtmpMessage::VideoData {
                data: flv::encode_video_tag(frame, self.enhanced_rtmp)?,
            },

            MediaKind::Audio => RtmpMessage::AudioData {
                data: flv::encode_audio_tag(frame)?,
            },
        };

        Ok(message.into_message_payload(timestamp, stream_id)?)
    }

    /// Packages stream metadata as a `@setDataFrame onMetaData` data message
    pub fn encode_metadata(
        &self,
        metadata: &StreamMetadata,
        stream_id: u32,
    ) -> Result<MessagePayload, EncodeError> {
        let message = RtmpMessage::Amf0Data {
            values: vec![
                Amf0Value::Utf8String(SET_DATA_FRAME.to_string()),
                Amf0Value::Utf8String(ON_META_DATA.to_string()),
                Amf0Value::EcmaArray(metadata.to_amf0_properties(self.enhanced_rtmp)),
            ],
        };

        Ok(message.into_message_payload(RtmpTimestamp::new(0), stream_id)?)
    }

    /// Packages a protocol or command message
    pub fn encode_control(
        &self,
        message: RtmpMessage,
        timestamp: RtmpTimestamp,
        stream_id: u32,
    ) -> Result<MessagePayload, EncodeError> {
        Ok(message.into_message_payload(timestamp, stream_id)?)
    }

    pub fn decode(&mut self, payload: &MessagePayload) -> Result<Demuxed, DecodeError> {
        let stream_id = payload.message_stream_id;
        let frame = match payload.to_rtmp_message()? {
            RtmpMessage::VideoData { data } => flv::decode_video_tag(payload.timestamp, &data)?,
            RtmpMessage::AudioData { data } => flv::decode_audio_tag(payload.timestamp, &data)?,

            RtmpMessage::Amf0Data { values } => {
                return Ok(match read_metadata(values) {
                    Some(metadata) => Demuxed::Metadata { stream_id, metadata },
                    None => Demuxed::Ignored,
                });
            }

            RtmpMessage::Amf0Command {
                command_name,
                transaction_id,
                command_object,
                additional_arguments,
            } => {
                return Ok(Demuxed::Control(control::decode_command(
                    stream_id,
                    command_name,
                    transaction_id,
                    command_object,
                    additional_arguments,
                )));
            }

            other => return Ok(Demuxed::Protocol(other)),
        };

        Ok(match frame {
            Some(frame) => {
                let timestamp = self.inbound.admit(stream_id, frame.kind(), frame.timestamp());
                let frame = if timestamp == frame.timestamp() {
                    frame
                } else {
                    frame.with_timestamp(timestamp)
                };

                Demuxed::Frame { stream_id, frame }
            }

            None => Demuxed::Ignored,
        })
    }

    /// Forgets timestamp history for a stream that was closed
    pub fn reset_stream(&mut self, stream_id: u32) {
        self.outbound.reset(stream_id);
        self.inbound.reset(stream_id);
    }
}

/// Accepts both `onMetaData {..}` and `@setDataFrame onMetaData {..}`
fn read_metadata(values: Vec<Amf0Value>) -> Option<StreamMetadata> {
    let mut values = values.into_iter().peekable();
    if values.peek().and_then(Amf0Value::as_str) == Some(SET_DATA_FRAME) {
        values.next();
    }

    if values.next()?.as_str() != Some(ON_META_DATA) {
        return None;
    }

    let properties = values.next()?.get_object_properties()?;
    Some(StreamMetadata::from_amf0_properties(&properties))
}
