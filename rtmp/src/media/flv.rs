//! FLV audio and video tag bodies, which is what RTMP audio and video messages carry.
//!
//! H.264 uses the legacy `AVCVIDEOPACKET` layout.  Other video codecs use the enhanced RTMP
//! `ExVideoTagHeader`, where the codec is identified by a FourCC instead of a 4 bit id.

use super::errors::{DecodeError, EncodeError};
use super::frame::{AudioCodec, Codec, MediaFrame, VideoCodec};
use crate::time::RtmpTimestamp;
use byteorder::{BigEndian, ByteOrder};
use bytes::{BufMut, Bytes, BytesMut};

const FRAME_TYPE_KEY: u8 = 1;
const FRAME_TYPE_INTER: u8 = 2;
const FRAME_TYPE_COMMAND: u8 = 5;

const LEGACY_CODEC_AVC: u8 = 7;
const LEGACY_CODEC_HEVC: u8 = 12;
const AVC_PACKET_SEQUENCE_HEADER: u8 = 0;
const AVC_PACKET_NALU: u8 = 1;
const AVC_PACKET_END_OF_SEQUENCE: u8 = 2;

const EX_HEADER_FLAG: u8 = 0x80;
const EX_PACKET_SEQUENCE_START: u8 = 0;
const EX_PACKET_CODED_FRAMES: u8 = 1;
const EX_PACKET_SEQUENCE_END: u8 = 2;
const EX_PACKET_CODED_FRAMES_X: u8 = 3;
const EX_PACKET_METADATA: u8 = 4;

const SOUND_FORMAT_AAC: u8 = 10;
/// AAC, 44 kHz, 16 bit, stereo.  The rate/size/channel bits are fixed for AAC.
const AAC_TAG_HEADER: u8 = (SOUND_FORMAT_AAC << 4) | 0x0f;
const AAC_PACKET_SEQUENCE_HEADER: u8 = 0;
const AAC_PACKET_RAW: u8 = 1;

/// Builds the body of a video message.  `enhanced` selects the FourCC layout for codecs
/// that need it; H.264 always uses the legacy layout.
pub fn encode_video_tag(frame: &MediaFrame, enhanced: bool) -> Result<Bytes, EncodeError> {
    let codec = match frame.codec() {
        Codec::Video(codec) => codec,
        Codec::Audio(codec) => return Err(EncodeError::UnsupportedCodec { codec_id: codec.codec_id() }),
    };

    let frame_type = if frame.is_key_frame() { FRAME_TYPE_KEY } else { FRAME_TYPE_INTER };
    let mut tag = BytesMut::with_capacity(frame.data().len() + 8);

    match codec {
        VideoCodec::Avc => {
            tag.put_u8((frame_type << 4) | LEGACY_CODEC_AVC);
            tag.put_u8(if frame.is_sequence_header() {
                AVC_PACKET_SEQUENCE_HEADER
            } else {
                AVC_PACKET_NALU
            });
            put_i24(&mut tag, frame.composition_offset());
        }

        VideoCodec::Hevc => {
            if !enhanced {
                return Err(EncodeError::EnhancedRtmpRequired { codec: "H.265" });
            }

            let packet_type = match (frame.is_sequence_header(), frame.composition_offset()) {
                (true, _) => EX_PACKET_SEQUENCE_START,
                (false, 0) => EX_PACKET_CODED_FRAMES_X,
                (false, _) => EX_PACKET_CODED_FRAMES,
            };

            tag.put_u8(EX_HEADER_FLAG | (frame_type << 4) | packet_type);
            tag.put_slice(&codec.fourcc());
            if packet_type == EX_PACKET_CODED_FRAMES {
                put_i24(&mut tag, frame.composition_offset());
            }
        }
    }

    tag.put_slice(frame.data());
    Ok(tag.freeze())
}

/// Parses a video message body.  Returns `None` for tags that carry no picture, such as
/// end of sequence markers, command frames and empty keep-alive messages.
pub fn decode_video_tag(timestamp: RtmpTimestamp, data: &Bytes) -> Result<Option<MediaFrame>, DecodeError> {
    const KIND: &str = "Video";
    let first = match data.first() {
        Some(x) => *x,
        None => return Ok(None),
    };

    if first & EX_HEADER_FLAG != 0 {
        return decode_enhanced_video_tag(timestamp, data);
    }

    let frame_type = (first >> 4) & 0x07;
    let codec = match first & 0x0f {
        LEGACY_CODEC_AVC => VideoCodec::Avc,
        LEGACY_CODEC_HEVC => VideoCodec::Hevc,
        codec_id => return Err(DecodeError::UnsupportedVideoCodec { codec_id }),
    };

    if frame_type == FRAME_TYPE_COMMAND {
        return Ok(None);
    }

    if data.len() < 5 {
        return Err(DecodeError::Truncated { kind: KIND });
    }

    let composition_offset = BigEndian::read_i24(&data[2..5]);
    let body = data.slice(5..);
    let frame = match data[1] {
        AVC_PACKET_SEQUENCE_HEADER => MediaFrame::video_sequence_header(codec, timestamp, body),
        AVC_PACKET_NALU => MediaFrame::video(
            codec,
            timestamp,
            composition_offset,
            frame_type == FRAME_TYPE_KEY,
            body,
        ),
        AVC_PACKET_END_OF_SEQUENCE => return Ok(None),
        _ => return Err(DecodeError::Truncated { kind: KIND }),
    };

    Ok(Some(frame))
}

fn decode_enhanced_video_tag(timestamp: RtmpTimestamp, data: &Bytes) -> Result<Option<MediaFrame>, DecodeError> {
    const KIND: &str = "Enhanced video";
    if data.len() < 5 {
        return Err(DecodeError::Truncated { kind: KIND });
    }

    let frame_type = (data[0] >> 4) & 0x07;
    let packet_type = data[0] & 0x0f;
    let mut fourcc = [0_u8; 4];
    fourcc.copy_from_slice(&data[1..5]);

    let codec = VideoCodec::from_fourcc(fourcc).ok_or(DecodeError::UnsupportedFourCc { fourcc })?;
    if frame_type == FRAME_TYPE_COMMAND {
        return Ok(None);
    }

    let frame = match packet_type {
        EX_PACKET_SEQUENCE_START => MediaFrame::video_sequence_header(codec, timestamp, data.slice(5..)),
        EX_PACKET_CODED_FRAMES => {
            if data.len() < 8 {
                return Err(DecodeError::Truncated { kind: KIND });
            }

            let composition_offset = BigEndian::read_i24(&data[5..8]);
            MediaFrame::video(codec, timestamp, composition_offset, frame_type == FRAME_TYPE_KEY, data.slice(8..))
        }

        EX_PACKET_CODED_FRAMES_X => {
            MediaFrame::video(codec, timestamp, 0, frame_type == FRAME_TYPE_KEY, data.slice(5..))
        }

        EX_PACKET_SEQUENCE_END | EX_PACKET_METADATA => return Ok(None),

        // Packet types added by later revisions of the format
        _ => return Ok(None),
    };

    Ok(Some(frame))
}

pub fn encode_audio_tag(frame: &MediaFrame) -> Result<Bytes, EncodeError> {
    let mut tag = BytesMut::with_capacity(frame.data().len() + 2);
    match frame.codec() {
        Codec::Video(codec) => return Err(EncodeError::UnsupportedCodec { codec_id: codec.codec_id() }),
        Codec::Audio(AudioCodec::Aac) => {
            tag.put_u8(AAC_TAG_HEADER);
            tag.put_u8(if frame.is_sequence_header() {
                AAC_PACKET_SEQUENCE_HEADER
            } else {
                AAC_PACKET_RAW
            });
        }
    }

    tag.put_slice(frame.data());
    Ok(tag.freeze())
}

pub fn decode_audio_tag(timestamp: RtmpTimestamp, data: &Bytes) -> Result<Option<MediaFrame>, DecodeError> {
    let first = match data.first() {
        Some(x) => *x,
        None => return Ok(None),
    };

    let format = first >> 4;
    if format != SOUND_FORMAT_AAC {
        return Err(DecodeError::UnsupportedAudioFormat { format });
    }

    if data.len() < 2 {
        return Err(DecodeError::Truncated { kind: "Audio" });
    }

    let body = data.slice(2..);
    let frame = match data[1] {
        AAC_PACKET_SEQUENCE_HEADER => MediaFrame::audio_sequence_header(AudioCodec::Aac, timestamp, body),
        _ => MediaFrame::audio(AudioCodec::Aac, timestamp, body),
    };

    Ok(Some(frame))
}

fn put_i24(tag: &mut BytesMut, value: i32) {
    let mut buffer = [0_u8; 3];
    BigEndian::write_i24(&mut buffer, value.clamp(-(1 << 23), (1 << 23) - 1));
    tag.put_slice(&buffer);
}
