use crate::time::RtmpTimestamp;
use bytes::Bytes;
use std::fmt;

/// Codec id used by the host platform for H.264
pub const CODEC_ID_H264: u32 = 27;
/// Codec id used by the host platform for H.265
pub const CODEC_ID_H265: u32 = 173;
/// Codec id used by the host platform for AAC
pub const CODEC_ID_AAC: u32 = 86018;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Audio,
    Video,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum VideoCodec {
    Avc,
    Hevc,
}

impl VideoCodec {
    pub fn from_codec_id(codec_id: u32) -> Option<VideoCodec> {
        match codec_id {
            CODEC_ID_H264 => Some(VideoCodec::Avc),
            CODEC_ID_H265 => Some(VideoCodec::Hevc),
            _ => None,
        }
    }

    pub fn codec_id(self) -> u32 {
        match self {
            VideoCodec::Avc => CODEC_ID_H264,
            VideoCodec::Hevc => CODEC_ID_H265,
        }
    }

    pub fn fourcc(self) -> [u8; 4] {
        match self {
            VideoCodec::Avc => *b"avc1",
            VideoCodec::Hevc => *b"hvc1",
        }
    }

    pub fn from_fourcc(fourcc: [u8; 4]) -> Option<VideoCodec> {
        match &fourcc {
            b"avc1" => Some(VideoCodec::Avc),
            b"hvc1" => Some(VideoCodec::Hevc),
            _ => None,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum AudioCodec {
    Aac,
}

impl AudioCodec {
    pub fn from_codec_id(codec_id: u32) -> Option<AudioCodec> {
        match codec_id {
            CODEC_ID_AAC => Some(AudioCodec::Aac),
            _ => None,
        }
    }

    pub fn codec_id(self) -> u32 {
        match self {
            AudioCodec::Aac => CODEC_ID_AAC,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Codec {
    Video(VideoCodec),
    Audio(AudioCodec),
}

/// An encoded audio or video sample.  Frames are immutable once built; the payload is shared,
/// so cloning is cheap.
#[derive(Clone, PartialEq)]
pub struct MediaFrame {
    codec: Codec,
    timestamp: RtmpTimestamp,
    composition_offset: i32,
    key_frame: bool,
    sequence_header: bool,
    data: Bytes,
}

impl MediaFrame {
    /// A coded video picture.  `composition_offset` is the presentation time minus the decode
    /// time, in milliseconds.
    pub fn video(
        codec: VideoCodec,
        timestamp: RtmpTimestamp,
        composition_offset: i32,
        key_frame: bool,
        data: Bytes,
    ) -> MediaFrame {
        MediaFrame {
            codec: Codec::Video(codec),
            timestamp,
            composition_offset,
            key_frame,
            sequence_header: false,
            data,
        }
    }

    /// Decoder configuration record (avcC / hvcC) that must precede the first picture
    pub fn video_sequence_header(codec: VideoCodec, timestamp: RtmpTimestamp, data: Bytes) -> MediaFrame {
        MediaFrame {
            codec: Codec::Video(codec),
            timestamp,
            composition_offset: 0,
            key_frame: true,
            sequence_header: true,
            data,
        }
    }

    pub fn audio(codec: AudioCodec, timestamp: RtmpTimestamp, data: Bytes) -> MediaFrame {
        MediaFrame {
            codec: Codec::Audio(codec),
            timestamp,
            composition_offset: 0,
            key_frame: false,
            sequence_header: false,
            data,
        }
    }

    /// AudioSpecificConfig that must precede the first audio frame
    pub fn audio_sequence_header(codec: AudioCodec, timestamp: RtmpTimestamp, data: Bytes) -> MediaFrame {
        MediaFrame {
            sequence_header: true,
            ..MediaFrame::audio(codec, timestamp, data)
        }
    }

    pub fn kind(&self) -> MediaKind {
        match self.codec {
            Codec::Video(_) => MediaKind::Video,
            Codec::Audio(_) => MediaKind::Audio,
        }
    }

    pub fn codec(&self) -> Codec {
        self.codec
    }

    pub fn timestamp(&self) -> RtmpTimestamp {
        self.timestamp
    }

    pub fn composition_offset(&self) -> i32 {
        self.composition_offset
    }

    pub fn is_key_frame(&self) -> bool {
        self.key_frame
    }

    pub fn is_sequence_header(&self) -> bool {
        self.sequence_header
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Video pictures other than key frames and sequence headers
    pub fn is_droppable_video(&self) -> bool {
        self.kind() == MediaKind::Video && !self.key_frame && !self.sequence_header
    }

    /// Copy of this frame moved to a different timestamp
    pub fn with_timestamp(&self, timestamp: RtmpTimestamp) -> MediaFrame {
        MediaFrame {
            timestamp,
            ..self.clone()
        }
    }
}

impl fmt::Debug for MediaFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaFrame")
            .field("codec", &self.codec)
            .field("timestamp", &self.timestamp.value)
            .field("composition_offset", &self.composition_offset)
            .field("key_frame", &self.key_frame)
            .field("sequence_header", &self.sequence_header)
            .field("bytes", &self.data.len())
            .finish()
    }
}
