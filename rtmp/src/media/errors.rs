use crate::messages::{MessageDeserializationError, MessageSerializationError};
use thiserror::Error;

/// Failures turning captured media into outbound messages
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("{codec} can only be published with enhanced RTMP enabled")]
    EnhancedRtmpRequired { codec: &'static str },

    #[error("Codec id {codec_id} is not supported")]
    UnsupportedCodec { codec_id: u32 },

    #[error("Encoder failed: {message}")]
    Encoder { message: String },

    #[error("Failed to build message: {0}")]
    Message(#[from] MessageSerializationError),
}

/// Failures turning inbound messages back into media
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Video codec id {codec_id} is not supported")]
    UnsupportedVideoCodec { codec_id: u8 },

    #[error("Video FourCC {fourcc:?} is not supported")]
    UnsupportedFourCc { fourcc: [u8; 4] },

    #[error("Audio sound format {format} is not supported")]
    UnsupportedAudioFormat { format: u8 },

    #[error("{kind} tag was truncated")]
    Truncated { kind: &'static str },

    #[error("Decoder failed: {message}")]
    Decoder { message: String },

    #[error("Failed to read message: {0}")]
    Message(#[from] MessageDeserializationError),
}
