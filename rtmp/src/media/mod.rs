//! Encoded media as it moves between the capture/encoder, the wire and the decoder/renderer.
//!
//! A `MediaFrame` is what the publisher pipeline pulls out of the encoder and what the player
//! pipeline hands to the decoder.  The `flv` functions convert frames to and from the bodies of
//! RTMP audio and video messages.

mod errors;
mod frame;
mod metadata;

pub mod flv;

pub use self::errors::{DecodeError, EncodeError};
pub use self::frame::{
    AudioCodec, Codec, MediaFrame, MediaKind, VideoCodec, CODEC_ID_AAC, CODEC_ID_H264, CODEC_ID_H265,
};
pub use self::metadata::StreamMetadata;
