//! Media capabilities supplied by the host platform.
//!
//! The engine never touches cameras, microphones, encoders, decoders or views directly.  It
//! asks a [`DeviceProvider`] for them when a session starts and releases them when it stops.
//! Hardware acceleration, denoising, torch and camera selection are passed through in the
//! configs and interpreted by the provider.
//!
//! [`synthetic`] holds a provider that generates media in software, used by tests and the
//! probe tool.

pub mod synthetic;

use crate::config::{CaptureConfig, EncoderConfig, ScaleMode};
use crate::media::{DecodeError, EncodeError, MediaFrame, StreamMetadata};

/// Camera and microphone feeding an encoder
pub trait MediaSource: Send {
    /// Blocks until the next encoded frame is ready.  `Ok(None)` means the source has ended.
    ///
    /// Frames of each kind must come out with non-decreasing timestamps, and each kind's
    /// sequence header must come before its first frame.
    fn next_frame(&mut self) -> Result<Option<MediaFrame>, EncodeError>;

    /// Asks the encoder to make the next video frame a key frame
    fn request_key_frame(&mut self);

    /// Releases the capture devices and the encoder
    fn close(&mut self);
}

/// Where captured pictures are shown while previewing
pub trait PreviewSurface: Send {
    fn present(&mut self, frame: &MediaFrame);
    fn close(&mut self);
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderOptions {
    pub scale_mode: ScaleMode,
    pub volume: f32,
    pub hw_accel_enable: bool,
}

/// Decoder and renderer for a played stream
pub trait MediaSink: Send {
    /// Called whenever the stream announces new metadata
    fn configure(&mut self, metadata: &StreamMetadata) -> Result<(), DecodeError>;

    fn render(&mut self, frame: &MediaFrame) -> Result<(), DecodeError>;
    fn set_volume(&mut self, volume: f32);
    fn close(&mut self);
}

pub trait DeviceProvider: Send + Sync {
    fn open_source(
        &self,
        capture: &CaptureConfig,
        encoder: &EncoderConfig,
    ) -> Result<Box<dyn MediaSource>, EncodeError>;

    fn open_preview(&self, capture: &CaptureConfig) -> Result<Box<dyn PreviewSurface>, EncodeError>;

    fn open_sink(&self, options: &RenderOptions) -> Result<Box<dyn MediaSink>, DecodeError>;
}
