use super::params::{AudioParameters, ParameterMap, VideoParameters, FLAG_AE, FLAG_AF, FLAG_AWB};
use super::player::{parse_endpoint, validate_volume};
use super::ConfigError;
use crate::engine::ReconnectPolicy;
use crate::media::{StreamMetadata, VideoCodec};
use crate::pipeline::SendQueueConfig;
use crate::sessions::ClientSessionConfig;
use crate::transport::{Endpoint, NetworkOptions};
use std::time::Duration;

/// Encoder name advertised in `onMetaData`
const ENCODER_NAME: &str = concat!("rtmp_stream ", env!("CARGO_PKG_VERSION"));

/// Seconds of media the send queue can hold before it starts dropping
const SEND_QUEUE_SECONDS: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoOrientation {
    Portrait = 1,
    LandscapeRight = 3,
    LandscapeLeft = 4,
}

impl VideoOrientation {
    pub fn from_i32(value: i32) -> Option<VideoOrientation> {
        match value {
            1 => Some(VideoOrientation::Portrait),
            3 => Some(VideoOrientation::LandscapeRight),
            4 => Some(VideoOrientation::LandscapeLeft),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraDevice {
    WideAngle = 0,
    Telephoto = 1,
    UltraWide = 2,
    DualCamera = 3,
    TripleCamera = 4,
}

impl CameraDevice {
    pub fn from_i32(value: i32) -> Option<CameraDevice> {
        match value {
            0 => Some(CameraDevice::WideAngle),
            1 => Some(CameraDevice::Telephoto),
            2 => Some(CameraDevice::UltraWide),
            3 => Some(CameraDevice::DualCamera),
            4 => Some(CameraDevice::TripleCamera),
            _ => None,
        }
    }
}

/// The publisher's property bag.  Fields may be changed freely until `start()` or
/// `start_preview()`, where they are validated into a [`PublisherConfig`].
#[derive(Debug, Clone, PartialEq)]
pub struct PublisherSettings {
    pub url: String,
    pub crypto_key: String,
    pub audio_param: ParameterMap,
    pub video_param: ParameterMap,
    pub hw_accel_enable: bool,
    pub denoise_enable: bool,
    pub torch_enable: bool,
    pub enhanced_rtmp: bool,
    pub front_camera: bool,
    pub volume: f32,

    /// Width over height crop applied to captured pictures, 0 to keep the sensor's ratio
    pub room_ratio: f32,

    pub camera_device: i32,

    /// Combination of `FLAG_AF`, `FLAG_AE` and `FLAG_AWB`
    pub camera_flags: u32,

    /// Maximum gap between key frames, in milliseconds
    pub key_frame_interval_ms: i64,

    pub video_orientation: i32,
}

impl PublisherSettings {
    pub fn new() -> PublisherSettings {
        PublisherSettings {
            url: String::new(),
            crypto_key: String::new(),
            audio_param: ParameterMap::new(),
            video_param: ParameterMap::new(),
            hw_accel_enable: true,
            denoise_enable: false,
            torch_enable: false,
            enhanced_rtmp: false,
            front_camera: true,
            volume: 1.0,
            room_ratio: 0.0,
            camera_device: CameraDevice::WideAngle as i32,
            camera_flags: FLAG_AF | FLAG_AE | FLAG_AWB,
            key_frame_interval_ms: 2_000,
            video_orientation: VideoOrientation::Portrait as i32,
        }
    }

    /// Validates everything capture needs.  The url is not required for a preview.
    pub fn validate_capture(&self) -> Result<CaptureConfig, ConfigError> {
        let video = VideoParameters::from_map(&self.video_param)?;
        let orientation = VideoOrientation::from_i32(self.video_orientation).ok_or_else(|| {
            ConfigError::invalid(
                "videoOrientation",
                format!("unknown orientation {}", self.video_orientation),
            )
        })?;

        let camera_device = CameraDevice::from_i32(self.camera_device).ok_or_else(|| {
            ConfigError::invalid("cameraDevice", format!("unknown camera device {}", self.camera_device))
        })?;

        if !self.room_ratio.is_finite() || self.room_ratio < 0.0 {
            return Err(ConfigError::invalid("roomRatio", "must be zero or a positive ratio"));
        }

        if self.camera_flags & !(FLAG_AF | FLAG_AE | FLAG_AWB) != 0 {
            return Err(ConfigError::invalid("cameraFlags", format!("unknown flags {:#x}", self.camera_flags)));
        }

        Ok(CaptureConfig {
            width: video.width,
            height: video.height,
            fps: video.fps,
            front_camera: self.front_camera,
            camera_device,
            camera_flags: self.camera_flags,
            orientation,
            room_ratio: self.room_ratio,
            torch_enable: self.torch_enable,
        })
    }

    /// Validates the encoder path.  Like capture, this does not need a url.
    pub fn validate_encoder(&self) -> Result<EncoderConfig, ConfigError> {
        let audio = AudioParameters::from_map(&self.audio_param)?;
        let video = VideoParameters::from_map(&self.video_param)?;
        let volume = validate_volume(self.volume)?;

        let key_frame_interval_ms = u32::try_from(self.key_frame_interval_ms)
            .ok()
            .filter(|x| *x >= video.frame_interval_ms())
            .ok_or_else(|| {
                ConfigError::invalid(
                    "keyFrameInterval",
                    format!(
                        "{}ms is shorter than a single frame at {}fps",
                        self.key_frame_interval_ms, video.fps
                    ),
                )
            })?;

        Ok(EncoderConfig {
            audio,
            video,
            key_frame_interval_ms,
            hw_accel_enable: self.hw_accel_enable,
            denoise_enable: self.denoise_enable,
            volume,
        })
    }

    pub fn validate(&self) -> Result<PublisherConfig, ConfigError> {
        let endpoint = parse_endpoint(&self.url)?;
        let capture = self.validate_capture()?;
        let encoder = self.validate_encoder()?;

        if encoder.video.codec == VideoCodec::Hevc && !self.enhanced_rtmp {
            return Err(ConfigError::EnhancedRtmpRequired { codec: "H.265" });
        }

        let mut session = ClientSessionConfig::new();
        session.tc_url = Some(endpoint.tc_url());
        session.enhanced_rtmp = self.enhanced_rtmp;

        let frames_per_second = encoder.video.fps + audio_frames_per_second(&encoder.audio);
        let send_queue = SendQueueConfig {
            capacity: (frames_per_second * SEND_QUEUE_SECONDS) as usize,
            ..SendQueueConfig::new()
        };

        Ok(PublisherConfig {
            endpoint,
            crypto_key: self.crypto_key.clone(),
            session,
            network: NetworkOptions::new(),
            reconnect: ReconnectPolicy::new(),
            send_queue,
            capture,
            encoder,
        })
    }
}

impl Default for PublisherSettings {
    fn default() -> Self {
        PublisherSettings::new()
    }
}

/// Settings for the camera and microphone
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureConfig {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub front_camera: bool,
    pub camera_device: CameraDevice,
    pub camera_flags: u32,
    pub orientation: VideoOrientation,
    pub room_ratio: f32,
    pub torch_enable: bool,
}

impl CaptureConfig {
    /// Picture size after applying the room ratio crop
    pub fn cropped_size(&self) -> (u32, u32) {
        if self.room_ratio <= 0.0 {
            return (self.width, self.height);
        }

        let current = self.width as f32 / self.height as f32;
        if current > self.room_ratio {
            ((self.height as f32 * self.room_ratio).round() as u32, self.height)
        } else {
            (self.width, (self.width as f32 / self.room_ratio).round() as u32)
        }
    }
}

/// Settings for the encoder path
#[derive(Debug, Clone, PartialEq)]
pub struct EncoderConfig {
    pub audio: AudioParameters,
    pub video: VideoParameters,
    pub key_frame_interval_ms: u32,
    pub hw_accel_enable: bool,
    pub denoise_enable: bool,
    pub volume: f32,
}

/// Immutable snapshot of validated publisher settings, captured at `start()`
#[derive(Debug, Clone)]
pub struct PublisherConfig {
    pub endpoint: Endpoint,
    pub crypto_key: String,
    pub session: ClientSessionConfig,
    pub network: NetworkOptions,
    pub reconnect: ReconnectPolicy,
    pub send_queue: SendQueueConfig,
    pub capture: CaptureConfig,
    pub encoder: EncoderConfig,
}

impl PublisherConfig {
    /// The `onMetaData` announced to the server before any media
    pub fn stream_metadata(&self) -> StreamMetadata {
        let audio = &self.encoder.audio;
        let video = &self.encoder.video;
        let (width, height) = self.capture.cropped_size();

        StreamMetadata {
            video_width: Some(width),
            video_height: Some(height),
            video_codec_id: Some(video.codec.codec_id()),
            video_frame_rate: Some(video.fps as f32),
            video_bitrate_kbps: Some(video.bitrate / 1000),
            audio_codec_id: Some(audio.codec.codec_id()),
            audio_bitrate_kbps: Some(audio.bitrate / 1000),
            audio_sample_rate: Some(audio.sample_rate),
            audio_channels: Some(audio.channels),
            audio_is_stereo: Some(audio.channels == 2),
            encoder: Some(ENCODER_NAME.to_string()),
        }
    }

    /// Target outbound rate in bytes per second, with headroom for bursts around key frames
    pub fn pacing_bytes_per_second(&self) -> usize {
        let bits = u64::from(self.encoder.video.bitrate) + u64::from(self.encoder.audio.bitrate);
        (bits / 8 * 3 / 2) as usize
    }

    pub fn key_frame_interval(&self) -> Duration {
        Duration::from_millis(u64::from(self.encoder.key_frame_interval_ms))
    }
}

/// AAC produces one frame per 1024 samples
fn audio_frames_per_second(audio: &AudioParameters) -> u32 {
    (audio.sample_rate + 1023) / 1024
}
