use super::ConfigError;
use crate::media::{AudioCodec, VideoCodec};
use std::collections::HashMap;
use tracing::debug;

/// Lets the encoder pick a profile
pub const PROFILE_AUTO: u32 = 0;
pub const PROFILE_H264_BASELINE: u32 = 66;
pub const PROFILE_H264_MAIN: u32 = 77;
pub const PROFILE_H264_HIGH: u32 = 100;
pub const PROFILE_H265_MAIN: u32 = 1;

pub const PROFILE_AAC_LC: u32 = 1;
pub const PROFILE_AAC_HE: u32 = 4;
pub const PROFILE_AAC_HE_V2: u32 = 28;
pub const PROFILE_AAC_LD: u32 = 22;
pub const PROFILE_AAC_ELD: u32 = 38;

/// Camera focus flags understood by capture devices
pub const FLAG_AF: u32 = 1;
pub const FLAG_AE: u32 = 2;
pub const FLAG_AWB: u32 = 4;

pub const SUPPORTED_SAMPLE_RATES: [u32; 5] = [8000, 16000, 32000, 44100, 48000];

/// A loosely typed parameter map as handed over by the host, e.g. `{"codecid": 27, "fps": 30}`
pub type ParameterMap = HashMap<String, i64>;

#[derive(Debug, Clone, PartialEq)]
pub struct AudioParameters {
    pub codec: AudioCodec,
    pub profile: u32,
    pub sample_rate: u32,
    pub channels: u32,
    /// Bits per second
    pub bitrate: u32,
}

impl AudioParameters {
    pub fn new() -> AudioParameters {
        AudioParameters {
            codec: AudioCodec::Aac,
            profile: PROFILE_AAC_LC,
            sample_rate: 44100,
            channels: 2,
            bitrate: 64_000,
        }
    }

    /// Reads `codecid`, `profile`, `samplerate`, `channels` and `bitrate`.  Keys that are
    /// missing keep their default.
    pub fn from_map(map: &ParameterMap) -> Result<AudioParameters, ConfigError> {
        let mut params = AudioParameters::new();
        for (key, value) in map {
            match key.as_str() {
                "codecid" => {
                    params.codec = to_u32(key, *value)
                        .ok()
                        .and_then(AudioCodec::from_codec_id)
                        .ok_or(ConfigError::UnsupportedCodec {
                            field: "audio codecid",
                            codec_id: *value,
                        })?;
                }

                "profile" => params.profile = to_u32(key, *value)?,
                "samplerate" => params.sample_rate = to_u32(key, *value)?,
                "channels" => params.channels = to_u32(key, *value)?,
                "bitrate" => params.bitrate = to_u32(key, *value)?,
                other => debug!(key = other, "Ignoring unknown audio parameter"),
            }
        }

        params.validate()?;
        Ok(params)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !SUPPORTED_SAMPLE_RATES.contains(&self.sample_rate) {
            return Err(ConfigError::invalid(
                "samplerate",
                format!("{} is not one of {:?}", self.sample_rate, SUPPORTED_SAMPLE_RATES),
            ));
        }

        if self.channels != 1 && self.channels != 2 {
            return Err(ConfigError::invalid("channels", "must be 1 or 2"));
        }

        let profiles = [PROFILE_AUTO, PROFILE_AAC_LC, PROFILE_AAC_HE, PROFILE_AAC_HE_V2, PROFILE_AAC_LD, PROFILE_AAC_ELD];
        if !profiles.contains(&self.profile) {
            return Err(ConfigError::invalid("audio profile", format!("unknown AAC profile {}", self.profile)));
        }

        if self.bitrate == 0 {
            return Err(ConfigError::invalid("audio bitrate", "must be positive"));
        }

        Ok(())
    }
}

impl Default for AudioParameters {
    fn default() -> Self {
        AudioParameters::new()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VideoParameters {
    pub codec: VideoCodec,
    pub profile: u32,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    /// Bits per second
    pub bitrate: u32,
}

impl VideoParameters {
    pub fn new() -> VideoParameters {
        VideoParameters {
            codec: VideoCodec::Avc,
            profile: PROFILE_H264_MAIN,
            width: 1280,
            height: 720,
            fps: 30,
            bitrate: 2_000_000,
        }
    }

    /// Reads `codecid`, `profile`, `width`, `height`, `fps` and `bitrate`
    pub fn from_map(map: &ParameterMap) -> Result<VideoParameters, ConfigError> {
        let mut params = VideoParameters::new();
        let mut profile_set = false;
        for (key, value) in map {
            match key.as_str() {
                "codecid" => {
                    params.codec = to_u32(key, *value)
                        .ok()
                        .and_then(VideoCodec::from_codec_id)
                        .ok_or(ConfigError::UnsupportedCodec {
                            field: "video codecid",
                            codec_id: *value,
                        })?;
                }

                "profile" => {
                    params.profile = to_u32(key, *value)?;
                    profile_set = true;
                }

                "width" => params.width = to_u32(key, *value)?,
                "height" => params.height = to_u32(key, *value)?,
                "fps" => params.fps = to_u32(key, *value)?,
                "bitrate" => params.bitrate = to_u32(key, *value)?,
                other => debug!(key = other, "Ignoring unknown video parameter"),
            }
        }

        // The default profile only makes sense for the default codec
        if !profile_set && params.codec == VideoCodec::Hevc {
            params.profile = PROFILE_H265_MAIN;
        }

        params.validate()?;
        Ok(params)
    }

    /// Duration of a single frame in milliseconds, rounded up
    pub fn frame_interval_ms(&self) -> u32 {
        let fps = self.fps.max(1);
        (1000 + fps - 1) / fps
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::invalid("resolution", "width and height must be positive"));
        }

        if self.fps == 0 || self.fps > 120 {
            return Err(ConfigError::invalid("fps", "must be between 1 and 120"));
        }

        let valid_profile = match self.codec {
            VideoCodec::Avc => [PROFILE_AUTO, PROFILE_H264_BASELINE, PROFILE_H264_MAIN, PROFILE_H264_HIGH].contains(&self.profile),
            VideoCodec::Hevc => [PROFILE_AUTO, PROFILE_H265_MAIN].contains(&self.profile),
        };

        if !valid_profile {
            return Err(ConfigError::invalid(
                "video profile",
                format!("{} is not a profile of {:?}", self.profile, self.codec),
            ));
        }

        if self.bitrate == 0 {
            return Err(ConfigError::invalid("video bitrate", "must be positive"));
        }

        Ok(())
    }
}

impl Default for VideoParameters {
    fn default() -> Self {
        VideoParameters::new()
    }
}

fn to_u32(key: &str, value: i64) -> Result<u32, ConfigError> {
    u32::try_from(value).map_err(|_| ConfigError::InvalidValue {
        field: "parameter",
        reason: format!("{} = {} is out of range", key, value),
    })
}
