use super::ConfigError;
use crate::engine::ReconnectPolicy;
use crate::pipeline::PlaybackBufferConfig;
use crate::sessions::ClientSessionConfig;
use crate::transport::{Endpoint, NetworkOptions};
use std::time::Duration;

/// How decoded pictures are fitted into the view.  Only the renderer looks at this.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleMode {
    ScaleToFill = 0,
    ScaleAspectFit = 1,
    ScaleAspectFill = 2,
}

impl ScaleMode {
    pub fn from_i32(value: i32) -> Option<ScaleMode> {
        match value {
            0 => Some(ScaleMode::ScaleToFill),
            1 => Some(ScaleMode::ScaleAspectFit),
            2 => Some(ScaleMode::ScaleAspectFill),
            _ => None,
        }
    }

    pub fn from_name(name: &str) -> Option<ScaleMode> {
        match name {
            "ScaleToFill" => Some(ScaleMode::ScaleToFill),
            "ScaleAspectFit" => Some(ScaleMode::ScaleAspectFit),
            "ScaleAspectFill" => Some(ScaleMode::ScaleAspectFill),
            _ => None,
        }
    }
}

/// The player's property bag.  Fields may be changed freely until `start()`, where they are
/// validated into a [`PlayerConfig`].
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerSettings {
    pub url: String,
    pub crypto_key: String,
    pub http_referer: String,
    pub http_user_agent: String,

    /// Minimum buffered media before playback starts, in milliseconds
    pub buffer_time_ms: i64,

    /// Buffered media beyond which playback skips ahead, in milliseconds
    pub max_buffer_time_ms: i64,

    /// Network read timeout, in milliseconds
    pub timeout_ms: i64,

    pub scale_mode: i32,
    pub autoplay: bool,
    pub hw_accel_enable: bool,
    pub play_in_background: bool,
    pub volume: f32,
}

impl PlayerSettings {
    pub fn new() -> PlayerSettings {
        PlayerSettings {
            url: String::new(),
            crypto_key: String::new(),
            http_referer: String::new(),
            http_user_agent: String::new(),
            buffer_time_ms: 1_000,
            max_buffer_time_ms: 5_000,
            timeout_ms: 15_000,
            scale_mode: ScaleMode::ScaleAspectFit as i32,
            autoplay: true,
            hw_accel_enable: true,
            play_in_background: false,
            volume: 1.0,
        }
    }

    pub fn validate(&self) -> Result<PlayerConfig, ConfigError> {
        let endpoint = parse_endpoint(&self.url)?;

        let buffer_time_ms = non_negative_u32("bufferTime", self.buffer_time_ms)?;
        let max_buffer_time_ms = non_negative_u32("maxBufferTime", self.max_buffer_time_ms)?;
        if max_buffer_time_ms < buffer_time_ms {
            return Err(ConfigError::invalid(
                "maxBufferTime",
                format!("{} is below bufferTime {}", max_buffer_time_ms, buffer_time_ms),
            ));
        }

        let timeout_ms = non_negative_u32("timeout", self.timeout_ms)?;
        if timeout_ms == 0 {
            return Err(ConfigError::invalid("timeout", "must be positive"));
        }

        let scale_mode = ScaleMode::from_i32(self.scale_mode).ok_or_else(|| {
            ConfigError::invalid("scaleMode", format!("unknown scale mode {}", self.scale_mode))
        })?;

        let volume = validate_volume(self.volume)?;

        let mut session = ClientSessionConfig::new();
        session.tc_url = Some(endpoint.tc_url());
        session.playback_buffer_length_ms = buffer_time_ms;
        if !self.http_referer.is_empty() {
            session.page_url = Some(self.http_referer.clone());
        }

        if !self.http_user_agent.is_empty() {
            session.flash_version = self.http_user_agent.clone();
        }

        let mut network = NetworkOptions::new();
        network.read_timeout = Duration::from_millis(u64::from(timeout_ms));

        Ok(PlayerConfig {
            endpoint,
            crypto_key: self.crypto_key.clone(),
            session,
            network,
            buffer: PlaybackBufferConfig {
                buffer_time_ms,
                max_buffer_time_ms,
                autoplay: self.autoplay,
                ..PlaybackBufferConfig::new()
            },
            reconnect: ReconnectPolicy::new(),
            scale_mode,
            volume,
            hw_accel_enable: self.hw_accel_enable,
            play_in_background: self.play_in_background,
        })
    }
}

impl Default for PlayerSettings {
    fn default() -> Self {
        PlayerSettings::new()
    }
}

/// Immutable snapshot of validated player settings, captured at `start()`
#[derive(Debug, Clone)]
pub struct PlayerConfig {
    pub endpoint: Endpoint,
    pub crypto_key: String,
    pub session: ClientSessionConfig,
    pub network: NetworkOptions,
    pub buffer: PlaybackBufferConfig,
    pub reconnect: ReconnectPolicy,
    pub scale_mode: ScaleMode,
    pub volume: f32,
    pub hw_accel_enable: bool,
    pub play_in_background: bool,
}

pub(super) fn parse_endpoint(url: &str) -> Result<Endpoint, ConfigError> {
    let url = url.trim();
    if url.is_empty() {
        return Err(ConfigError::MissingUrl);
    }

    Endpoint::parse(url).map_err(|error| ConfigError::InvalidUrl {
        url: url.to_string(),
        reason: error.to_string(),
    })
}

/// Volume is a gain between silent (0.0) and full (1.0)
pub fn validate_volume(volume: f32) -> Result<f32, ConfigError> {
    if !(0.0..=1.0).contains(&volume) {
        return Err(ConfigError::invalid("volume", format!("{} is outside 0.0 to 1.0", volume)));
    }

    Ok(volume)
}

fn non_negative_u32(field: &'static str, value: i64) -> Result<u32, ConfigError> {
    u32::try_from(value).map_err(|_| ConfigError::invalid(field, format!("{} is out of range", value)))
}
