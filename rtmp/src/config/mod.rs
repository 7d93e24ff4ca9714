//! Caller facing settings and the validated snapshots sessions run with.
//!
//! [`PlayerSettings`] and [`PublisherSettings`] are plain property bags that can be edited in
//! any order.  Nothing is checked until a session starts, at which point the bag is validated
//! once into an immutable [`PlayerConfig`] / [`PublisherConfig`].  Invalid settings are
//! reported as a [`ConfigError`] and no session is created.

mod errors;
mod params;
mod player;
mod publisher;

pub use self::errors::ConfigError;
pub use self::params::*;
pub use self::player::{validate_volume, PlayerConfig, PlayerSettings, ScaleMode};
pub use self::publisher::{
    CameraDevice, CaptureConfig, EncoderConfig, PublisherConfig, PublisherSettings, VideoOrientation,
};
