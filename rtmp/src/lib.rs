//! An RTMP streaming engine for players and publishers.
//!
//! The protocol layers (`handshake`, `chunk_io`, `messages`, `mux` and `sessions`) are sans-I/O:
//! they take bytes in and hand packets and events back, and never touch a socket.  The
//! `transport` module owns the sockets, `engine` runs sessions over them on a tokio runtime, and
//! `views` wraps it all in the `start()`/`stop()` surface hosts embed.
//!
//! Media devices (camera, microphone, encoders, decoders and renderers) come from the host
//! through the traits in `device`.

pub mod auth;
pub mod chunk_io;
pub mod config;
pub mod device;
pub mod engine;
pub mod errors;
pub mod events;
pub mod handshake;
pub mod media;
pub mod messages;
pub mod mux;
pub mod pipeline;
pub mod sessions;
pub mod time;
pub mod transport;
pub mod views;

pub use crate::errors::{StreamError, STATUS_OK};
pub use crate::events::{ChangeEvent, StreamEvent};
pub use crate::views::{PlayerView, PublisherView};

/// License identifier reported by [`license()`]
pub const RTMP_STREAM_LICENSE: &str = "MIT";

/// The license this library is distributed under
pub fn license() -> &'static str {
    RTMP_STREAM_LICENSE
}
