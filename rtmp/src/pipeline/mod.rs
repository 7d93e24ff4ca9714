//! The bounded frame hand-offs between media threads and the network.
//!
//! The publisher's capture thread pushes encoded frames into a [`SendQueue`] that the network
//! task drains; the player's network task feeds a [`PlaybackBuffer`] that releases frames to the
//! renderer on the playback clock.  Both are bounded and their overflow behaviour is fixed:
//!
//! * `SendQueue`: drop inter frames (rest of the GOP), then drop oldest audio, then block the
//!   producer for a bounded time.  Key frames and sequence headers are never dropped.
//! * `PlaybackBuffer`: skip ahead to the newest key frame once more than `max_buffer_time_ms`
//!   is buffered, and evict the oldest frames if the frame count bound is hit.

mod key_frames;
mod playback_buffer;
mod send_queue;

pub use self::key_frames::KeyFrameScheduler;
pub use self::playback_buffer::{BufferEvent, BufferState, PlaybackBuffer, PlaybackBufferConfig};
pub use self::send_queue::{PushOutcome, SendQueue, SendQueueConfig, SendQueueStats};
