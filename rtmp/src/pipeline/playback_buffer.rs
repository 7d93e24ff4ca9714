use crate::media::{MediaFrame, MediaKind};
use crate::time::RtmpTimestamp;
use std::collections::VecDeque;
use tracing::{debug, warn};

/// How far the playback clock may run past the last released frame before an empty buffer
/// counts as stalled.  Covers streams arriving exactly on time with no buffer at all.
const STALL_GRACE_MS: u32 = 100;

#[derive(Debug, Clone)]
pub struct PlaybackBufferConfig {
    /// Media that must be buffered before playback starts or resumes after a stall
    pub buffer_time_ms: u32,

    /// Once more than this is buffered, playback jumps ahead to the newest key frame
    pub max_buffer_time_ms: u32,

    /// Hard bound on the number of buffered frames
    pub capacity: usize,

    /// Start rendering as soon as enough is buffered, instead of waiting for `play()`
    pub autoplay: bool,
}

impl PlaybackBufferConfig {
    pub fn new() -> PlaybackBufferConfig {
        PlaybackBufferConfig {
            buffer_time_ms: 1_000,
            max_buffer_time_ms: 5_000,
            capacity: 2_048,
            autoplay: true,
        }
    }
}

impl Default for PlaybackBufferConfig {
    fn default() -> Self {
        PlaybackBufferConfig::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferState {
    Buffering,

    /// Enough is buffered but autoplay is off, waiting for `play()`
    Ready,

    Playing,
    Paused,

    /// Ran dry mid playback and is re-buffering
    Stalled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferEvent {
    /// First playback after buffering (or after `clear()`)
    Started,

    /// Buffered enough without autoplay; nothing is rendered until `play()`
    Ready,

    /// The buffer ran dry while playing
    Stalled,

    /// Playback resumed after a stall
    Recovered { stalled_for_ms: u64 },

    /// Frames older than the newest key frame were skipped to stay within the latency bound
    CaughtUp { dropped: usize },
}

/// Maps media timestamps onto the caller's wall clock
#[derive(Debug, Clone, Copy)]
struct Clock {
    media_base: RtmpTimestamp,
    wall_base: u64,
}

impl Clock {
    fn position(&self, now_ms: u64) -> RtmpTimestamp {
        self.media_base + now_ms.saturating_sub(self.wall_base) as u32
    }
}

/// Jitter buffer in front of the decoder.
///
/// The buffer has no clock of its own.  Callers pass the current time (in milliseconds on any
/// monotonic scale) into every call, which keeps the buffering rules testable without sleeping.
/// Frames are released by `pop_due()` once their timestamp is reached on the playback clock.
pub struct PlaybackBuffer {
    config: PlaybackBufferConfig,
    frames: VecDeque<MediaFrame>,
    state: BufferState,
    clock: Option<Clock>,
    paused_at: Option<RtmpTimestamp>,
    stalled_since: Option<u64>,
    last_released: Option<RtmpTimestamp>,
    dropped_frames: u64,
}

impl PlaybackBuffer {
    pub fn new(config: PlaybackBufferConfig) -> PlaybackBuffer {
        PlaybackBuffer {
            config,
            frames: VecDeque::new(),
            state: BufferState::Buffering,
            clock: None,
            paused_at: None,
            stalled_since: None,
            last_released: None,
            dropped_frames: 0,
        }
    }

    pub fn state(&self) -> BufferState {
        self.state
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn dropped_frames(&self) -> u64 {
        self.dropped_frames
    }

    /// Milliseconds of media currently held, sequence headers excluded
    pub fn buffered_ms(&self) -> u32 {
        let first = self.frames.iter().find(|f| !f.is_sequence_header());
        let last = self.frames.iter().rev().find(|f| !f.is_sequence_header());
        match (first, last) {
            (Some(first), Some(last)) => last.timestamp().millis_since(first.timestamp()),
            _ => 0,
        }
    }

    pub fn push(&mut self, frame: MediaFrame, now_ms: u64) -> Option<BufferEvent> {
        self.frames.push_back(frame);

        let mut event = None;
        if self.frames.len() > self.config.capacity {
            let dropped = self.catch_up();
            self.enforce_capacity();
            if dropped > 0 {
                event = Some(BufferEvent::CaughtUp { dropped });
            }
        }

        if self.state == BufferState::Playing && self.buffered_ms() > self.config.max_buffer_time_ms {
            let dropped = self.catch_up();
            if dropped > 0 {
                event = Some(BufferEvent::CaughtUp { dropped });
            }
        }

        if event.is_some() && self.state == BufferState::Playing {
            self.rebase_clock(now_ms);
        }

        self.check_ready(now_ms).or(event)
    }

    /// Removes every frame whose time has come on the playback clock
    pub fn pop_due(&mut self, now_ms: u64) -> (Vec<MediaFrame>, Option<BufferEvent>) {
        let clock = match (self.state, self.clock) {
            (BufferState::Playing, Some(clock)) => clock,
            _ => return (Vec::new(), None),
        };

        let position = clock.position(now_ms);
        let mut due = Vec::new();
        while let Some(frame) = self.frames.front() {
            if frame.timestamp() > position {
                break;
            }

            if !frame.is_sequence_header() {
                self.last_released = Some(frame.timestamp());
            }

            due.extend(self.frames.pop_front());
        }

        let expected_by = self.last_released.unwrap_or(clock.media_base) + STALL_GRACE_MS;
        if self.frames.is_empty() && position > expected_by {
            debug!(position = position.value, "Playback buffer ran dry");
            self.state = BufferState::Stalled;
            self.clock = None;
            self.stalled_since = Some(now_ms);
            return (due, Some(BufferEvent::Stalled));
        }

        (due, None)
    }

    /// Starts playback held back by `autoplay = false`
    pub fn play(&mut self, now_ms: u64) -> Option<BufferEvent> {
        if self.state != BufferState::Ready {
            return None;
        }

        self.start_clock(now_ms);
        Some(BufferEvent::Started)
    }

    pub fn pause(&mut self, now_ms: u64) -> bool {
        match (self.state, self.clock) {
            (BufferState::Playing, Some(clock)) => {
                self.paused_at = Some(clock.position(now_ms));
                self.clock = None;
                self.state = BufferState::Paused;
                true
            }

            _ => false,
        }
    }

    pub fn resume(&mut self, now_ms: u64) -> bool {
        if self.state != BufferState::Paused {
            return false;
        }

        match self.paused_at.take() {
            Some(position) => {
                self.clock = Some(Clock {
                    media_base: position,
                    wall_base: now_ms,
                });

                self.state = BufferState::Playing;
            }

            None => self.state = BufferState::Buffering,
        }

        true
    }

    /// Forgets all buffered media, e.g. when the stream restarts after a reconnect.  Playback
    /// starts over with a fresh `Started` event.
    pub fn clear(&mut self) {
        self.frames.clear();
        self.state = BufferState::Buffering;
        self.clock = None;
        self.paused_at = None;
        self.stalled_since = None;
        self.last_released = None;
    }

    fn check_ready(&mut self, now_ms: u64) -> Option<BufferEvent> {
        if self.buffered_ms() < self.config.buffer_time_ms {
            return None;
        }

        match self.state {
            BufferState::Buffering if self.config.autoplay => {
                self.start_clock(now_ms);
                Some(BufferEvent::Started)
            }

            BufferState::Buffering => {
                self.state = BufferState::Ready;
                Some(BufferEvent::Ready)
            }

            BufferState::Stalled => {
                self.start_clock(now_ms);
                let stalled_for_ms = self
                    .stalled_since
                    .take()
                    .map(|since| now_ms.saturating_sub(since))
                    .unwrap_or_default();

                Some(BufferEvent::Recovered { stalled_for_ms })
            }

            _ => None,
        }
    }

    fn start_clock(&mut self, now_ms: u64) {
        self.state = BufferState::Playing;
        self.rebase_clock(now_ms);
    }

    fn rebase_clock(&mut self, now_ms: u64) {
        let first = self
            .frames
            .iter()
            .find(|f| !f.is_sequence_header())
            .or_else(|| self.frames.front());

        self.clock = first.map(|frame| Clock {
            media_base: frame.timestamp(),
            wall_base: now_ms,
        });
    }

    /// Skips to the newest key frame, keeping sequence headers.  Audio only streams are trimmed
    /// back to `buffer_time_ms` instead.
    fn catch_up(&mut self) -> usize {
        let has_video = self.frames.iter().any(|f| f.kind() == MediaKind::Video);
        let key_frame = self
            .frames
            .iter()
            .rposition(|f| f.kind() == MediaKind::Video && f.is_key_frame() && !f.is_sequence_header());

        let cutoff = match (has_video, key_frame) {
            (true, Some(index)) => index,
            (true, None) => 0,
            (false, _) => {
                let newest = match self.frames.back() {
                    Some(frame) => frame.timestamp(),
                    None => return 0,
                };

                self.frames
                    .iter()
                    .position(|f| newest.millis_since(f.timestamp()) <= self.config.buffer_time_ms)
                    .unwrap_or(0)
            }
        };

        let mut index = 0;
        let mut dropped = 0;
        self.frames.retain(|frame| {
            let keep = index >= cutoff || frame.is_sequence_header();
            index += 1;
            if !keep {
                dropped += 1;
            }

            keep
        });

        if dropped > 0 {
            debug!(dropped, "Playback buffer skipped ahead to stay within the latency bound");
        }

        self.dropped_frames += dropped as u64;
        dropped
    }

    fn enforce_capacity(&mut self) {
        while self.frames.len() > self.config.capacity {
            let index = self.frames.iter().position(|f| !f.is_sequence_header());
            match index {
                Some(index) => {
                    self.frames.remove(index);
                    self.dropped_frames += 1;
                }

                None => break,
            }
        }

        if self.frames.len() >= self.config.capacity {
            warn!(capacity = self.config.capacity, "Playback buffer is at capacity");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::{AudioCodec, VideoCodec};
    use bytes::Bytes;

    fn video(timestamp: u32, key_frame: bool) -> MediaFrame {
        MediaFrame::video(VideoCodec::Avc, RtmpTimestamp::new(timestamp), 0, key_frame, Bytes::new())
    }

    fn audio(timestamp: u32) -> MediaFrame {
        MediaFrame::audio(AudioCodec::Aac, RtmpTimestamp::new(timestamp), Bytes::new())
    }

    fn config(buffer_time_ms: u32) -> PlaybackBufferConfig {
        PlaybackBufferConfig {
            buffer_time_ms,
            max_buffer_time_ms: 10_000,
            capacity: 2_048,
            autoplay: true,
        }
    }

    #[test]
    fn playback_waits_for_buffer_time() {
        let mut buffer = PlaybackBuffer::new(config(500));

        for index in 0..15 {
            assert_eq!(buffer.push(video(index * 33, index == 0), 0), None);
        }

        assert_eq!(buffer.state(), BufferState::Buffering);
        assert_eq!(buffer.pop_due(1_000).0.len(), 0);

        assert_eq!(buffer.push(video(528, false), 0), Some(BufferEvent::Started));
        assert_eq!(buffer.state(), BufferState::Playing);
    }

    #[test]
    fn frames_are_released_on_the_playback_clock() {
        let mut buffer = PlaybackBuffer::new(config(100));
        for index in 0..10 {
            buffer.push(video(1_000 + index * 33, index == 0), 50);
        }

        let (due, _) = buffer.pop_due(50);
        assert_eq!(due.len(), 1, "Only the first frame is due right away");

        let (due, _) = buffer.pop_due(50 + 66);
        assert_eq!(due.len(), 2);
        assert_eq!(due[1].timestamp().value, 1_066);
    }

    #[test]
    fn autoplay_off_waits_for_play() {
        let mut buffer = PlaybackBuffer::new(PlaybackBufferConfig {
            autoplay: false,
            ..config(100)
        });

        buffer.push(video(0, true), 0);
        assert_eq!(buffer.push(video(100, false), 0), Some(BufferEvent::Ready));
        assert_eq!(buffer.pop_due(500).0.len(), 0);

        assert_eq!(buffer.play(500), Some(BufferEvent::Started));
        assert_eq!(buffer.pop_due(500).0.len(), 1);
    }

    #[test]
    fn pause_holds_the_clock() {
        let mut buffer = PlaybackBuffer::new(config(100));
        for index in 0..30 {
            buffer.push(video(index * 33, index == 0), 0);
        }

        buffer.pop_due(0);
        assert!(buffer.pause(10));
        assert_eq!(buffer.pop_due(5_000).0.len(), 0);

        assert!(buffer.resume(5_000));
        let (due, _) = buffer.pop_due(5_033);
        assert_eq!(due.len(), 1, "Clock should continue from where it was paused");
    }

    #[test]
    fn excess_latency_skips_to_newest_key_frame() {
        let mut buffer = PlaybackBuffer::new(PlaybackBufferConfig {
            buffer_time_ms: 100,
            max_buffer_time_ms: 1_000,
            capacity: 2_048,
            autoplay: true,
        });

        let header = MediaFrame::video_sequence_header(VideoCodec::Avc, RtmpTimestamp::new(0), Bytes::new());
        buffer.push(header.clone(), 0);

        let mut caught_up = None;
        for index in 0..40_u32 {
            if let Some(BufferEvent::CaughtUp { dropped }) = buffer.push(video(index * 33, index % 30 == 0), 0) {
                caught_up = Some(dropped);
            }
        }

        assert_eq!(caught_up, Some(30), "Expected the first GOP to be skipped");
        assert_eq!(buffer.dropped_frames(), 30);

        let (due, _) = buffer.pop_due(0);
        assert_eq!(due[0], header);
        assert_eq!(due[1], video(990, true));
    }

    #[test]
    fn capacity_is_never_exceeded() {
        let mut buffer = PlaybackBuffer::new(PlaybackBufferConfig {
            capacity: 16,
            autoplay: false,
            ..config(100_000)
        });

        for index in 0..100 {
            buffer.push(audio(index * 23), 0);
            assert!(buffer.len() <= 16);
        }
    }

    #[test]
    fn network_stall_pauses_and_recovers_once() {
        // 30fps stream with a one second network stall at t=5s: frames stamped 5000..6000
        // arrive together at 6000.
        let mut buffer = PlaybackBuffer::new(config(500));
        let mut events = Vec::new();
        let mut rendered = 0;

        let arrivals: Vec<(u64, MediaFrame)> = (0..300_u32)
            .map(|index| {
                let timestamp = index * 33;
                let arrival = if (5_000..6_000).contains(&timestamp) { 6_000 } else { timestamp as u64 };
                (arrival, video(timestamp, index % 30 == 0))
            })
            .collect();

        let mut pending = arrivals.into_iter().peekable();
        for now in (0..12_000_u64).step_by(10) {
            while let Some((arrival, _)) = pending.peek() {
                if *arrival > now {
                    break;
                }

                if let Some((_, frame)) = pending.next() {
                    events.extend(buffer.push(frame, now));
                }
            }

            let (due, event) = buffer.pop_due(now);
            rendered += due.len();
            events.extend(event);

            // The stream keeps going, so the tail never drains
            if pending.peek().is_none() {
                break;
            }
        }

        let stalls = events.iter().filter(|e| **e == BufferEvent::Stalled).count();
        let recoveries = events
            .iter()
            .filter(|e| matches!(e, BufferEvent::Recovered { .. }))
            .count();

        assert_eq!(events[0], BufferEvent::Started);
        assert_eq!(stalls, 1);
        assert_eq!(recoveries, 1);
        assert_eq!(rendered + buffer.len(), 300, "No frame should be lost to the stall");

        let stall_index = events.iter().position(|e| *e == BufferEvent::Stalled).unwrap();
        assert!(
            matches!(events[stall_index + 1], BufferEvent::Recovered { .. }),
            "Expected recovery right after the first stall, got {:?}",
            events
        );
    }

    #[test]
    fn on_time_stream_without_buffer_never_stalls() {
        let mut buffer = PlaybackBuffer::new(config(0));
        let mut events = Vec::new();
        let mut rendered = 0;

        for index in 0..5_u32 {
            let timestamp = index * 33;
            events.extend(buffer.push(video(timestamp, index == 0), timestamp as u64));

            // Render ticks land both on the frame and between frames
            for now in [timestamp as u64, timestamp as u64 + 20] {
                let (due, event) = buffer.pop_due(now);
                rendered += due.len();
                events.extend(event);
            }
        }

        assert_eq!(events, vec![BufferEvent::Started]);
        assert_eq!(rendered, 5);
        assert_eq!(buffer.state(), BufferState::Playing);
    }

    #[test]
    fn empty_buffer_stalls_once_the_next_frame_is_overdue() {
        let mut buffer = PlaybackBuffer::new(config(0));
        buffer.push(video(0, true), 0);
        assert_eq!(buffer.pop_due(0).0.len(), 1);

        assert_eq!(buffer.pop_due(90).1, None);
        assert_eq!(buffer.pop_due(150).1, Some(BufferEvent::Stalled));
        assert_eq!(buffer.state(), BufferState::Stalled);

        assert_eq!(
            buffer.push(video(33, false), 400),
            Some(BufferEvent::Recovered { stalled_for_ms: 250 })
        );
    }
}
