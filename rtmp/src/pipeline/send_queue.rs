use crate::media::{MediaFrame, MediaKind};
use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct SendQueueConfig {
    /// Maximum number of frames held
    pub capacity: usize,

    /// How long a frame that may not be dropped waits for room before the push gives up
    pub block_timeout: Duration,
}

impl SendQueueConfig {
    pub fn new() -> SendQueueConfig {
        SendQueueConfig {
            capacity: 256,
            block_timeout: Duration::from_millis(500),
        }
    }
}

impl Default for SendQueueConfig {
    fn default() -> Self {
        SendQueueConfig::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Queued,

    /// Queued after older frames were evicted to make room
    QueuedAfterEviction { evicted: usize },

    /// The frame was an inter frame and was dropped instead of queued
    Dropped,

    /// The queue stayed full of frames that may not be dropped for the whole block timeout
    TimedOut,

    Closed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SendQueueStats {
    pub video_queued: u64,
    pub video_dropped: u64,
    pub audio_queued: u64,
    pub audio_dropped: u64,
}

impl SendQueueStats {
    pub fn audio_drop_ratio(&self) -> f64 {
        let total = self.audio_queued + self.audio_dropped;
        if total == 0 {
            return 0.0;
        }

        self.audio_dropped as f64 / total as f64
    }
}

/// Bounded hand-off of encoded frames from the capture thread to the network task.
///
/// When full, the queue makes room in this order:
///
/// 1. An incoming inter frame is dropped, along with every following inter frame until the
///    next key frame, since they could not be decoded anyway.
/// 2. The oldest group of queued inter frames is evicted (up to the next queued key frame).
/// 3. The oldest queued audio frame is evicted.
/// 4. Otherwise the producer blocks for at most `block_timeout`, after which an incoming key
///    frame replaces the oldest queued group of pictures and anything else is lost.
///
/// Inter frames are never queued without the key frame they depend on.
pub struct SendQueue {
    config: SendQueueConfig,
    state: Mutex<QueueState>,
    space_available: Condvar,
    frame_available: Notify,
}

struct QueueState {
    frames: VecDeque<MediaFrame>,
    closed: bool,
    skipping_until_key_frame: bool,
    stats: SendQueueStats,
}

impl SendQueue {
    pub fn new(config: SendQueueConfig) -> SendQueue {
        SendQueue {
            state: Mutex::new(QueueState {
                frames: VecDeque::with_capacity(config.capacity),
                closed: false,
                skipping_until_key_frame: false,
                stats: SendQueueStats::default(),
            }),
            space_available: Condvar::new(),
            frame_available: Notify::new(),
            config,
        }
    }

    /// Queues a frame from a synchronous producer.  Never blocks longer than `block_timeout`.
    pub fn push(&self, frame: MediaFrame) -> PushOutcome {
        let mut state = self.lock();
        if state.closed {
            return PushOutcome::Closed;
        }

        if is_droppable(&frame) && state.skipping_until_key_frame {
            state.stats.video_dropped += 1;
            return PushOutcome::Dropped;
        }

        if state.frames.len() < self.config.capacity {
            self.enqueue(&mut state, frame);
            return PushOutcome::Queued;
        }

        if is_droppable(&frame) {
            debug!(timestamp = frame.timestamp().value, "Send queue full, dropping inter frames until the next key frame");
            state.skipping_until_key_frame = true;
            state.stats.video_dropped += 1;
            return PushOutcome::Dropped;
        }

        let evicted = evict_inter_frames(&mut state);
        let evicted = if evicted > 0 { evicted } else { evict_oldest_audio(&mut state) };
        if evicted > 0 {
            self.enqueue(&mut state, frame);
            return PushOutcome::QueuedAfterEviction { evicted };
        }

        let deadline = Instant::now() + self.config.block_timeout;
        while state.frames.len() >= self.config.capacity && !state.closed {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return self.give_up(&mut state, frame);
            }

            state = self
                .space_available
                .wait_timeout(state, remaining)
                .map(|(guard, _)| guard)
                .unwrap_or_else(|e| e.into_inner().0);
        }

        if state.closed {
            return PushOutcome::Closed;
        }

        self.enqueue(&mut state, frame);
        PushOutcome::Queued
    }

    /// Waits for the next frame.  Returns `None` once the queue is closed and drained.
    pub async fn pop(&self) -> Option<MediaFrame> {
        loop {
            let notified = self.frame_available.notified();
            if let Some(frame) = self.try_pop() {
                return Some(frame);
            }

            if self.lock().closed {
                return None;
            }

            notified.await;
        }
    }

    pub fn try_pop(&self) -> Option<MediaFrame> {
        let frame = self.lock().frames.pop_front();
        if frame.is_some() {
            self.space_available.notify_one();
        }

        frame
    }

    /// Drops everything queued except sequence headers, and skips inter frames until the next
    /// key frame arrives.  Used after reconnecting, when queued inter frames reference pictures
    /// the server never saw.
    pub fn discard_until_key_frame(&self) -> usize {
        let mut state = self.lock();
        let before = state.frames.len();
        let mut dropped_video = 0;
        let mut dropped_audio = 0;
        state.frames.retain(|frame| {
            if frame.is_sequence_header() {
                return true;
            }

            match frame.kind() {
                MediaKind::Video => dropped_video += 1,
                MediaKind::Audio => dropped_audio += 1,
            }

            false
        });

        state.stats.video_dropped += dropped_video;
        state.stats.audio_dropped += dropped_audio;
        state.skipping_until_key_frame = true;
        let discarded = before - state.frames.len();
        drop(state);

        self.space_available.notify_all();
        discarded
    }

    /// Wakes every waiter.  Pushes fail from now on, pops drain what is left.
    pub fn close(&self) {
        self.lock().closed = true;
        self.space_available.notify_all();
        self.frame_available.notify_waiters();
        self.frame_available.notify_one();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn len(&self) -> usize {
        self.lock().frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> SendQueueStats {
        self.lock().stats
    }

    /// The queue stayed full for the whole block timeout.  A newer key frame supersedes the
    /// oldest queued group of pictures, anything else is lost.
    fn give_up(&self, state: &mut QueueState, frame: MediaFrame) -> PushOutcome {
        if is_picture_key_frame(&frame) {
            let evicted = evict_oldest_group(state);
            if evicted > 0 {
                debug!(evicted, "Send queue stayed full, replacing the oldest group of pictures");
                self.enqueue(state, frame);
                return PushOutcome::QueuedAfterEviction { evicted };
            }
        }

        warn!(kind = ?frame.kind(), "Send queue stayed full, giving up on frame");
        match frame.kind() {
            MediaKind::Video => {
                state.stats.video_dropped += 1;
                state.skipping_until_key_frame = true;
            }

            MediaKind::Audio => state.stats.audio_dropped += 1,
        }

        PushOutcome::TimedOut
    }

    fn enqueue(&self, state: &mut QueueState, frame: MediaFrame) {
        if is_picture_key_frame(&frame) {
            state.skipping_until_key_frame = false;
        }

        match frame.kind() {
            MediaKind::Video => state.stats.video_queued += 1,
            MediaKind::Audio => state.stats.audio_queued += 1,
        }

        state.frames.push_back(frame);
        self.frame_available.notify_one();
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn is_droppable(frame: &MediaFrame) -> bool {
    frame.is_droppable_video()
}

fn is_picture_key_frame(frame: &MediaFrame) -> bool {
    frame.kind() == MediaKind::Video && frame.is_key_frame() && !frame.is_sequence_header()
}

/// Evicts the oldest queued key frame together with the inter frames that depend on it
fn evict_oldest_group(state: &mut QueueState) -> usize {
    let start = match state.frames.iter().position(is_picture_key_frame) {
        Some(index) => index,
        None => return 0,
    };

    let mut evicted = 0;
    let mut index = 0;
    let mut in_group = true;
    state.frames.retain(|frame| {
        let position = index;
        index += 1;
        if position < start || !in_group {
            return true;
        }

        if position == start || is_droppable(frame) {
            evicted += 1;
            return false;
        }

        if is_picture_key_frame(frame) {
            in_group = false;
        }

        true
    });

    state.stats.video_queued -= evicted as u64;
    state.stats.video_dropped += evicted as u64;
    evicted
}

/// Evicts the oldest queued inter frame and the rest of its group of pictures
fn evict_inter_frames(state: &mut QueueState) -> usize {
    let start = match state.frames.iter().position(is_droppable) {
        Some(index) => index,
        None => return 0,
    };

    let mut evicted = 0;
    let mut in_group = true;
    let mut index = 0;
    state.frames.retain(|frame| {
        let position = index;
        index += 1;
        if position < start || !in_group {
            return true;
        }

        if is_picture_key_frame(frame) {
            in_group = false;
            return true;
        }

        if is_droppable(frame) {
            evicted += 1;
            return false;
        }

        true
    });

    // The group continues past the end of the queue
    if in_group {
        state.skipping_until_key_frame = true;
    }

    state.stats.video_queued -= evicted as u64;
    state.stats.video_dropped += evicted as u64;
    evicted
}

fn evict_oldest_audio(state: &mut QueueState) -> usize {
    let index = state
        .frames
        .iter()
        .position(|frame| frame.kind() == MediaKind::Audio && !frame.is_sequence_header());

    match index {
        Some(index) => {
            state.frames.remove(index);
            state.stats.audio_queued -= 1;
            state.stats.audio_dropped += 1;
            1
        }

        None => 0,
    }
}
