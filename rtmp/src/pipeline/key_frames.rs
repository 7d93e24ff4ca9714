/// Decides when the encoder must be asked for a key frame so that no gap between key frames
/// exceeds the configured interval.
#[derive(Debug, Clone)]
pub struct KeyFrameScheduler {
    interval_ms: u32,
    frame_interval_ms: u32,
    last_key_frame: Option<u64>,
    requested: bool,
}

impl KeyFrameScheduler {
    pub fn new(interval_ms: u32, frame_interval_ms: u32) -> KeyFrameScheduler {
        KeyFrameScheduler {
            interval_ms,
            frame_interval_ms,
            last_key_frame: None,
            requested: false,
        }
    }

    /// Called with each encoded video frame.  Returns true when the encoder should be asked
    /// to make the next frame a key frame.
    pub fn observe(&mut self, timestamp_ms: u64, key_frame: bool) -> bool {
        if key_frame {
            self.last_key_frame = Some(timestamp_ms);
            self.requested = false;
            return false;
        }

        let last = match self.last_key_frame {
            Some(last) => last,

            // Nothing decodable has been sent yet
            None => return !std::mem::replace(&mut self.requested, true),
        };

        // A request only affects the next frame, so the one after it is the first that would
        // be late
        let frame_after_next = timestamp_ms + 2 * u64::from(self.frame_interval_ms);
        if !self.requested && frame_after_next.saturating_sub(last) > u64::from(self.interval_ms) {
            self.requested = true;
            return true;
        }

        false
    }

    /// Forces a request on the next frame, e.g. after a reconnect
    pub fn reset(&mut self) {
        self.last_key_frame = None;
        self.requested = false;
    }
}
