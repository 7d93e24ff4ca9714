use crate::media::MediaKind;
use crate::time::RtmpTimestamp;
use std::collections::HashMap;
use tracing::warn;

/// Keeps media timestamps non-decreasing per message stream and media kind.
///
/// A frame that would move time backwards is moved forward to the last timestamp seen instead,
/// so decoders and peers never observe a regression.
pub struct TimestampGuard {
    direction: &'static str,
    last_seen: HashMap<(u32, MediaKind), RtmpTimestamp>,
    corrected: u64,
}

impl TimestampGuard {
    pub fn new(direction: &'static str) -> TimestampGuard {
        TimestampGuard {
            direction,
            last_seen: HashMap::new(),
            corrected: 0,
        }
    }

    /// Returns the timestamp the frame should carry
    pub fn admit(&mut self, stream_id: u32, kind: MediaKind, timestamp: RtmpTimestamp) -> RtmpTimestamp {
        let last = self.last_seen.entry((stream_id, kind)).or_insert(timestamp);
        if timestamp < *last {
            self.corrected += 1;
            warn!(
                direction = self.direction,
                stream_id,
                ?kind,
                timestamp = timestamp.value,
                previous = last.value,
                "Media timestamp went backwards, holding it at the previous value"
            );

            return *last;
        }

        *last = timestamp;
        timestamp
    }

    /// Forgets a stream, e.g. after it was deleted and a new one created
    pub fn reset(&mut self, stream_id: u32) {
        self.last_seen.retain(|(id, _), _| *id != stream_id);
    }

    /// Number of frames whose timestamp had to be corrected
    pub fn corrected_count(&self) -> u64 {
        self.corrected
    }
}
