//! Wrapping 32 bit stream timestamps.
//!
//! RTMP carries every timestamp as a millisecond count in an unsigned 32 bit field, so a session
//! that runs for longer than ~49.7 days wraps around to zero.  Two timestamps are considered
//! adjacent when they are within 2<sup>31</sup> - 1 milliseconds of each other, and ordering
//! is decided inside that window rather than by raw integer value.
//!
//! ```
//! use rtmp_stream::time::RtmpTimestamp;
//!
//! let before_wrap = RtmpTimestamp::new(4_000_000_000);
//! let after_wrap = before_wrap + 500_000_000;
//!
//! assert!(after_wrap > before_wrap);
//! assert_eq!(after_wrap.millis_since(before_wrap), 500_000_000);
//! assert!(RtmpTimestamp::new(50) < 60);
//! ```

use std::cmp::Ordering;
use std::ops::{Add, Sub};

const MAX_ADJACENT_DISTANCE: u32 = (1 << 31) - 1;

/// A point on the wrapping RTMP millisecond clock
#[derive(Eq, PartialEq, Debug, Copy, Clone, Default, Hash)]
pub struct RtmpTimestamp {
    pub value: u32,
}

impl RtmpTimestamp {
    pub fn new(value: u32) -> Self {
        RtmpTimestamp { value }
    }

    /// Builds a timestamp from a monotonic millisecond count, keeping only the low 32 bits the
    /// wire can carry.
    pub fn from_millis(millis: u64) -> Self {
        RtmpTimestamp {
            value: millis as u32,
        }
    }

    pub fn set(&mut self, value: u32) {
        self.value = value;
    }

    /// Forward distance from `earlier` to `self`, accounting for wrap around.  Returns zero if
    /// `earlier` is actually ahead of this timestamp.
    pub fn millis_since(self, earlier: RtmpTimestamp) -> u32 {
        match self.cmp(&earlier) {
            Ordering::Less => 0,
            _ => self.value.wrapping_sub(earlier.value),
        }
    }
}

impl Add for RtmpTimestamp {
    type Output = RtmpTimestamp;

    fn add(self, other: RtmpTimestamp) -> Self {
        self + other.value
    }
}

impl Add<u32> for RtmpTimestamp {
    type Output = RtmpTimestamp;

    fn add(self, other: u32) -> Self {
        RtmpTimestamp::new(self.value.wrapping_add(other))
    }
}

impl Sub for RtmpTimestamp {
    type Output = RtmpTimestamp;

    fn sub(self, other: RtmpTimestamp) -> Self {
        self - other.value
    }
}

impl Sub<u32> for RtmpTimestamp {
    type Output = RtmpTimestamp;

    fn sub(self, other: u32) -> Self {
        RtmpTimestamp::new(self.value.wrapping_sub(other))
    }
}

impl Ord for RtmpTimestamp {
    fn cmp(&self, other: &Self) -> Ordering {
        wrapping_cmp(self.value, other.value)
    }
}

impl PartialOrd for RtmpTimestamp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq<u32> for RtmpTimestamp {
    fn eq(&self, other: &u32) -> bool {
        self.value == *other
    }
}

impl PartialOrd<u32> for RtmpTimestamp {
    fn partial_cmp(&self, other: &u32) -> Option<Ordering> {
        Some(wrapping_cmp(self.value, *other))
    }
}

impl From<u32> for RtmpTimestamp {
    fn from(value: u32) -> Self {
        RtmpTimestamp::new(value)
    }
}

fn wrapping_cmp(left: u32, right: u32) -> Ordering {
    let distance = left.max(right) - left.min(right);
    if distance <= MAX_ADJACENT_DISTANCE {
        left.cmp(&right)
    } else {
        right.cmp(&left)
    }
}
