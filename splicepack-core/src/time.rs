//! Time-scale handling.
//!
//! Media timestamps arrive in stream-specific clock units; playlist and cue
//! logic works in seconds. This module carries the conversions.

/// The MPEG 90 kHz presentation timestamp clock.
pub const MPEG_TIMESCALE: u32 = 90_000;

/// A per-stream clock rate, in ticks per second.
///
/// Common scales: 90000 for MPEG transport streams, 48000 for 48 kHz audio,
/// 1000 for millisecond text timings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeScale(u32);

impl TimeScale {
    /// The MPEG 90 kHz clock.
    pub const MPEG: Self = Self(MPEG_TIMESCALE);

    /// Create a time scale. Returns `None` for a zero rate, which cannot
    /// express any duration.
    pub fn new(ticks_per_second: u32) -> Option<Self> {
        if ticks_per_second == 0 {
            None
        } else {
            Some(Self(ticks_per_second))
        }
    }

    /// The raw tick rate.
    pub fn ticks_per_second(&self) -> u32 {
        self.0
    }

    /// Convert a tick count to seconds.
    ///
    /// The division happens in floating point so fractional seconds are
    /// preserved (a 90 kHz PTS of 918000 is 10.2 s, not 10 s).
    pub fn to_seconds(&self, value: i64) -> f64 {
        value as f64 / self.0 as f64
    }

    /// Convert seconds to a tick count, truncating toward zero.
    pub fn from_seconds(&self, seconds: f64) -> i64 {
        (seconds * self.0 as f64) as i64
    }
}

impl Default for TimeScale {
    fn default() -> Self {
        Self::MPEG
    }
}
