//! Per-stream bandwidth estimation.
//!
//! Playlist BANDWIDTH attributes need the peak segment rate;
//! AVERAGE-BANDWIDTH wants a rate over recent history. The estimator keeps a
//! sliding window of segment-sized blocks so a long-running live job tracks
//! the current encode rather than its whole history.

use std::collections::VecDeque;

use tracing::warn;

/// How many target durations of history the sliding window keeps.
const WINDOW_TARGET_DURATIONS: f64 = 10.0;

#[derive(Debug, Clone, Copy)]
struct Block {
    bits: u64,
    duration: f64,
}

/// Sliding-window bitrate estimator fed by segment sizes.
#[derive(Debug)]
pub struct BandwidthEstimator {
    window: VecDeque<Block>,
    window_duration: f64,
    total_bits: u64,
    total_duration: f64,
    max_bitrate: u64,
}

impl BandwidthEstimator {
    /// Create an estimator; the window covers roughly ten target durations.
    pub fn new(target_segment_duration: f64) -> Self {
        Self {
            window: VecDeque::new(),
            window_duration: (target_segment_duration * WINDOW_TARGET_DURATIONS).max(1.0),
            total_bits: 0,
            total_duration: 0.0,
            max_bitrate: 0,
        }
    }

    /// Account one block of `size` bytes spanning `duration` seconds.
    pub fn add_block(&mut self, size: u64, duration: f64) {
        if duration <= 0.0 {
            warn!(size, duration, "ignoring block with non-positive duration");
            return;
        }

        let bits = size * 8;
        let bitrate = (bits as f64 / duration).round() as u64;
        self.max_bitrate = self.max_bitrate.max(bitrate);

        self.window.push_back(Block { bits, duration });
        self.total_bits += bits;
        self.total_duration += duration;

        while let Some(front) = self.window.front() {
            if self.total_duration - front.duration < self.window_duration {
                break;
            }
            self.total_bits -= front.bits;
            self.total_duration -= front.duration;
            self.window.pop_front();
        }
    }

    /// Peak per-block bitrate in bits per second, over the whole stream.
    pub fn max(&self) -> u64 {
        self.max_bitrate
    }

    /// Average bitrate over the window, in bits per second.
    pub fn estimate(&self) -> u64 {
        if self.total_duration <= 0.0 {
            return 0;
        }
        (self.total_bits as f64 / self.total_duration).round() as u64
    }
}
