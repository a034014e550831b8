//! Thread-safe queue of future sync points.
//!
//! Cue requests arrive at their signalled splice time and leave the queue
//! once the alignment handler consumes them: promoted to a video key-frame
//! instant in video-led mode, or taken at their requested time when no video
//! stream exists. A single mutex and condition variable coordinate producers
//! and the blocking consumer; cancellation is the only termination path, so
//! no timeouts are needed.

use std::collections::BTreeMap;

use parking_lot::{Condvar, Mutex};
use tracing::trace;

use crate::cue::CueEvent;

/// Total-ordered wrapper so cue times can key a BTreeMap.
#[derive(Debug, Clone, Copy, PartialEq)]
struct TimeKey(f64);

impl Eq for TimeKey {}

impl PartialOrd for TimeKey {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimeKey {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.total_cmp(&other.0)
    }
}

#[derive(Debug, Default)]
struct Inner {
    /// Pending cues keyed by their (requested) time.
    pending: BTreeMap<TimeKey, CueEvent>,
    cancelled: bool,
    thread_count: usize,
    waiting_thread_count: usize,
}

/// Shared priority structure of future cue events.
#[derive(Debug, Default)]
pub struct SyncPointQueue {
    inner: Mutex<Inner>,
    readable: Condvar,
}

impl SyncPointQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a consumer.
    pub fn add_thread(&self) {
        self.inner.lock().thread_count += 1;
    }

    /// Add a cue request, waking any blocked consumer.
    pub fn add(&self, cue: CueEvent) {
        let mut inner = self.inner.lock();
        trace!(time = cue.time_in_seconds, "sync point added");
        inner
            .pending
            .entry(TimeKey(cue.time_in_seconds))
            .or_insert(cue);
        self.readable.notify_all();
    }

    /// Take the earliest cue at or after `hint`, blocking until one arrives.
    /// Returns `None` when the queue is cancelled.
    pub fn get_next(&self, hint: f64) -> Option<CueEvent> {
        let mut inner = self.inner.lock();
        loop {
            if inner.cancelled {
                return None;
            }

            let key = inner
                .pending
                .range(TimeKey(hint)..)
                .next()
                .map(|(key, _)| *key);
            if let Some(key) = key {
                return inner.pending.remove(&key);
            }

            inner.waiting_thread_count += 1;
            debug_assert!(
                inner.thread_count == 0 || inner.waiting_thread_count <= inner.thread_count
            );
            self.readable.wait(&mut inner);
            inner.waiting_thread_count -= 1;
        }
    }

    /// Promote the earliest pending cue to `time` and take it.
    ///
    /// Succeeds when the head request's time is at or before `time` and no
    /// later request would be jumped over; a key frame past the next request
    /// means the GOP crosses two sync points, which cannot be cut cleanly.
    pub fn promote_at(&self, time: f64) -> Option<CueEvent> {
        let mut inner = self.inner.lock();

        let (&head_key, _) = inner.pending.iter().next()?;
        if head_key.0 > time {
            return None;
        }
        if let Some((&next_key, _)) = inner.pending.range(nudge_up(head_key)..).next() {
            if next_key.0 <= time {
                return None;
            }
        }

        let mut cue = inner.pending.remove(&head_key).unwrap();
        cue.time_in_seconds = time;
        trace!(
            requested = head_key.0,
            promoted = time,
            "sync point promoted"
        );
        Some(cue)
    }

    /// Time of the next pending cue strictly after `after`, or +infinity.
    pub fn get_hint(&self, after: f64) -> f64 {
        let inner = self.inner.lock();
        inner
            .pending
            .range(nudge_up(TimeKey(after))..)
            .next()
            .map(|(key, _)| key.0)
            .unwrap_or(f64::INFINITY)
    }

    /// Whether any cue is pending at or after `after`.
    pub fn has_more(&self, after: f64) -> bool {
        let inner = self.inner.lock();
        inner.pending.range(TimeKey(after)..).next().is_some()
    }

    /// Cancel the queue, waking all blocked consumers.
    pub fn cancel(&self) {
        let mut inner = self.inner.lock();
        inner.cancelled = true;
        self.readable.notify_all();
    }

    /// Whether the queue has been cancelled.
    pub fn cancelled(&self) -> bool {
        self.inner.lock().cancelled
    }
}

/// The smallest key strictly greater than `key`, for exclusive range starts.
fn nudge_up(key: TimeKey) -> TimeKey {
    TimeKey(next_after(key.0))
}

/// The next representable f64 above `value`.
fn next_after(value: f64) -> f64 {
    if value == f64::INFINITY {
        return value;
    }
    let bits = value.to_bits();
    let next = if value >= 0.0 { bits + 1 } else { bits - 1 };
    f64::from_bits(next)
}
