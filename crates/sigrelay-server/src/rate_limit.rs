use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Per-connection sliding-window rate limiter. Touched only by the owning
/// connection's read loop, so it needs no internal synchronization.
///
/// Holds the timestamps of the last (at most) `N` admitted frames in a ring
/// buffer. A frame is admitted iff the buffer isn't yet full, or its oldest
/// entry falls outside the window; admission evicts the oldest entry (if the
/// buffer was full) and pushes `now`.
pub struct SlidingWindowLimiter {
    window: Duration,
    capacity: usize,
    timestamps: VecDeque<Instant>,
}

impl SlidingWindowLimiter {
    pub fn new(capacity: usize, window: Duration) -> Self {
        Self {
            window,
            capacity,
            timestamps: VecDeque::with_capacity(capacity),
        }
    }

    /// Returns `true` if a frame arriving at `now` is admitted.
    pub fn try_admit(&mut self, now: Instant) -> bool {
        if self.timestamps.len() < self.capacity {
            self.timestamps.push_back(now);
            return true;
        }

        let oldest = *self.timestamps.front().expect("buffer is at capacity");
        if now.duration_since(oldest) >= self.window {
            self.timestamps.pop_front();
            self.timestamps.push_back(now);
            true
        } else {
            false
        }
    }
}
