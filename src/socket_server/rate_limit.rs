//! Fixed-window message rate limiting
//!
//! Each connection counts inbound data frames (text and binary) in a fixed
//! one-minute window. The window resets only once more than a full window has elapsed
//! since it started; it does not slide.

use std::time::{Duration, Instant};

/// Length of a rate-limit window
pub const RATE_WINDOW: Duration = Duration::from_secs(60);

/// Counter for one connection's current window
#[derive(Debug, Clone)]
pub struct FixedWindowLimiter {
    limit: u32,
    window: Duration,
    count: u32,
    window_start: Instant,
}

/// Result of counting one message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    /// Within the limit; carries the count so far in this window
    Allowed(u32),
    /// Over the limit; carries the count including this message
    Exceeded(u32),
}

impl FixedWindowLimiter {
    pub fn new(limit: u32) -> Self {
        Self::with_window(limit, RATE_WINDOW, Instant::now())
    }

    pub fn with_window(limit: u32, window: Duration, now: Instant) -> Self {
        Self {
            limit,
            window,
            count: 0,
            window_start: now,
        }
    }

    /// Count a message arriving at `now`
    pub fn record(&mut self, now: Instant) -> RateDecision {
        if now.saturating_duration_since(self.window_start) > self.window {
            self.count = 0;
            self.window_start = now;
        }

        self.count = self.count.saturating_add(1);
        if self.count > self.limit {
            RateDecision::Exceeded(self.count)
        } else {
            RateDecision::Allowed(self.count)
        }
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }
}
