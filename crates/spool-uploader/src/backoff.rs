// ABOUTME: Fixed-window backoff armed by a failed delivery.
// ABOUTME: One timer covers every destination; it expires on its own or clears on the next success.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::Instant;

/// Tracks the most recent delivery failure and whether its window is still open.
#[derive(Debug, Clone)]
pub struct Backoff {
    window: Duration,
    last_error: Option<Instant>,
    last_error_at: Option<DateTime<Utc>>,
}

impl Backoff {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_error: None,
            last_error_at: None,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Arm the window starting now.
    pub fn record_failure(&mut self) {
        self.last_error = Some(Instant::now());
        self.last_error_at = Some(Utc::now());
    }

    /// Disarm the window after a confirmed delivery.
    pub fn clear(&mut self) {
        self.last_error = None;
    }

    /// True while a failure happened less than `window` ago.
    pub fn is_active(&self) -> bool {
        self.remaining().is_some()
    }

    /// Time left until deliveries may be attempted again.
    pub fn remaining(&self) -> Option<Duration> {
        let elapsed = self.last_error?.elapsed();
        self.window.checked_sub(elapsed).filter(|left| !left.is_zero())
    }

    /// Wall-clock time of the last failure, kept even after the window closes.
    pub fn last_error_at(&self) -> Option<DateTime<Utc>> {
        self.last_error_at
    }
}
