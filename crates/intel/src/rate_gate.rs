//! Minimum-spacing gate for outbound intelligence requests.
//!
//! Unlike a token bucket this never waits: a call that arrives too early is
//! refused, and the caller skips its cycle.

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use log::{debug, warn};
use tokio::time::Instant;

/// Minimum time between two requests, across all endpoints.
pub const MIN_REQUEST_SPACING: Duration = Duration::from_millis(250);

#[derive(Debug)]
pub struct RateGate {
    spacing: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl RateGate {
    pub fn new() -> Self {
        Self::with_spacing(MIN_REQUEST_SPACING)
    }

    pub fn with_spacing(spacing: Duration) -> Self {
        Self {
            spacing,
            last_request: Mutex::new(None),
        }
    }

    /// Lock the clock, recovering from poison if necessary.
    fn lock_last(&self) -> MutexGuard<'_, Option<Instant>> {
        self.last_request.lock().unwrap_or_else(|poisoned| {
            warn!("Rate gate mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Pass the gate if enough time has elapsed since the last pass.
    ///
    /// The clock is advanced here, before the request goes out, so a slow
    /// round trip still blocks the next caller for the full spacing.
    pub fn try_pass(&self) -> bool {
        let now = Instant::now();
        let mut last = self.lock_last();

        if let Some(prev) = *last {
            let elapsed = now.duration_since(prev);
            if elapsed < self.spacing {
                debug!(
                    "Rate gate: refused, only {:?} since last request",
                    elapsed
                );
                return false;
            }
        }

        *last = Some(now);
        true
    }
}

impl Default for RateGate {
    fn default() -> Self {
        Self::new()
    }
}
