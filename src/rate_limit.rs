use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{Instant, sleep};
use tracing::debug;

use crate::metrics::RATE_LIMIT_WAITS;

// Admission instants inside the current rolling window
#[derive(Debug)]
pub struct RateWindow {
    max_calls: usize,
    period: Duration,
    admitted: VecDeque<Instant>,
}

impl RateWindow {
    pub fn new(max_calls: u32, period: Duration) -> Self {
        Self {
            max_calls: max_calls.max(1) as usize,
            period,
            admitted: VecDeque::new(),
        }
    }

    /// Admit a call at `now`, or report how long until a slot frees up.
    pub fn try_admit(&mut self, now: Instant) -> Result<(), Duration> {
        // drop instants that left the window
        while let Some(&oldest) = self.admitted.front() {
            if now.saturating_duration_since(oldest) >= self.period {
                self.admitted.pop_front();
            } else {
                break;
            }
        }

        if self.admitted.len() < self.max_calls {
            self.admitted.push_back(now);
            return Ok(());
        }

        match self.admitted.front() {
            Some(&oldest) => Err((oldest + self.period).saturating_duration_since(now)),
            None => Ok(()),
        }
    }

    pub fn in_window(&self) -> usize {
        self.admitted.len()
    }
}

/// Sliding-window limiter shared by every request of one client.
///
/// Waiters hold the window lock while sleeping. Tokio's mutex is FIFO, so
/// callers are admitted in arrival order.
pub struct RateLimiter {
    window: Mutex<RateWindow>,
}

impl RateLimiter {
    pub fn new(max_calls: u32, period: Duration) -> Self {
        Self {
            window: Mutex::new(RateWindow::new(max_calls, period)),
        }
    }

    /// Wait until a call may proceed. Never fails.
    pub async fn admit(&self) {
        let mut window = self.window.lock().await;
        let mut waited = false;
        loop {
            match window.try_admit(Instant::now()) {
                Ok(()) => return,
                Err(wait) => {
                    if !waited {
                        RATE_LIMIT_WAITS.inc();
                        waited = true;
                    }
                    debug!(wait_ms = wait.as_millis() as u64, "rate limit reached, waiting");
                    sleep(wait).await;
                }
            }
        }
    }
}
