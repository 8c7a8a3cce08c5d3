use std::time::Duration;
use std::time::Instant;

/// Outcome of recording a serve failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrashVerdict {
    /// Serve again; `attempt` is the current restart count
    Restart { attempt: u32 },
    /// Too many rapid failures: stop retrying
    GiveUp { attempts: u32 },
}

/// Time-windowed restart counter for the serve loop.
///
/// Pure state machine: the caller supplies the clock reading, so transitions
/// can be exercised without sleeping.
#[derive(Debug, Clone)]
pub struct CrashLoopGuard {
    count: u32,
    last_crash: Instant,
    window: Duration,
    max_restarts: u32,
}

impl CrashLoopGuard {
    /// `started_at` acts as the previous crash for the first failure.
    pub fn new(
        started_at: Instant,
        window: Duration,
        max_restarts: u32,
    ) -> Self {
        Self {
            count: 0,
            last_crash: started_at,
            window,
            max_restarts,
        }
    }

    /// A failure more than `window` after the previous one restarts the
    /// count at 1; otherwise the count grows by one. Exceeding
    /// `max_restarts` gives up.
    pub fn record_crash(
        &mut self,
        now: Instant,
    ) -> CrashVerdict {
        let since_last_crash = now.saturating_duration_since(self.last_crash);
        self.last_crash = now;

        if since_last_crash > self.window {
            self.count = 1;
        } else {
            self.count += 1;
        }

        if self.count > self.max_restarts {
            CrashVerdict::GiveUp { attempts: self.count }
        } else {
            CrashVerdict::Restart { attempt: self.count }
        }
    }

    pub fn count(&self) -> u32 {
        self.count
    }
}
