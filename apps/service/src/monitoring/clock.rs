//! Phase-locked interval clock.
//!
//! Wake instants are always `start + k * interval`. Work done between waits
//! never shifts the phase: an overrun skips the missed boundaries and wakes
//! at the next one still in the future.

use std::time::Duration;

use tokio::time::{Instant, sleep_until};

/// Smallest interval the clock accepts.
pub const MIN_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct IntervalClock {
    start: Instant,
    interval: Duration,
    next_wake: Instant,
}

impl IntervalClock {
    /// Clock anchored at the current instant.
    pub fn new(interval: Duration) -> Self {
        Self::starting_at(Instant::now(), interval)
    }

    /// Clock anchored at `start`; the first wake is `start + interval`.
    ///
    /// Interval is clamped to a minimum of 1 second.
    pub fn starting_at(start: Instant, interval: Duration) -> Self {
        let interval = if interval < MIN_INTERVAL {
            tracing::warn!(?interval, min_interval = ?MIN_INTERVAL, "Interval below minimum, clamping");
            MIN_INTERVAL
        } else {
            interval
        };

        tracing::debug!(?interval, "Interval clock started");
        Self { start, interval, next_wake: start + interval }
    }

    pub fn start(&self) -> Instant {
        self.start
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Boundary the next `wait` targets, unless the caller overruns it.
    pub fn next_wake(&self) -> Instant {
        self.next_wake
    }

    /// Pick the wake instant for a wait beginning at `now` and advance past it.
    ///
    /// The returned instant is strictly after `now` when at least one boundary
    /// was overrun, and equal to the pending boundary otherwise.
    pub fn schedule(&mut self, now: Instant) -> Instant {
        if self.next_wake <= now {
            let behind = now - self.next_wake;
            let skipped = behind.as_nanos() / self.interval.as_nanos();
            let jump = self.interval.as_nanos() * (skipped + 1);

            tracing::warn!(
                skipped = u64::try_from(skipped).unwrap_or(u64::MAX),
                behind = ?behind,
                "Tick overran the interval, skipping to the next boundary"
            );
            self.next_wake += Duration::from_nanos(u64::try_from(jump).unwrap_or(u64::MAX));
        }

        let wake_at = self.next_wake;
        self.next_wake += self.interval;
        wake_at
    }

    /// Sleep until the next aligned boundary. Returns the time slept.
    pub async fn wait(&mut self) -> Duration {
        let now = Instant::now();
        let wake_at = self.schedule(now);
        let remaining = wake_at.saturating_duration_since(now);

        sleep_until(wake_at).await;

        let woke = Instant::now();
        let since_start = woke.duration_since(self.start());
        let gap = Duration::from_nanos(
            u64::try_from(since_start.as_nanos() % self.interval.as_nanos()).unwrap_or(0),
        );
        tracing::debug!(?since_start, ?gap, "Interval clock woke");

        remaining
    }
}
