//! A wall clock driven by the tokio clock.

use chrono::{DateTime, TimeZone, Utc};
use satrig_remote::Clock;
use tokio::time::Instant;

/// Wall-clock time that advances with `tokio::time`.
///
/// Under `#[tokio::test(start_paused = true)]` it only moves when the test
/// sleeps or calls `tokio::time::advance`, so cron-window waits finish
/// instantly and deterministically.
#[derive(Debug, Clone, Copy)]
pub struct MockClock {
    epoch: DateTime<Utc>,
    started: Instant,
}

impl MockClock {
    /// A clock reading `epoch` now.
    pub fn starting_at(epoch: DateTime<Utc>) -> Self {
        Self {
            epoch,
            started: Instant::now(),
        }
    }

    /// A clock starting at 2026-01-05 10:00:00 UTC, a Monday.
    pub fn fixed() -> Self {
        let epoch = Utc
            .with_ymd_and_hms(2026, 1, 5, 10, 0, 0)
            .single()
            .unwrap_or_else(Utc::now);
        Self::starting_at(epoch)
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::fixed()
    }
}

impl Clock for MockClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = chrono::Duration::from_std(self.started.elapsed())
            .unwrap_or_else(|_| chrono::Duration::zero());
        self.epoch + elapsed
    }
}
