//! Wall-clock source for schedule computations.

use hamqtt_domain::time::{self, Timestamp};

/// Source of "now" for the trigger registry.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> Timestamp;
}

/// The system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        time::now()
    }
}

/// A wall clock that advances with tokio's monotonic clock.
///
/// Reports `origin` at construction and moves forward exactly as
/// `tokio::time::Instant` does, so with a paused runtime
/// (`#[tokio::test(start_paused = true)]`) schedules can be driven through
/// hours of simulated time instantly.
#[derive(Debug, Clone, Copy)]
pub struct TokioClock {
    origin: Timestamp,
    started: tokio::time::Instant,
}

impl TokioClock {
    #[must_use]
    pub fn starting_at(origin: Timestamp) -> Self {
        Self {
            origin,
            started: tokio::time::Instant::now(),
        }
    }
}

impl Clock for TokioClock {
    fn now(&self) -> Timestamp {
        let elapsed = chrono::Duration::from_std(self.started.elapsed())
            .unwrap_or_else(|_| chrono::Duration::zero());
        self.origin + elapsed
    }
}
