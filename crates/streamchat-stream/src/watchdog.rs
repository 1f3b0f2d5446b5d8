//! Completion watchdog.
//!
//! The wire protocol never says when an answer is finished, so completion is
//! inferred: while armed, the watchdog ticks every poll interval and fires once the
//! tracked stream has been silent for longer than the idle threshold.

use std::time::Duration;

use tokio::time::Instant;

use crate::state::StreamPhase;

/// Shortest poll interval; a zero interval would make [`Watchdog::tick`] spin.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Polling timer that infers stream completion from inactivity.
#[derive(Debug)]
pub struct Watchdog {
    poll_interval: Duration,
    idle_threshold: Duration,
    next_tick: Option<Instant>,
}

impl Watchdog {
    /// Create a disarmed watchdog. A zero poll interval is raised to
    /// [`MIN_POLL_INTERVAL`].
    #[must_use]
    pub const fn new(poll_interval: Duration, idle_threshold: Duration) -> Self {
        Self {
            poll_interval: if poll_interval.is_zero() {
                MIN_POLL_INTERVAL
            } else {
                poll_interval
            },
            idle_threshold,
            next_tick: None,
        }
    }

    /// Start ticking every poll interval, the first tick one interval from `now`.
    ///
    /// Re-arming restarts the schedule.
    pub fn arm(&mut self, now: Instant) {
        self.next_tick = Some(now + self.poll_interval);
    }

    /// Stop ticking.
    pub fn disarm(&mut self) {
        self.next_tick = None;
    }

    /// Returns `true` while armed.
    #[must_use]
    pub const fn is_armed(&self) -> bool {
        self.next_tick.is_some()
    }

    /// When the next tick is due.
    #[must_use]
    pub const fn next_tick(&self) -> Option<Instant> {
        self.next_tick
    }

    /// Wait for the next tick and return its time.
    ///
    /// Never resolves while disarmed. Cancel safe: dropping the future before it
    /// resolves leaves the schedule unchanged.
    pub async fn tick(&mut self) -> Instant {
        let Some(deadline) = self.next_tick else {
            return std::future::pending().await;
        };

        tokio::time::sleep_until(deadline).await;

        let now = Instant::now();
        let mut next = deadline + self.poll_interval;
        if next <= now {
            next = now + self.poll_interval;
        }
        self.next_tick = Some(next);
        now
    }

    /// Check for completion at `now`.
    ///
    /// Returns `true` exactly once per armed period, when `phase` is streaming and
    /// has been silent for longer than the idle threshold. Firing disarms the
    /// watchdog. When disarmed or when `phase` is idle this is a no-op.
    pub fn poll(&mut self, now: Instant, phase: &StreamPhase) -> bool {
        if !self.is_armed() {
            return false;
        }
        let Some(last_activity_at) = phase.last_activity_at() else {
            return false;
        };

        let silent_for = now.saturating_duration_since(last_activity_at);
        if silent_for > self.idle_threshold {
            tracing::debug!(silent_ms = silent_for.as_millis(), "Watchdog fired");
            self.disarm();
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::SinkId;

    fn watchdog() -> Watchdog {
        Watchdog::new(Duration::from_millis(500), Duration::from_millis(3000))
    }

    fn streaming(at: Instant) -> StreamPhase {
        StreamPhase::Streaming {
            sink: SinkId::new(1),
            last_activity_at: at,
        }
    }

    #[test]
    fn fires_once_after_threshold() {
        let start = Instant::now();
        let mut dog = watchdog();
        dog.arm(start);

        let phase = streaming(start);
        assert!(!dog.poll(start + Duration::from_millis(3000), &phase));
        assert!(dog.poll(start + Duration::from_millis(3001), &phase));
        assert!(!dog.is_armed());
        assert!(!dog.poll(start + Duration::from_millis(9000), &phase));
    }

    #[test]
    fn idle_phase_is_noop() {
        let start = Instant::now();
        let mut dog = watchdog();
        dog.arm(start);

        assert!(!dog.poll(start + Duration::from_secs(60), &StreamPhase::Idle));
        assert!(dog.is_armed());
    }

    #[test]
    fn disarmed_never_fires() {
        let start = Instant::now();
        let mut dog = watchdog();
        assert!(!dog.poll(start + Duration::from_secs(60), &streaming(start)));
    }

    #[test]
    fn arm_schedules_first_tick() {
        let start = Instant::now();
        let mut dog = watchdog();
        dog.arm(start);
        assert_eq!(dog.next_tick(), Some(start + Duration::from_millis(500)));
        dog.disarm();
        assert_eq!(dog.next_tick(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_every_poll_interval() {
        let start = Instant::now();
        let mut dog = watchdog();
        dog.arm(start);

        let first = dog.tick().await;
        let second = dog.tick().await;

        assert_eq!(first - start, Duration::from_millis(500));
        assert_eq!(second - start, Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn zero_poll_interval_still_advances_time() {
        let start = Instant::now();
        let mut dog = Watchdog::new(Duration::ZERO, Duration::from_millis(3000));
        dog.arm(start);

        for _ in 0..10 {
            dog.tick().await;
        }
        assert!(Instant::now() - start >= MIN_POLL_INTERVAL * 10);
    }

    #[tokio::test(start_paused = true)]
    async fn disarmed_tick_never_resolves() {
        let mut dog = watchdog();
        let result = tokio::time::timeout(Duration::from_secs(10), dog.tick()).await;
        assert!(result.is_err());
    }
}
