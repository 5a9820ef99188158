//! Reconnection scheduling
//!
//! Deterministic exponential backoff: the delay for attempt n (1-indexed) is
//! `base * 2^(n-1)`, saturating and uncapped in magnitude. The number of
//! attempts is capped; once the cap is reached, resuming requires an explicit
//! connect() call. No jitter is applied, so large fleets reconnecting after a
//! shared outage will thunder; acceptable for the current deployment sizes.

use std::time::Duration;

/// Tracks reconnection attempts and computes backoff delays
#[derive(Debug)]
pub(crate) struct ReconnectScheduler {
    base: Duration,
    max_attempts: u32,
    attempts: u32,
}

impl ReconnectScheduler {
    pub fn new(base: Duration, max_attempts: u32) -> Self {
        Self {
            base,
            max_attempts,
            attempts: 0,
        }
    }

    /// Claim the next attempt, if any remain under the cap.
    ///
    /// Returns the 1-indexed attempt number and the delay to wait before it.
    pub fn next_attempt(&mut self) -> Option<(u32, Duration)> {
        if self.attempts >= self.max_attempts {
            return None;
        }
        self.attempts += 1;
        Some((self.attempts, Self::delay_for(self.base, self.attempts)))
    }

    /// Backoff delay for a given 1-indexed attempt number
    pub fn delay_for(base: Duration, attempt: u32) -> Duration {
        debug_assert!(attempt >= 1);
        let base_ms = base.as_millis() as u64;
        let delay_ms = match 1u64.checked_shl(attempt.saturating_sub(1)) {
            Some(factor) => base_ms.saturating_mul(factor),
            None => u64::MAX,
        };
        Duration::from_millis(delay_ms)
    }

    /// Reset the attempt counter (on every successful Connected transition
    /// and on explicit connect() calls)
    pub fn reset(&mut self) {
        self.attempts = 0;
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn is_exhausted(&self) -> bool {
        self.attempts >= self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_delays() {
        let base = Duration::from_millis(100);
        let mut scheduler = ReconnectScheduler::new(base, 5);

        assert_eq!(
            scheduler.next_attempt(),
            Some((1, Duration::from_millis(100)))
        );
        assert_eq!(
            scheduler.next_attempt(),
            Some((2, Duration::from_millis(200)))
        );
        assert_eq!(
            scheduler.next_attempt(),
            Some((3, Duration::from_millis(400)))
        );
        assert_eq!(
            scheduler.next_attempt(),
            Some((4, Duration::from_millis(800)))
        );
    }

    #[test]
    fn test_cap_stops_attempts() {
        let mut scheduler = ReconnectScheduler::new(Duration::from_millis(10), 3);

        assert!(scheduler.next_attempt().is_some());
        assert!(scheduler.next_attempt().is_some());
        assert!(scheduler.next_attempt().is_some());
        assert!(scheduler.is_exhausted());
        assert_eq!(scheduler.next_attempt(), None);
        assert_eq!(scheduler.next_attempt(), None);
    }

    #[test]
    fn test_reset_restarts_backoff() {
        let base = Duration::from_millis(100);
        let mut scheduler = ReconnectScheduler::new(base, 3);

        scheduler.next_attempt();
        scheduler.next_attempt();
        scheduler.reset();

        assert_eq!(scheduler.attempts(), 0);
        assert_eq!(
            scheduler.next_attempt(),
            Some((1, Duration::from_millis(100)))
        );
    }

    #[test]
    fn test_delay_saturates_instead_of_overflowing() {
        let base = Duration::from_millis(5000);
        let d60 = ReconnectScheduler::delay_for(base, 60);
        let d100 = ReconnectScheduler::delay_for(base, 100);
        assert!(d60 <= d100);
        assert_eq!(d100, Duration::from_millis(u64::MAX));
    }

    #[test]
    fn test_delays_strictly_increase() {
        let base = Duration::from_millis(50);
        let mut prev = Duration::ZERO;
        for attempt in 1..=10 {
            let d = ReconnectScheduler::delay_for(base, attempt);
            assert!(d > prev);
            prev = d;
        }
    }
}
