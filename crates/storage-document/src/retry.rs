//! Startup retry schedule.
//!
//! The connection manager retries only while the database is not yet
//! accepting connections, at a fixed interval, until a wall-clock deadline
//! measured from the first attempt. [`InitRetryState`] makes that decision
//! without touching a clock itself: callers pass `now`, which keeps the
//! schedule testable without sleeping.

use std::time::{Duration, Instant};

use crate::config::ConnectionRetryConfig;

/// What to do after a transient connection failure.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum RetryDecision {
    /// Sleep for `delay`, then try again.
    Retry {
        /// Pause before the next attempt.
        delay: Duration,
        /// Time left before the deadline, in minutes.
        minutes_remaining: f64,
        /// Whether the one-time operator notice should be logged now.
        emit_long_notice: bool,
    },
    /// The deadline has passed.
    GiveUp,
}

/// Retry bookkeeping for one initialization call.
#[derive(Debug)]
pub(crate) struct InitRetryState {
    started: Instant,
    max_wait: Duration,
    retry_interval: Duration,
    long_notice_emitted: bool,
}

impl InitRetryState {
    /// Starts a schedule whose deadline is `max_wait` after `started`.
    ///
    /// The deadline is never materialized as an `Instant`, so `max_wait` may
    /// be as large as `Duration::MAX`.
    pub(crate) fn new(config: &ConnectionRetryConfig, started: Instant) -> Self {
        Self {
            started,
            max_wait: config.max_wait(),
            retry_interval: config.retry_interval(),
            long_notice_emitted: false,
        }
    }

    /// Decides how to react to a transient failure observed at `now`.
    pub(crate) fn on_transient_failure(&mut self, now: Instant) -> RetryDecision {
        let elapsed = now.saturating_duration_since(self.started);
        let Some(remaining) = self.max_wait.checked_sub(elapsed).filter(|r| !r.is_zero()) else {
            return RetryDecision::GiveUp;
        };

        let emit_long_notice = !self.long_notice_emitted;
        self.long_notice_emitted = true;

        RetryDecision::Retry {
            delay: self.retry_interval,
            minutes_remaining: remaining.as_secs_f64() / 60.0,
            emit_long_notice,
        }
    }
}

/// Renders minutes with one decimal place, as used in progress log lines.
pub(crate) fn format_minutes(minutes: f64) -> String {
    format!("{minutes:.1}")
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    fn config(max_wait_secs: u64, interval_secs: u64) -> ConnectionRetryConfig {
        ConnectionRetryConfig::builder()
            .max_wait(Duration::from_secs(max_wait_secs))
            .retry_interval(Duration::from_secs(interval_secs))
            .build()
            .unwrap()
    }

    #[test]
    fn test_retry_before_deadline() {
        let start = Instant::now();
        let mut state = InitRetryState::new(&config(3600, 10), start);

        match state.on_transient_failure(start) {
            RetryDecision::Retry { delay, minutes_remaining, emit_long_notice } => {
                assert_eq!(delay, Duration::from_secs(10));
                assert!((minutes_remaining - 60.0).abs() < 1e-9);
                assert!(emit_long_notice);
            },
            RetryDecision::GiveUp => panic!("should retry"),
        }
    }

    #[test]
    fn test_long_notice_only_once() {
        let start = Instant::now();
        let mut state = InitRetryState::new(&config(3600, 10), start);

        let notices: Vec<bool> = (0..4u64)
            .map(|i| match state.on_transient_failure(start + Duration::from_secs(i * 10)) {
                RetryDecision::Retry { emit_long_notice, .. } => emit_long_notice,
                RetryDecision::GiveUp => panic!("should retry"),
            })
            .collect();

        assert_eq!(notices, vec![true, false, false, false]);
    }

    #[test]
    fn test_minutes_remaining_shrinks() {
        let start = Instant::now();
        let mut state = InitRetryState::new(&config(600, 10), start);

        let RetryDecision::Retry { minutes_remaining, .. } =
            state.on_transient_failure(start + Duration::from_secs(300))
        else {
            panic!("should retry");
        };
        assert_eq!(format_minutes(minutes_remaining), "5.0");
    }

    #[test]
    fn test_give_up_at_deadline() {
        let start = Instant::now();
        let mut state = InitRetryState::new(&config(60, 10), start);

        assert_eq!(
            state.on_transient_failure(start + Duration::from_secs(60)),
            RetryDecision::GiveUp
        );
        assert_eq!(
            state.on_transient_failure(start + Duration::from_secs(61)),
            RetryDecision::GiveUp
        );
    }

    #[test]
    fn test_just_before_deadline_still_retries() {
        let start = Instant::now();
        let mut state = InitRetryState::new(&config(60, 10), start);

        assert!(matches!(
            state.on_transient_failure(start + Duration::from_millis(59_999)),
            RetryDecision::Retry { .. }
        ));
    }

    #[test]
    fn test_unbounded_max_wait_keeps_retrying() {
        let start = Instant::now();
        let config = ConnectionRetryConfig::builder()
            .max_wait(Duration::MAX)
            .retry_interval(Duration::from_millis(10))
            .build()
            .unwrap();
        let mut state = InitRetryState::new(&config, start);

        for offset in [Duration::ZERO, Duration::from_secs(86_400 * 365)] {
            match state.on_transient_failure(start + offset) {
                RetryDecision::Retry { delay, minutes_remaining, .. } => {
                    assert_eq!(delay, Duration::from_millis(10));
                    assert!(minutes_remaining.is_finite() && minutes_remaining > 1e9);
                },
                RetryDecision::GiveUp => panic!("should retry"),
            }
        }
    }

    #[test]
    fn test_format_minutes_rounds_to_one_decimal() {
        assert_eq!(format_minutes(59.83), "59.8");
        assert_eq!(format_minutes(0.04), "0.0");
        assert_eq!(format_minutes(12.0), "12.0");
    }
}
