//! Delay schedules for polling loops.
//!
//! # Design
//! A backoff method only answers "how long before attempt `n`?" and "how many
//! attempts are allowed?". It keeps no state, so a single policy can drive any
//! number of concurrent poll sessions. Detecting that `max_attempts` has been
//! reached is the caller's job.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::BackoffError;

/// Supplies delays for a poll session.
pub trait BackoffMethod {
    /// Delay before attempt `attempt` (0-based). Attempt 0 waits the initial
    /// delay.
    fn next_delay(&self, attempt: u32) -> Duration;

    /// Upper bound on the number of attempts a session may make.
    fn max_attempts(&self) -> u32;
}

impl<B: BackoffMethod + ?Sized> BackoffMethod for &B {
    fn next_delay(&self, attempt: u32) -> Duration {
        (**self).next_delay(attempt)
    }

    fn max_attempts(&self) -> u32 {
        (**self).max_attempts()
    }
}

/// How the delay evolves after the first attempt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StepRule {
    /// Every retry waits the same interval.
    Fixed { interval: Duration },
    /// Retry `k` waits `interval * factor^(k-1)`, never more than `max_delay`.
    Exponential {
        interval: Duration,
        factor: f64,
        max_delay: Duration,
    },
}

/// Immutable backoff policy. Build one with [`BackoffPolicy::fixed`],
/// [`BackoffPolicy::exponential`] or from a [`BackoffConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(try_from = "BackoffConfig")]
pub struct BackoffPolicy {
    initial_delay: Duration,
    max_attempts: u32,
    step: StepRule,
}

impl BackoffPolicy {
    pub fn fixed(
        interval: Duration,
        initial_delay: Duration,
        max_attempts: u32,
    ) -> Result<Self, BackoffError> {
        Self::new(initial_delay, max_attempts, StepRule::Fixed { interval })
    }

    pub fn exponential(
        interval: Duration,
        factor: f64,
        max_delay: Duration,
        initial_delay: Duration,
        max_attempts: u32,
    ) -> Result<Self, BackoffError> {
        Self::new(
            initial_delay,
            max_attempts,
            StepRule::Exponential {
                interval,
                factor,
                max_delay,
            },
        )
    }

    pub fn new(
        initial_delay: Duration,
        max_attempts: u32,
        step: StepRule,
    ) -> Result<Self, BackoffError> {
        if max_attempts == 0 {
            return Err(BackoffError::InvalidConfig(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        if let StepRule::Exponential { factor, .. } = step {
            if !factor.is_finite() || factor < 1.0 {
                return Err(BackoffError::InvalidConfig(format!(
                    "factor must be a finite number >= 1.0, got {factor}"
                )));
            }
        }
        Ok(Self {
            initial_delay,
            max_attempts,
            step,
        })
    }

    pub fn initial_delay(&self) -> Duration {
        self.initial_delay
    }
}

impl BackoffMethod for BackoffPolicy {
    fn next_delay(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return self.initial_delay;
        }
        match self.step {
            StepRule::Fixed { interval } => interval,
            StepRule::Exponential {
                interval,
                factor,
                max_delay,
            } => {
                let exponent = i32::try_from(attempt - 1).unwrap_or(i32::MAX);
                let scaled = interval.as_nanos() as f64 * factor.powi(exponent);
                if !scaled.is_finite() || scaled >= max_delay.as_nanos() as f64 {
                    max_delay
                } else {
                    Duration::from_nanos(scaled as u64)
                }
            }
        }
    }

    fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        let config = BackoffConfig::default();
        Self {
            initial_delay: Duration::from_millis(config.initial_delay_ms),
            max_attempts: config.max_attempts,
            step: StepRule::Fixed {
                interval: Duration::from_millis(config.interval_ms),
            },
        }
    }
}

/// Serializable poll settings, in milliseconds.
///
/// Missing fields fall back to the defaults used when waiting for a freshly
/// created instance to boot: 15s initial delay, 5s interval, 25 attempts.
/// Setting `factor` switches to exponential growth capped at `max_delay_ms`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BackoffConfig {
    pub initial_delay_ms: u64,
    pub interval_ms: u64,
    pub max_attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub factor: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_delay_ms: Option<u64>,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 15_000,
            interval_ms: 5_000,
            max_attempts: 25,
            factor: None,
            max_delay_ms: None,
        }
    }
}

impl TryFrom<BackoffConfig> for BackoffPolicy {
    type Error = BackoffError;

    fn try_from(config: BackoffConfig) -> Result<Self, Self::Error> {
        let interval = Duration::from_millis(config.interval_ms);
        let initial_delay = Duration::from_millis(config.initial_delay_ms);
        match config.factor {
            None => BackoffPolicy::fixed(interval, initial_delay, config.max_attempts),
            Some(factor) => BackoffPolicy::exponential(
                interval,
                factor,
                Duration::from_millis(config.max_delay_ms.unwrap_or(u64::MAX)),
                initial_delay,
                config.max_attempts,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn first_attempt_waits_initial_delay() {
        let policy = BackoffPolicy::fixed(ms(5_000), ms(15_000), 25).unwrap();
        assert_eq!(policy.next_delay(0), ms(15_000));
    }

    #[test]
    fn later_attempts_wait_fixed_interval() {
        let policy = BackoffPolicy::fixed(ms(5_000), ms(15_000), 25).unwrap();
        for attempt in 1..25 {
            assert_eq!(policy.next_delay(attempt), ms(5_000), "attempt {attempt}");
        }
    }

    #[test]
    fn delays_keep_coming_past_max_attempts() {
        let policy = BackoffPolicy::fixed(ms(100), ms(0), 2).unwrap();
        assert_eq!(policy.next_delay(10), ms(100));
        assert_eq!(policy.max_attempts(), 2);
    }

    #[test]
    fn zero_max_attempts_is_rejected() {
        let err = BackoffPolicy::fixed(ms(100), ms(0), 0).unwrap_err();
        assert!(matches!(err, BackoffError::InvalidConfig(_)));
    }

    #[test]
    fn exponential_grows_and_caps() {
        let policy = BackoffPolicy::exponential(ms(100), 2.0, ms(500), ms(50), 10).unwrap();
        assert_eq!(policy.next_delay(0), ms(50));
        assert_eq!(policy.next_delay(1), ms(100));
        assert_eq!(policy.next_delay(2), ms(200));
        assert_eq!(policy.next_delay(3), ms(400));
        assert_eq!(policy.next_delay(4), ms(500));
        assert_eq!(policy.next_delay(u32::MAX), ms(500));
    }

    #[test]
    fn exponential_rejects_shrinking_factor() {
        assert!(BackoffPolicy::exponential(ms(100), 0.5, ms(500), ms(0), 3).is_err());
        assert!(BackoffPolicy::exponential(ms(100), f64::NAN, ms(500), ms(0), 3).is_err());
    }

    #[test]
    fn default_matches_boot_wait_settings() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.initial_delay(), ms(15_000));
        assert_eq!(policy.next_delay(1), ms(5_000));
        assert_eq!(policy.max_attempts(), 25);
    }

    #[test]
    fn policy_deserializes_with_defaults() {
        let policy: BackoffPolicy = serde_json::from_str(r#"{"max_attempts": 3}"#).unwrap();
        assert_eq!(policy.max_attempts(), 3);
        assert_eq!(policy.next_delay(0), ms(15_000));
        assert_eq!(policy.next_delay(2), ms(5_000));
    }

    #[test]
    fn policy_deserialization_validates() {
        let result: Result<BackoffPolicy, _> = serde_json::from_str(r#"{"max_attempts": 0}"#);
        assert!(result.is_err());
    }

    #[test]
    fn config_with_factor_builds_exponential_policy() {
        let config = BackoffConfig {
            initial_delay_ms: 0,
            interval_ms: 10,
            max_attempts: 5,
            factor: Some(3.0),
            max_delay_ms: Some(50),
        };
        let policy = BackoffPolicy::try_from(config).unwrap();
        assert_eq!(policy.next_delay(2), ms(30));
        assert_eq!(policy.next_delay(3), ms(50));
    }

    #[test]
    fn config_rejects_unknown_fields() {
        let result: Result<BackoffConfig, _> = serde_json::from_str(r#"{"retries": 3}"#);
        assert!(result.is_err());
    }
}
