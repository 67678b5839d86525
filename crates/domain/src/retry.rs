use chrono::Duration;
use clinora_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// Upper bound on a single backoff delay, regardless of attempt count.
pub const MAX_BACKOFF_SECONDS: i64 = 86_400;

/// Per-subscription retry policy: attempt budget plus exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    max_attempts: u16,
    base_delay_seconds: u32,
}

impl RetryPolicy {
    /// Creates a validated retry policy.
    pub fn new(max_attempts: u16, base_delay_seconds: u32) -> AppResult<Self> {
        if max_attempts == 0 {
            return Err(AppError::Validation(
                "max_attempts must be greater than zero".to_owned(),
            ));
        }

        if max_attempts > 10 {
            return Err(AppError::Validation(
                "max_attempts must be less than or equal to 10".to_owned(),
            ));
        }

        if base_delay_seconds == 0 {
            return Err(AppError::Validation(
                "base_delay_seconds must be greater than zero".to_owned(),
            ));
        }

        if base_delay_seconds > 3600 {
            return Err(AppError::Validation(
                "base_delay_seconds must be less than or equal to 3600".to_owned(),
            ));
        }

        Ok(Self {
            max_attempts,
            base_delay_seconds,
        })
    }

    /// Returns the maximum number of delivery attempts.
    #[must_use]
    pub fn max_attempts(&self) -> u16 {
        self.max_attempts
    }

    /// Returns the base retry delay in seconds.
    #[must_use]
    pub fn base_delay_seconds(&self) -> u32 {
        self.base_delay_seconds
    }

    /// Returns whether the attempt budget is spent after `attempt_count`
    /// attempts.
    #[must_use]
    pub fn is_exhausted(&self, attempt_count: i32) -> bool {
        attempt_count >= i32::from(self.max_attempts)
    }

    /// Returns the delay before the next attempt, given the number of
    /// attempts already made.
    ///
    /// Doubling schedule: attempt 1 waits one base delay, attempt 2 waits
    /// two, attempt 3 waits four, capped at [`MAX_BACKOFF_SECONDS`].
    #[must_use]
    pub fn backoff_delay(&self, attempt_count: i32) -> Duration {
        let exponent = u32::try_from(attempt_count.max(1) - 1).unwrap_or(0);
        let seconds = i64::from(self.base_delay_seconds)
            .saturating_mul(1_i64.checked_shl(exponent.min(62)).unwrap_or(i64::MAX))
            .min(MAX_BACKOFF_SECONDS);

        Duration::seconds(seconds)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_seconds: 30,
        }
    }
}

#[cfg(test)]
mod tests {
    use clinora_core::AppResult;
    use proptest::prelude::*;

    use super::{MAX_BACKOFF_SECONDS, RetryPolicy};

    #[test]
    fn rejects_zero_and_oversized_bounds() {
        assert!(RetryPolicy::new(0, 30).is_err());
        assert!(RetryPolicy::new(11, 30).is_err());
        assert!(RetryPolicy::new(3, 0).is_err());
        assert!(RetryPolicy::new(3, 3601).is_err());
    }

    #[test]
    fn backoff_doubles_per_attempt() -> AppResult<()> {
        let policy = RetryPolicy::new(5, 30)?;

        assert_eq!(policy.backoff_delay(1).num_seconds(), 30);
        assert_eq!(policy.backoff_delay(2).num_seconds(), 60);
        assert_eq!(policy.backoff_delay(3).num_seconds(), 120);
        assert_eq!(policy.backoff_delay(4).num_seconds(), 240);
        Ok(())
    }

    #[test]
    fn backoff_is_capped() -> AppResult<()> {
        let policy = RetryPolicy::new(10, 3600)?;

        assert_eq!(
            policy.backoff_delay(10).num_seconds(),
            MAX_BACKOFF_SECONDS
        );
        Ok(())
    }

    #[test]
    fn exhaustion_tracks_max_attempts() -> AppResult<()> {
        let policy = RetryPolicy::new(3, 10)?;

        assert!(!policy.is_exhausted(2));
        assert!(policy.is_exhausted(3));
        assert!(policy.is_exhausted(4));
        Ok(())
    }

    proptest! {
        #[test]
        fn backoff_grows_strictly_until_cap(
            max_attempts in 1_u16..=10,
            base in 1_u32..=3600,
            attempt in 1_i32..=9,
        ) {
            let policy = RetryPolicy::new(max_attempts, base)
                .map_err(|error| TestCaseError::fail(error.to_string()))?;
            let current = policy.backoff_delay(attempt).num_seconds();
            let next = policy.backoff_delay(attempt + 1).num_seconds();

            prop_assert!(current <= MAX_BACKOFF_SECONDS);
            if current < MAX_BACKOFF_SECONDS {
                prop_assert!(next > current);
            } else {
                prop_assert_eq!(next, MAX_BACKOFF_SECONDS);
            }
        }
    }
}
