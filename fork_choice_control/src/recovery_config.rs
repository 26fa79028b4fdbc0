use core::{num::NonZeroU32, time::Duration};

use derivative::Derivative;

pub const DEFAULT_STORAGE_REQUEST_TIMEOUT: Duration = Duration::from_secs(12);

#[derive(Clone, Copy, Debug, Derivative)]
#[derivative(Default)]
pub struct RecoveryConfig {
    #[derivative(Default(value = "DEFAULT_STORAGE_REQUEST_TIMEOUT"))]
    pub storage_request_timeout: Duration,
    // Defaults to `storage_request_timeout`.
    pub retry_interval: Option<Duration>,
    // Unbounded if `None`.
    pub max_attempts: Option<NonZeroU32>,
}

impl RecoveryConfig {
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            interval: self.retry_interval.unwrap_or(self.storage_request_timeout),
            max_attempts: self.max_attempts,
        }
    }
}

/// How recovery reacts to a storage request that timed out.
///
/// Every retry waits the same `interval`. There is no backoff and no jitter.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct RetryPolicy {
    pub interval: Duration,
    pub max_attempts: Option<NonZeroU32>,
}

impl RetryPolicy {
    /// Retries forever, waiting `interval` between attempts.
    #[must_use]
    pub const fn fixed(interval: Duration) -> Self {
        Self {
            interval,
            max_attempts: None,
        }
    }

    #[must_use]
    pub const fn with_max_attempts(self, max_attempts: NonZeroU32) -> Self {
        Self {
            max_attempts: Some(max_attempts),
            ..self
        }
    }

    /// Whether another attempt may follow attempt number `attempt` (starting at 1).
    #[must_use]
    pub fn should_retry(&self, attempt: u32) -> bool {
        self.max_attempts
            .map_or(true, |max_attempts| attempt < max_attempts.get())
    }
}

#[cfg(test)]
mod tests {
    use nonzero_ext::nonzero;
    use test_case::test_case;

    use super::*;

    #[test]
    fn retry_interval_defaults_to_request_timeout() {
        let config = RecoveryConfig {
            storage_request_timeout: Duration::from_secs(5),
            ..RecoveryConfig::default()
        };

        assert_eq!(config.retry_policy(), RetryPolicy::fixed(Duration::from_secs(5)));
    }

    #[test]
    fn default_config_retries_forever() {
        let config = RecoveryConfig::default();
        let policy = config.retry_policy();

        assert_eq!(config.storage_request_timeout, DEFAULT_STORAGE_REQUEST_TIMEOUT);
        assert_eq!(policy.interval, DEFAULT_STORAGE_REQUEST_TIMEOUT);
        assert!(policy.should_retry(u32::MAX));
    }

    #[test]
    fn explicit_retry_interval_overrides_timeout() {
        let config = RecoveryConfig {
            storage_request_timeout: Duration::from_secs(5),
            retry_interval: Some(Duration::from_secs(1)),
            max_attempts: Some(nonzero!(3_u32)),
        };

        let policy = config.retry_policy();

        assert_eq!(policy.interval, Duration::from_secs(1));
        assert_eq!(policy.max_attempts, Some(nonzero!(3_u32)));
    }

    #[test_case(1 => true)]
    #[test_case(2 => true)]
    #[test_case(3 => false)]
    #[test_case(4 => false)]
    fn bounded_policy_stops_after_max_attempts(attempt: u32) -> bool {
        RetryPolicy::fixed(Duration::from_secs(1))
            .with_max_attempts(nonzero!(3_u32))
            .should_retry(attempt)
    }
}
