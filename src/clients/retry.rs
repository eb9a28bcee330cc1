//! Call-local retry bookkeeping for the request engine.
//!
//! [`RetryState`] is created at the start of one engine call and dropped at
//! its end; it is never shared between calls. It decides, per failed
//! attempt, whether to refresh the token, wait, or give up:
//!
//! | Response | Counter effect | Decision |
//! |----------|----------------|----------|
//! | 401/403 | consecutive auth failures + 1 | refresh, or `AUTH_ERROR` once the count exceeds 3 |
//! | 429 | auth count reset, rate-limit retries `n` + 1 | wait `max(Retry-After, n)` s, or `TOO_MANY_REQUESTS` if total waiting would pass 600 s |
//! | anything else | auth count reset | handled by the engine (success or fatal) |
//!
//! A call is therefore bounded by three refresh round trips plus 600 seconds
//! of rate-limit waiting, on top of network timeouts.

use std::time::Duration;

use crate::clients::envelope::TransportErrorKind;

/// Consecutive 401/403 responses tolerated (each followed by a refresh).
pub const MAX_CONSECUTIVE_AUTH_FAILURES: u32 = 3;

/// Total time one call may spend waiting on rate limits.
pub const RATE_LIMIT_WAIT_BUDGET: Duration = Duration::from_secs(600);

/// What the engine should do after a failed attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetryDecision {
    /// Refresh the bearer token, then attempt again.
    RefreshToken,
    /// Sleep for the given duration, then attempt again.
    Wait(Duration),
    /// Stop with the given failure kind.
    Fatal(TransportErrorKind),
}

/// Counters for one engine call.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RetryState {
    consecutive_auth_failures: u32,
    rate_limit_retries: u32,
    rate_limit_waited: Duration,
}

impl RetryState {
    /// Creates fresh counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a 401/403 response.
    pub fn on_auth_failure(&mut self) -> RetryDecision {
        self.consecutive_auth_failures += 1;
        if self.consecutive_auth_failures > MAX_CONSECUTIVE_AUTH_FAILURES {
            RetryDecision::Fatal(TransportErrorKind::AuthError)
        } else {
            RetryDecision::RefreshToken
        }
    }

    /// Records a 429 response with an optional `Retry-After` hint in seconds.
    ///
    /// The wait is linear in the retry count and never shorter than the
    /// server's hint. If adding it would push total waiting past
    /// [`RATE_LIMIT_WAIT_BUDGET`], the call is abandoned without waiting.
    pub fn on_rate_limited(&mut self, retry_after_secs: Option<f64>) -> RetryDecision {
        self.reset_auth_failures();
        self.rate_limit_retries += 1;

        let linear = Duration::from_secs(u64::from(self.rate_limit_retries));
        let hinted = retry_after_secs
            .filter(|secs| secs.is_finite() && *secs > 0.0)
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
            .unwrap_or_default();
        let wait = linear.max(hinted);

        let total = self.rate_limit_waited.saturating_add(wait);
        if total > RATE_LIMIT_WAIT_BUDGET {
            return RetryDecision::Fatal(TransportErrorKind::TooManyRequests);
        }
        self.rate_limit_waited = total;
        RetryDecision::Wait(wait)
    }

    /// Records any response that is neither 401/403 nor 429.
    pub fn on_other_status(&mut self) {
        self.reset_auth_failures();
    }

    /// Consecutive auth failures seen so far.
    #[must_use]
    pub const fn consecutive_auth_failures(&self) -> u32 {
        self.consecutive_auth_failures
    }

    /// Rate-limit retries seen so far.
    #[must_use]
    pub const fn rate_limit_retries(&self) -> u32 {
        self.rate_limit_retries
    }

    /// Total time spent (or committed to) waiting on rate limits.
    #[must_use]
    pub const fn rate_limit_waited(&self) -> Duration {
        self.rate_limit_waited
    }

    fn reset_auth_failures(&mut self) {
        self.consecutive_auth_failures = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fourth_consecutive_auth_failure_is_fatal() {
        let mut state = RetryState::new();
        for _ in 0..3 {
            assert_eq!(state.on_auth_failure(), RetryDecision::RefreshToken);
        }
        assert_eq!(
            state.on_auth_failure(),
            RetryDecision::Fatal(TransportErrorKind::AuthError)
        );
    }

    #[test]
    fn test_non_auth_status_resets_auth_counter() {
        let mut state = RetryState::new();
        state.on_auth_failure();
        state.on_auth_failure();
        state.on_rate_limited(None);
        assert_eq!(state.consecutive_auth_failures(), 0);

        for _ in 0..3 {
            assert_eq!(state.on_auth_failure(), RetryDecision::RefreshToken);
        }
        state.on_other_status();
        assert_eq!(state.on_auth_failure(), RetryDecision::RefreshToken);
    }

    #[test]
    fn test_rate_limit_wait_is_linear_without_hint() {
        let mut state = RetryState::new();
        let waits: Vec<_> = (0..4).map(|_| state.on_rate_limited(None)).collect();
        assert_eq!(
            waits,
            vec![
                RetryDecision::Wait(Duration::from_secs(1)),
                RetryDecision::Wait(Duration::from_secs(2)),
                RetryDecision::Wait(Duration::from_secs(3)),
                RetryDecision::Wait(Duration::from_secs(4)),
            ]
        );
        assert_eq!(state.rate_limit_waited(), Duration::from_secs(10));
    }

    #[test]
    fn test_retry_after_is_a_lower_bound() {
        let mut state = RetryState::new();
        assert_eq!(
            state.on_rate_limited(Some(5.0)),
            RetryDecision::Wait(Duration::from_secs(5))
        );
        // Hint shorter than the linear step is ignored.
        state.on_rate_limited(None);
        assert_eq!(
            state.on_rate_limited(Some(0.5)),
            RetryDecision::Wait(Duration::from_secs(3))
        );
    }

    #[test]
    fn test_invalid_retry_after_hint_is_ignored() {
        let mut state = RetryState::new();
        assert_eq!(
            state.on_rate_limited(Some(f64::NAN)),
            RetryDecision::Wait(Duration::from_secs(1))
        );
        assert_eq!(
            state.on_rate_limited(Some(-10.0)),
            RetryDecision::Wait(Duration::from_secs(2))
        );
    }

    #[test]
    fn test_wait_budget_exhaustion_is_fatal_without_waiting() {
        let mut state = RetryState::new();
        // 1 + 2 + ... + 34 = 595 seconds fits the budget.
        for n in 1..=34 {
            assert_eq!(
                state.on_rate_limited(None),
                RetryDecision::Wait(Duration::from_secs(n))
            );
        }
        assert_eq!(state.rate_limit_waited(), Duration::from_secs(595));
        assert_eq!(
            state.on_rate_limited(None),
            RetryDecision::Fatal(TransportErrorKind::TooManyRequests)
        );
        assert_eq!(state.rate_limit_waited(), Duration::from_secs(595));
    }

    #[test]
    fn test_huge_retry_after_is_fatal_immediately() {
        let mut state = RetryState::new();
        assert_eq!(
            state.on_rate_limited(Some(601.0)),
            RetryDecision::Fatal(TransportErrorKind::TooManyRequests)
        );
    }

    #[test]
    fn test_auth_failures_do_not_reset_rate_limit_count() {
        let mut state = RetryState::new();
        state.on_rate_limited(None);
        state.on_auth_failure();
        assert_eq!(
            state.on_rate_limited(None),
            RetryDecision::Wait(Duration::from_secs(2))
        );
        assert_eq!(state.rate_limit_retries(), 2);
    }
}
