//! Time source for the request engine.
//!
//! The engine reads the current unix time to sign each attempt and sleeps
//! between rate-limited attempts. Both go through [`Clock`] so tests can
//! record waits instead of spending them.

use std::time::Duration;

use async_trait::async_trait;

/// Time source used by the request engine.
#[async_trait]
pub trait Clock: Send + Sync {
    /// Returns the current time as unix seconds.
    fn unix_timestamp(&self) -> i64;

    /// Waits for `duration`.
    async fn sleep(&self, duration: Duration);
}

/// Wall-clock time and tokio timers.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn unix_timestamp(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_is_recent() {
        // 2023-11-14
        assert!(SystemClock.unix_timestamp() > 1_700_000_000);
    }

    #[tokio::test(start_paused = true)]
    async fn test_system_clock_sleep_uses_tokio_timer() {
        let start = tokio::time::Instant::now();
        SystemClock.sleep(Duration::from_secs(5)).await;
        assert!(start.elapsed() >= Duration::from_secs(5));
    }
}
