//! Retry policy shared by translation calls and session-block recovery.

use std::future::Future;
use std::time::Duration;

use rand::Rng;

use crate::Result;

/// Backoff schedule between attempts.
#[derive(Clone, Copy, Debug)]
pub enum Backoff {
    /// The same delay before every retry.
    Fixed(Duration),
    /// `base * 2^(attempt - 1)`, capped.
    Exponential { base: Duration, cap: Duration },
    /// A fresh uniform draw from `[min, max]` before every retry.
    Uniform { min: Duration, max: Duration },
}

/// Attempt budget plus the backoff schedule between attempts.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl RetryPolicy {
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            backoff: Backoff::Fixed(delay),
        }
    }

    pub fn exponential(max_attempts: u32, base: Duration, cap: Duration) -> Self {
        Self {
            max_attempts,
            backoff: Backoff::Exponential { base, cap },
        }
    }

    pub fn uniform(max_attempts: u32, min: Duration, max: Duration) -> Self {
        Self {
            max_attempts,
            backoff: Backoff::Uniform { min, max },
        }
    }

    /// Delay to wait after the given failed attempt (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed(delay) => delay,
            Backoff::Exponential { base, cap } => {
                let shift = attempt.saturating_sub(1).min(16);
                base.saturating_mul(1u32 << shift).min(cap)
            }
            Backoff::Uniform { min, max } => {
                if max <= min {
                    return min;
                }
                let span = (max - min).as_millis() as u64;
                min + Duration::from_millis(rand::thread_rng().gen_range(0..=span))
            }
        }
    }
}

/// Runs `op` up to `policy.max_attempts` times, sleeping `policy.delay(n)`
/// after the nth failure. Returns the first success or the last error.
pub async fn retry<T, F, Fut>(policy: &RetryPolicy, label: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match op().await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!(
                        "{label} succeeded on attempt {attempt}/{}",
                        policy.max_attempts
                    );
                } else {
                    tracing::debug!("{label} succeeded");
                }
                return Ok(value);
            }
            Err(err) => {
                if attempt >= policy.max_attempts {
                    tracing::error!("{label} failed after {attempt} attempts: {err}");
                    return Err(err);
                }
                let delay = policy.delay(attempt);
                tracing::warn!(
                    "{label} attempt {attempt}/{} failed: {err}; retrying in {:?}",
                    policy.max_attempts,
                    delay
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::errors::Error;

    #[derive(Clone)]
    struct CapturedLog(Arc<Mutex<Vec<u8>>>);

    impl CapturedLog {
        fn new() -> Self {
            Self(Arc::new(Mutex::new(Vec::new())))
        }

        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl std::io::Write for CapturedLog {
        fn write(&mut self, data: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(data);
            Ok(data.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn exponential_delays_grow_and_cap() {
        let policy =
            RetryPolicy::exponential(5, Duration::from_secs(1), Duration::from_secs(4));
        assert_eq!(policy.delay(1), Duration::from_secs(1));
        assert_eq!(policy.delay(2), Duration::from_secs(2));
        assert_eq!(policy.delay(3), Duration::from_secs(4));
        assert_eq!(policy.delay(4), Duration::from_secs(4));
    }

    #[test]
    fn exponential_delays_never_decrease() {
        let policy =
            RetryPolicy::exponential(32, Duration::from_millis(250), Duration::from_secs(30));
        let mut last = Duration::ZERO;
        for attempt in 1..=32 {
            let delay = policy.delay(attempt);
            assert!(delay >= last, "delay shrank at attempt {attempt}");
            last = delay;
        }
    }

    #[test]
    fn uniform_delays_stay_inside_the_window() {
        let min = Duration::from_secs(5);
        let max = Duration::from_secs(15);
        let policy = RetryPolicy::uniform(3, min, max);
        for attempt in 0..200 {
            let delay = policy.delay(attempt);
            assert!(delay >= min && delay <= max, "draw {delay:?} outside window");
        }
    }

    #[test]
    fn uniform_with_empty_window_is_constant() {
        let policy = RetryPolicy::uniform(3, Duration::ZERO, Duration::ZERO);
        assert_eq!(policy.delay(1), Duration::ZERO);
    }

    #[tokio::test]
    async fn retry_returns_first_success() {
        let policy = RetryPolicy::fixed(5, Duration::ZERO);
        let calls = AtomicUsize::new(0);
        let result = retry(&policy, "op", || async {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            if n < 2 {
                Err(Error::Provider("transient".to_string()))
            } else {
                Ok(n)
            }
        })
        .await;
        assert_eq!(result.ok(), Some(2));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn every_attempt_leaves_a_log_line() {
        use tracing::instrument::WithSubscriber;

        let log = CapturedLog::new();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer({
                let log = log.clone();
                move || log.clone()
            })
            .finish();

        let policy = RetryPolicy::fixed(3, Duration::ZERO);
        let calls = AtomicUsize::new(0);
        let result = async {
            retry(&policy, "lookup", || async {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(Error::Provider("transient".to_string()))
                } else {
                    Ok(())
                }
            })
            .await
        }
        .with_subscriber(subscriber)
        .await;

        assert!(result.is_ok());
        let output = log.contents();
        assert!(
            output.contains("lookup attempt 1/3 failed"),
            "missing failure line in: {output}"
        );
        assert!(
            output.contains("lookup succeeded on attempt 2/3"),
            "missing success line in: {output}"
        );
    }

    #[tokio::test]
    async fn retry_gives_up_after_the_budget() {
        let policy = RetryPolicy::fixed(3, Duration::ZERO);
        let calls = AtomicUsize::new(0);
        let result: Result<()> = retry(&policy, "op", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(Error::Provider("down".to_string()))
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
