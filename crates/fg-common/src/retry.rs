use std::future::Future;
use std::time::Duration;

use rand::Rng;

/// Exponential backoff: `initial * multiplier^attempt`, capped at `max`, with
/// up to `jitter` of the delay added at random.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub multiplier: f64,
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_backoff: Duration::from_millis(50),
            max_backoff: Duration::from_secs(5),
            multiplier: 2.0,
            jitter: 0.2,
        }
    }
}

impl RetryPolicy {
    /// Policy used by the supervisor: restarts forever, starting at `initial`.
    pub fn restarts(initial: Duration) -> Self {
        Self {
            max_retries: u32::MAX,
            initial_backoff: initial,
            max_backoff: Duration::from_secs(300),
            multiplier: 2.0,
            jitter: 0.1,
        }
    }

    pub fn without_jitter(mut self) -> Self {
        self.jitter = 0.0;
        self
    }

    /// Delay before retry number `attempt` (0-based), without jitter.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.powi(attempt.min(63) as i32);
        let millis = self.initial_backoff.as_millis() as f64 * factor;
        let capped = millis.min(self.max_backoff.as_millis() as f64);
        Duration::from_millis(capped.max(0.0) as u64)
    }

    pub fn delay(&self, attempt: u32) -> Duration {
        let base = self.base_delay(attempt);
        if self.jitter <= 0.0 {
            return base;
        }
        let extra = base.as_millis() as f64 * rand::thread_rng().gen_range(0.0..self.jitter);
        base + Duration::from_millis(extra as u64)
    }
}

/// Run `op` until it succeeds, fails with an error `retryable` rejects, or
/// the policy runs out of retries.
pub async fn retry_with_backoff<T, E, F, Fut, P>(
    policy: &RetryPolicy,
    label: &str,
    retryable: P,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < policy.max_retries && retryable(&err) => {
                let delay = policy.delay(attempt);
                tracing::debug!(op = label, attempt, delay_ms = delay.as_millis() as u64, error = %err, "retrying");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn delay_grows_and_caps() {
        let policy = RetryPolicy {
            max_retries: 10,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(500),
            multiplier: 2.0,
            jitter: 0.0,
        };
        assert_eq!(policy.delay(0), Duration::from_millis(100));
        assert_eq!(policy.delay(1), Duration::from_millis(200));
        assert_eq!(policy.delay(2), Duration::from_millis(400));
        assert_eq!(policy.delay(3), Duration::from_millis(500));
        assert_eq!(policy.delay(40), Duration::from_millis(500));
    }

    #[test]
    fn jitter_stays_within_bounds() {
        let policy = RetryPolicy::default();
        for attempt in 0..6 {
            let base = policy.base_delay(attempt);
            let delay = policy.delay(attempt);
            assert!(delay >= base);
            assert!(delay.as_millis() as f64 <= base.as_millis() as f64 * (1.0 + policy.jitter) + 1.0);
        }
    }

    #[tokio::test]
    async fn retries_only_retryable_errors() {
        let policy = RetryPolicy {
            initial_backoff: Duration::from_millis(1),
            ..RetryPolicy::default()
        }
        .without_jitter();

        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result: Result<u32, String> = retry_with_backoff(
            &policy,
            "flaky",
            |err: &String| err == "conflict",
            || async move {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                if n < 2 { Err("conflict".to_string()) } else { Ok(n) }
            },
        )
        .await;
        assert_eq!(result, Ok(2));

        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result: Result<u32, String> = retry_with_backoff(
            &policy,
            "broken",
            |err: &String| err == "conflict",
            || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err("fatal".to_string())
            },
        )
        .await;
        assert_eq!(result, Err("fatal".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let policy = RetryPolicy {
            max_retries: 2,
            initial_backoff: Duration::from_millis(1),
            ..RetryPolicy::default()
        };
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result: Result<(), String> = retry_with_backoff(
            &policy,
            "always",
            |_: &String| true,
            || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err("conflict".to_string())
            },
        )
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
