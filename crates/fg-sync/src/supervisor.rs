use std::fmt::{Debug, Display};
use std::future::Future;
use std::time::Duration;

use fg_common::Shutdown;
use fg_common::retry::RetryPolicy;
use fg_common::store::QueueError;
use tracing::{debug, error, warn};

use crate::feed::FeedError;

/// Errors a supervised loop can end with. Fatal ones stop the supervisor.
pub trait LoopError: Display {
    fn is_fatal(&self) -> bool;
}

impl LoopError for QueueError {
    fn is_fatal(&self) -> bool {
        QueueError::is_fatal(self)
    }
}

impl LoopError for FeedError {
    fn is_fatal(&self) -> bool {
        false
    }
}

/// Restart `run` until shutdown. A clean exit restarts after
/// `restart_interval`; a non-fatal error restarts after the policy's backoff;
/// a fatal error is returned.
pub async fn supervise<T, E, F, Fut>(
    name: &'static str,
    restart_interval: Duration,
    backoff: &RetryPolicy,
    shutdown: &Shutdown,
    mut run: F,
) -> Result<(), E>
where
    T: Debug,
    E: LoopError,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut failures: u32 = 0;

    while !shutdown.is_triggered() {
        let wait = match run().await {
            Ok(outcome) => {
                failures = 0;
                debug!(task = name, ?outcome, "run finished");
                restart_interval
            }
            Err(err) if err.is_fatal() => {
                error!(task = name, error = %err, "fatal error; stopping");
                shutdown.trigger();
                return Err(err);
            }
            Err(err) => {
                let delay = backoff.delay(failures);
                failures = failures.saturating_add(1);
                warn!(task = name, error = %err, failures, retry_in_ms = delay.as_millis() as u64, "run failed; restarting");
                delay
            }
        };

        if shutdown.sleep_or_shutdown(wait).await {
            break;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug)]
    struct TestError(bool);

    impl Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "test error (fatal: {})", self.0)
        }
    }

    impl LoopError for TestError {
        fn is_fatal(&self) -> bool {
            self.0
        }
    }

    fn fast() -> RetryPolicy {
        RetryPolicy::restarts(Duration::from_millis(1)).without_jitter()
    }

    #[tokio::test]
    async fn restarts_after_transient_errors_until_fatal() {
        let shutdown = Shutdown::new();
        let runs = AtomicU32::new(0);
        let counter = &runs;

        let result = supervise("test", Duration::from_millis(1), &fast(), &shutdown, || async move {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            if n < 3 { Err(TestError(false)) } else { Err::<(), _>(TestError(true)) }
        })
        .await;

        assert!(matches!(result, Err(TestError(true))));
        assert_eq!(runs.load(Ordering::SeqCst), 4);
        assert!(shutdown.is_triggered());
    }

    #[tokio::test]
    async fn stops_once_shutdown_is_requested() {
        let shutdown = Shutdown::new();
        let runs = AtomicU32::new(0);
        let counter = &runs;
        let stopper = shutdown.clone();

        let result = supervise("test", Duration::from_millis(1), &fast(), &shutdown, || {
            let stopper = stopper.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) == 2 {
                    stopper.trigger();
                }
                Ok::<_, TestError>(())
            }
        })
        .await;

        assert!(result.is_ok());
        assert_eq!(runs.load(Ordering::SeqCst), 3);
    }
}
