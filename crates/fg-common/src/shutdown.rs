use std::time::Duration;

use tokio::sync::watch;

/// Cloneable stop flag shared by the background loops. Loops check it between
/// iterations, so an in-flight transaction always finishes.
#[derive(Debug, Clone)]
pub struct Shutdown {
    sender: watch::Sender<bool>,
    receiver: watch::Receiver<bool>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (sender, receiver) = watch::channel(false);
        Self { sender, receiver }
    }

    pub fn trigger(&self) {
        let _ = self.sender.send(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.receiver.borrow()
    }

    pub async fn wait(&self) {
        let mut receiver = self.receiver.clone();
        while !*receiver.borrow_and_update() {
            if receiver.changed().await.is_err() {
                return;
            }
        }
    }

    /// Sleep for `duration` unless shutdown fires first. Returns `true` when
    /// woken by shutdown.
    pub async fn sleep_or_shutdown(&self, duration: Duration) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(duration) => self.is_triggered(),
            _ = self.wait() => true,
        }
    }

    /// Trigger on SIGINT or SIGTERM.
    pub async fn listen_for_signals(&self) {
        let ctrl_c = async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::warn!(error = %err, "ctrl-c handler unavailable");
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(err) => {
                    tracing::warn!(error = %err, "SIGTERM handler unavailable");
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => tracing::info!(signal = "SIGINT", "shutdown requested"),
            _ = terminate => tracing::info!(signal = "SIGTERM", "shutdown requested"),
            _ = self.wait() => return,
        }
        self.trigger();
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn trigger_wakes_sleepers() {
        let shutdown = Shutdown::new();
        assert!(!shutdown.is_triggered());

        let waiter = shutdown.clone();
        let handle = tokio::spawn(async move { waiter.sleep_or_shutdown(Duration::from_secs(60)).await });
        shutdown.trigger();

        assert!(handle.await.unwrap());
        assert!(shutdown.is_triggered());
    }

    #[tokio::test]
    async fn sleep_elapses_without_trigger() {
        let shutdown = Shutdown::new();
        assert!(!shutdown.sleep_or_shutdown(Duration::from_millis(5)).await);
    }
}
