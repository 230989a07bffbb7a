use std::time::Duration;

use tokio::sync::watch;

/// Re-armable single-slot latch: set by the HAL completion path or a forced
/// stop, cleared and awaited by the speech loop.
///
/// Clearing is only valid while nobody is waiting, i.e. right before a new
/// play request is issued.
#[derive(Debug)]
pub struct FinishedSignal {
    tx: watch::Sender<bool>,
}

impl FinishedSignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    pub fn set(&self) {
        self.tx.send_replace(true);
    }

    pub fn clear(&self) {
        self.tx.send_replace(false);
    }

    pub fn is_set(&self) -> bool {
        *self.tx.borrow()
    }

    /// Returns `true` if the latch was set before `timeout` elapsed.
    pub async fn wait_timeout(&self, timeout: Duration) -> bool {
        let mut rx = self.tx.subscribe();
        let woke = matches!(
            tokio::time::timeout(timeout, rx.wait_for(|set| *set)).await,
            Ok(Ok(_))
        );
        woke
    }
}

impl Default for FinishedSignal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn already_set_returns_immediately() {
        let signal = FinishedSignal::new();
        signal.set();
        assert!(signal.wait_timeout(Duration::from_millis(10)).await);
    }

    #[tokio::test]
    async fn times_out_when_never_set() {
        let signal = FinishedSignal::new();
        assert!(!signal.wait_timeout(Duration::from_millis(20)).await);
    }

    #[tokio::test]
    async fn set_from_another_task_wakes_the_waiter() {
        let signal = Arc::new(FinishedSignal::new());
        let setter = signal.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            setter.set();
        });
        assert!(signal.wait_timeout(Duration::from_secs(2)).await);
    }

    #[tokio::test]
    async fn clear_rearms_the_latch() {
        let signal = FinishedSignal::new();
        signal.set();
        signal.clear();
        assert!(!signal.is_set());
        assert!(!signal.wait_timeout(Duration::from_millis(10)).await);
    }
}
