//! Self-correcting periodic timer.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::error;

use crate::error::Result;

/// Delay before the next tick: the nominal interval minus the time the last
/// invocation took, floored at zero. Slow invocations therefore do not
/// accumulate drift.
pub fn next_delay(interval: Duration, elapsed: Duration) -> Duration {
    interval.saturating_sub(elapsed)
}

/// Calls a function at a fixed nominal interval on its own task.
pub struct RepeatingTimer {
    interval: Duration,
    cancel: CancellationToken,
}

impl RepeatingTimer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            cancel: CancellationToken::new(),
        }
    }

    /// Starts ticking. The first call happens one interval after spawn.
    /// Errors and panics from `tick` are logged and do not stop the timer.
    pub fn spawn<F>(&self, mut tick: F) -> JoinHandle<()>
    where
        F: FnMut() -> Result<()> + Send + 'static,
    {
        let interval = self.interval;
        let cancel = self.cancel.clone();

        tokio::spawn(async move {
            let mut wait = interval;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(wait) => {}
                }

                let started = Instant::now();
                match catch_unwind(AssertUnwindSafe(&mut tick)) {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => error!("timer: {}", e),
                    Err(_) => error!("timer: tick panicked"),
                }

                if cancel.is_cancelled() {
                    break;
                }
                wait = next_delay(interval, started.elapsed());
            }
        })
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}
