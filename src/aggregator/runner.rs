//! Periodic flush loop

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::Aggregator;
use crate::transport::Transport;

/// Shortest period the loop accepts; smaller values are raised to this
pub const MIN_FLUSH_PERIOD: Duration = Duration::from_millis(1);

/// Longest period the loop accepts; larger values are lowered to this
pub const MAX_FLUSH_PERIOD: Duration = Duration::from_secs(365 * 24 * 60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Running,
    Stopped,
}

/// Handle to a running flush loop.
///
/// Dropping the handle stops the loop, like calling [`stop`](Self::stop).
#[must_use = "dropping the handle stops the flush loop"]
pub struct RunHandle {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl RunHandle {
    /// Ask the loop to exit.
    ///
    /// Takes effect at the next wait point: a flush already in progress
    /// completes first. Anything still buffered stays in the aggregator;
    /// flush explicitly afterwards if it must be delivered.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Token that stops this loop when cancelled, for use by other tasks
    pub fn stop_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn state(&self) -> RunState {
        let finished = self.task.as_ref().map_or(true, |t| t.is_finished());
        if self.cancel.is_cancelled() || finished {
            RunState::Stopped
        } else {
            RunState::Running
        }
    }

    /// Stop the loop and wait for it to exit
    pub async fn shutdown(self) {
        self.stop();
        self.join().await;
    }

    /// Wait for the loop to exit without stopping it; pair with
    /// [`stop_token`](Self::stop_token) to stop from elsewhere
    pub async fn join(mut self) {
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                error!(error = %e, "flush loop task failed");
            }
        }
    }
}

impl Drop for RunHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl<T: Transport> Aggregator<T> {
    /// Flush every `period` until stopped.
    ///
    /// The first flush happens one full period after the call. A flush that
    /// fails is followed by one reconnect and one more flush, unless stop was
    /// signaled meanwhile; if that fails too the batch stays buffered for the
    /// next tick. `period` is clamped to
    /// [`MIN_FLUSH_PERIOD`]..=[`MAX_FLUSH_PERIOD`]. Must be called from within
    /// a Tokio runtime.
    pub fn run(&self, period: Duration) -> RunHandle {
        let period = period.clamp(MIN_FLUSH_PERIOD, MAX_FLUSH_PERIOD);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(flush_loop(self.clone(), period, cancel.clone()));
        info!(
            namespace = %self.namespace(),
            period_ms = period.as_millis() as u64,
            "flush loop started"
        );
        RunHandle {
            cancel,
            task: Some(task),
        }
    }
}

async fn flush_loop<T: Transport>(
    aggregator: Aggregator<T>,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let Err(e) = aggregator.flush().await else {
                    continue;
                };
                if cancel.is_cancelled() {
                    warn!(error = %e, "flush failed after stop, not retrying");
                    break;
                }
                warn!(error = %e, "flush failed, reconnecting");
                if let Err(e) = aggregator.retry().await {
                    error!(error = %e, buffered = aggregator.len(), "unable to send metrics");
                }
            }
        }
    }

    info!(namespace = %aggregator.namespace(), "flush loop stopped");
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::transport::SimulatedTransport;

    #[tokio::test(start_paused = true)]
    async fn test_stop_changes_state() {
        let agg = Aggregator::new("", Arc::new(SimulatedTransport::new()));
        let handle = agg.run(Duration::from_secs(1));
        assert_eq!(handle.state(), RunState::Running);

        handle.stop();
        assert_eq!(handle.state(), RunState::Stopped);
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_join_returns_after_external_stop() {
        let agg = Aggregator::new("", Arc::new(SimulatedTransport::new()));
        let handle = agg.run(Duration::from_secs(1));
        let token = handle.stop_token();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(3)).await;
            token.cancel();
        });
        handle.join().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_period_is_clamped() {
        let transport = Arc::new(SimulatedTransport::new());
        let agg = Aggregator::new("", transport.clone());
        agg.increase("a").unwrap();

        let handle = agg.run(Duration::ZERO);
        tokio::time::sleep(Duration::from_millis(5)).await;
        handle.shutdown().await;

        assert!(agg.is_empty());
        assert_eq!(transport.delivered().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_huge_period_is_clamped() {
        let agg = Aggregator::new("", Arc::new(SimulatedTransport::new()));
        agg.increase("a").unwrap();

        let handle = agg.run(Duration::MAX);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(handle.state(), RunState::Running);

        handle.shutdown().await;
        assert_eq!(agg.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_handle_stops_loop() {
        let transport = Arc::new(SimulatedTransport::new());
        let agg = Aggregator::new("", transport.clone());

        drop(agg.run(Duration::from_secs(1)));
        agg.increase("a").unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(transport.send_calls(), 0);
        assert_eq!(agg.len(), 1);
    }
}
