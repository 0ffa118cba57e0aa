use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::scheduler::job::JobId;
use crate::scheduler::registry::JobRegistry;

/// Periodically moves `queued` jobs onto the bounded work queue.
pub struct Dispatcher {
    registry: Arc<JobRegistry>,
    queue: mpsc::Sender<JobId>,
    interval: Duration,
    shutdown: CancellationToken,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<JobRegistry>,
        queue: mpsc::Sender<JobId>,
        interval: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            registry,
            queue,
            interval,
            shutdown,
        }
    }

    /// Run dispatch cycles until shutdown. Cycle errors are logged and the
    /// next tick tries again.
    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(interval_ms = self.interval.as_millis() as u64, "Dispatcher started");

        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.dispatch_once() {
                        tracing::error!(error = %e, "Dispatch cycle failed");
                    }
                }
            }
        }

        tracing::info!("Dispatcher stopped");
    }

    /// Run a single dispatch cycle and return how many jobs were handed off.
    ///
    /// Queue slots are reserved without waiting, so a full queue ends the
    /// cycle early and the remaining jobs stay `queued` for the next tick.
    /// Jobs stranded by a worker's failed save are re-queued first, so they
    /// are eligible in the same cycle. After shutdown this is a no-op.
    pub fn dispatch_once(&self) -> Result<usize> {
        if self.shutdown.is_cancelled() {
            return Ok(0);
        }

        self.registry.recover_stranded()?;

        let reserved = self
            .registry
            .enqueue_queued(|| self.queue.try_reserve().ok())?;

        let dispatched = reserved.len();
        for (job_id, permit) in reserved {
            permit.send(job_id);
            tracing::debug!(job_id, "Job dispatched");
        }

        if dispatched > 0 {
            tracing::info!(dispatched, "Dispatch cycle complete");
        }
        Ok(dispatched)
    }
}
