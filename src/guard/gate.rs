//! Serialized execution for drivers that cannot overlap queries on one session.
//!
//! A request waits for the gate up to a bounded time, then proceeds without it
//! rather than deadlocking. After the query completes the holder keeps the gate
//! for a short settle delay so the driver can tear down its query context.
//! Release is tied to the permit's `Drop`, so a cancelled request frees the gate.

use std::future::Future;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{Instant, sleep, timeout};
use tracing::{debug, warn};

/// Cooperative lock gating query execution for one repository.
#[derive(Debug)]
pub struct ExecutionGate {
    lock: Mutex<()>,
    max_wait: Duration,
    settle_delay: Duration,
}

impl ExecutionGate {
    pub fn new(max_wait: Duration, settle_delay: Duration) -> Self {
        Self {
            lock: Mutex::new(()),
            max_wait,
            settle_delay,
        }
    }

    /// Build a gate whose maximum wait is `poll_interval * max_polls`.
    pub fn from_polling(poll_interval: Duration, max_polls: u32, settle_delay: Duration) -> Self {
        Self::new(poll_interval.saturating_mul(max_polls), settle_delay)
    }

    pub fn max_wait(&self) -> Duration {
        self.max_wait
    }

    pub fn settle_delay(&self) -> Duration {
        self.settle_delay
    }

    /// Run `work` while holding the gate, waiting at most `max_wait` for it.
    pub async fn run<F, T>(&self, work: F) -> T
    where
        F: Future<Output = T>,
    {
        let started = Instant::now();
        if self.is_busy() {
            debug!("Execution gate busy, waiting");
        }
        let permit = match timeout(self.max_wait, self.lock.lock()).await {
            Ok(guard) => Some(guard),
            Err(_) => {
                warn!(
                    waited_ms = started.elapsed().as_millis() as u64,
                    "Execution gate wait exceeded, proceeding without it"
                );
                None
            }
        };
        if permit.is_some() {
            debug!(
                waited_ms = started.elapsed().as_millis() as u64,
                "Execution gate acquired"
            );
        }

        let output = work.await;

        if !self.settle_delay.is_zero() {
            sleep(self.settle_delay).await;
        }
        drop(permit);
        output
    }

    /// Whether the gate is currently held by another request.
    fn is_busy(&self) -> bool {
        self.lock.try_lock().is_err()
    }
}
