//! TTL-based release of abandoned reservations
//!
//! The `ReservationReaper` runs as a background task and periodically
//! releases reservations that have been open longer than the configured TTL,
//! returning the held funds to `main`.

use std::sync::Arc;
use std::time::Duration;

use core_kernel::OperationMetadata;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::engine::LedgerEngine;
use crate::error::LedgerError;

pub struct ReservationReaper {
    engine: Arc<LedgerEngine>,
    ttl: Duration,
    interval: Duration,
}

impl ReservationReaper {
    /// Creates a reaper that checks once a minute
    pub fn new(engine: Arc<LedgerEngine>, ttl: Duration) -> Self {
        Self {
            engine,
            ttl,
            interval: Duration::from_secs(60),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Spawns the reaper as a background task
    ///
    /// Returns a handle that can be used to abort the task.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                interval.tick().await;

                match self.run_once().await {
                    Ok(count) if count > 0 => {
                        info!(released = count, ttl_secs = self.ttl.as_secs(), "Reaper released expired reservations");
                    }
                    Ok(_) => {}
                    Err(e @ LedgerError::Inconsistent { .. }) => {
                        error!(error = %e, "Reaper left an inconsistent reservation");
                    }
                    Err(e) => {
                        warn!(error = %e, "Reaper failed to release expired reservations");
                    }
                }
            }
        })
    }

    /// Runs one sweep
    pub async fn run_once(&self) -> Result<usize, LedgerError> {
        let meta = OperationMetadata::with_correlation_id("reservation-reaper");
        self.engine.release_expired(self.ttl, &meta).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemoryLedgerStore;
    use crate::config::LedgerConfig;

    #[tokio::test]
    async fn test_reaper_with_custom_interval() {
        let engine = Arc::new(LedgerEngine::new(Arc::new(InMemoryLedgerStore::new()), LedgerConfig::default()));
        let reaper = ReservationReaper::new(engine, Duration::from_secs(3600))
            .with_interval(Duration::from_secs(5));
        assert_eq!(reaper.interval, Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_reaper_spawn_and_abort() {
        let engine = Arc::new(LedgerEngine::new(Arc::new(InMemoryLedgerStore::new()), LedgerConfig::default()));
        let handle = ReservationReaper::new(engine, Duration::from_secs(1))
            .with_interval(Duration::from_millis(10))
            .spawn();

        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.abort();
        assert!(handle.await.unwrap_err().is_cancelled());
    }
}
