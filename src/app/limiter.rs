//! FIFO concurrency limiter for transaction execution.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;

use crate::domain::ConfigError;

/// Bounds the number of futures running at once. Waiters are admitted in
/// the order they started waiting.
#[derive(Debug, Clone)]
pub struct ConcurrencyLimiter {
    semaphore: Arc<Semaphore>,
    max_concurrency: usize,
}

impl ConcurrencyLimiter {
    pub fn new(max_concurrency: usize) -> Result<Self, ConfigError> {
        if max_concurrency == 0 || max_concurrency > Semaphore::MAX_PERMITS {
            return Err(ConfigError::InvalidMaxConcurrency(max_concurrency));
        }
        Ok(Self {
            semaphore: Arc::new(Semaphore::new(max_concurrency)),
            max_concurrency,
        })
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Number of futures currently holding a slot
    pub fn in_flight(&self) -> usize {
        self.max_concurrency - self.semaphore.available_permits()
    }

    /// Wait for a free slot, then run `future` while holding it.
    /// The slot is released when the future completes or is dropped.
    pub async fn run<F, T>(&self, future: F) -> T
    where
        F: Future<Output = T>,
    {
        // The semaphore is never closed, so acquiring only waits.
        let _permit = self.semaphore.acquire().await.ok();
        future.await
    }
}
