// SPDX-License-Identifier: PMPL-1.0-or-later
//! Bounded concurrency for domain workers
//!
//! At most `workers` domains are fetched and analyzed at once. Each worker
//! pauses for the configured delay after taking its slot and before touching
//! the archive host.

use crate::error::{Error, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::debug;

/// Semaphore-backed worker pool gate
#[derive(Clone)]
pub struct WorkerLimiter {
    slots: Arc<Semaphore>,
    capacity: usize,
    delay: Duration,
}

impl WorkerLimiter {
    /// A limiter with `capacity` slots (at least one)
    pub fn new(capacity: usize, delay: Duration) -> Self {
        let capacity = capacity.max(1);
        debug!(capacity, delay_ms = delay.as_millis() as u64, "worker limiter initialized");
        Self {
            slots: Arc::new(Semaphore::new(capacity)),
            capacity,
            delay,
        }
    }

    /// Wait for a free slot, then the politeness delay.
    ///
    /// The slot is released when the returned permit is dropped.
    pub async fn acquire(&self) -> Result<WorkerPermit> {
        let permit = Arc::clone(&self.slots)
            .acquire_owned()
            .await
            .map_err(|_| Error::Config("worker pool closed".to_string()))?;

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        debug!(free = self.available(), capacity = self.capacity, "worker slot acquired");
        Ok(WorkerPermit { _slot: permit })
    }

    /// Slots not currently held
    pub fn available(&self) -> usize {
        self.slots.available_permits()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// RAII guard for one worker slot
pub struct WorkerPermit {
    _slot: OwnedSemaphorePermit,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_permits_released_on_drop() {
        let limiter = WorkerLimiter::new(2, Duration::ZERO);
        assert_eq!(limiter.available(), 2);

        let first = limiter.acquire().await.unwrap();
        let second = limiter.acquire().await.unwrap();
        assert_eq!(limiter.available(), 0);

        drop(first);
        assert_eq!(limiter.available(), 1);
        drop(second);
        assert_eq!(limiter.available(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_waits_for_delay() {
        let delay = Duration::from_millis(250);
        let limiter = WorkerLimiter::new(2, delay);

        let start = tokio::time::Instant::now();
        let _first = limiter.acquire().await.unwrap();
        assert!(start.elapsed() >= delay);

        let start = tokio::time::Instant::now();
        let _second = limiter.acquire().await.unwrap();
        assert!(start.elapsed() >= delay);
    }

    #[tokio::test(start_paused = true)]
    async fn test_waiting_worker_starts_after_release_plus_delay() {
        let delay = Duration::from_millis(100);
        let limiter = WorkerLimiter::new(1, delay);
        let held = limiter.acquire().await.unwrap();

        let waiter = {
            let limiter = limiter.clone();
            tokio::spawn(async move {
                let start = tokio::time::Instant::now();
                let _permit = limiter.acquire().await.unwrap();
                start.elapsed()
            })
        };

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(!waiter.is_finished());
        drop(held);

        let waited = waiter.await.unwrap();
        assert!(waited >= Duration::from_millis(500) + delay);
    }

    #[tokio::test]
    async fn test_zero_capacity_means_one() {
        let limiter = WorkerLimiter::new(0, Duration::ZERO);
        assert_eq!(limiter.capacity(), 1);
    }

    #[tokio::test]
    async fn test_concurrency_never_exceeds_capacity() {
        let limiter = WorkerLimiter::new(3, Duration::from_millis(1));
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..12 {
            let limiter = limiter.clone();
            let active = active.clone();
            let peak = peak.clone();
            handles.push(tokio::spawn(async move {
                let _permit = limiter.acquire().await.unwrap();
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                active.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert_eq!(limiter.available(), 3);
    }
}
