//! Concurrency cap for one class of outbound work

use std::future::Future;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Caps how many operations of one kind run at once
///
/// A capacity of zero means no cap at all: `acquire` never waits.
#[derive(Debug, Clone)]
pub enum Limiter {
    Uncapped,
    Capped {
        semaphore: Arc<Semaphore>,
        capacity: usize,
    },
}

/// Held while a limited operation runs; dropping it frees the slot
#[derive(Debug)]
pub struct LimiterPermit {
    _permit: Option<OwnedSemaphorePermit>,
}

impl Limiter {
    pub fn new(capacity: u32) -> Self {
        match capacity {
            0 => Self::Uncapped,
            n => Self::Capped {
                semaphore: Arc::new(Semaphore::new(n as usize)),
                capacity: n as usize,
            },
        }
    }

    /// Waits for a free slot
    pub async fn acquire(&self) -> LimiterPermit {
        let permit = match self {
            Self::Uncapped => None,
            // The semaphore is never closed, so acquisition cannot fail
            Self::Capped { semaphore, .. } => semaphore.clone().acquire_owned().await.ok(),
        };
        LimiterPermit { _permit: permit }
    }

    /// Runs `operation` while holding a slot
    pub async fn run<F: Future>(&self, operation: F) -> F::Output {
        let _permit = self.acquire().await;
        operation.await
    }

    /// Configured cap, `None` when uncapped
    pub fn capacity(&self) -> Option<usize> {
        match self {
            Self::Uncapped => None,
            Self::Capped { capacity, .. } => Some(*capacity),
        }
    }

    /// Slots free right now, `None` when uncapped
    pub fn available(&self) -> Option<usize> {
        match self {
            Self::Uncapped => None,
            Self::Capped { semaphore, .. } => Some(semaphore.available_permits()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_is_uncapped() {
        let limiter = Limiter::new(0);
        assert_eq!(limiter.capacity(), None);
        assert_eq!(limiter.available(), None);
    }

    #[tokio::test]
    async fn test_permit_release() {
        let limiter = Limiter::new(2);

        let first = limiter.acquire().await;
        let _second = limiter.acquire().await;
        assert_eq!(limiter.available(), Some(0));

        drop(first);
        assert_eq!(limiter.available(), Some(1));
    }

    #[tokio::test]
    async fn test_uncapped_never_blocks() {
        let limiter = Limiter::new(0);
        let permits: Vec<_> = acquire_many(&limiter, 1000).await;
        assert_eq!(permits.len(), 1000);
    }

    async fn acquire_many(limiter: &Limiter, n: usize) -> Vec<LimiterPermit> {
        let mut permits = Vec::with_capacity(n);
        for _ in 0..n {
            permits.push(limiter.acquire().await);
        }
        permits
    }

    #[tokio::test]
    async fn test_run_releases_on_completion() {
        let limiter = Limiter::new(1);
        let value = limiter.run(async { 7 }).await;

        assert_eq!(value, 7);
        assert_eq!(limiter.available(), Some(1));
    }
}
