//! Sliding-window rate limiter shared by every consumer of a worker process

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum RateLimiterError {
    #[error("Rate limit must allow at least one acquisition")]
    ZeroLimit,

    #[error("Rate limit window must be longer than zero")]
    ZeroWindow,
}

/// Allows at most `max` acquisitions within any `window`.
pub struct RateLimiter {
    max: usize,
    window: Duration,
    hits: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new(max: usize, window: Duration) -> Result<Self, RateLimiterError> {
        if max == 0 {
            return Err(RateLimiterError::ZeroLimit);
        }
        if window.is_zero() {
            return Err(RateLimiterError::ZeroWindow);
        }
        Ok(Self {
            max,
            window,
            hits: Mutex::new(VecDeque::with_capacity(max)),
        })
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Instant>> {
        self.hits.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Wait for a free slot and take it.
    pub async fn acquire(&self) {
        loop {
            let wait = match self.take_slot(Instant::now()) {
                Ok(()) => return,
                Err(wait) => wait,
            };
            tokio::time::sleep(wait).await;
        }
    }

    /// Take a slot if one is free right now.
    pub fn try_acquire(&self) -> bool {
        self.take_slot(Instant::now()).is_ok()
    }

    /// Records `now` when a slot is free, otherwise returns how long until
    /// the oldest acquisition leaves the window.
    fn take_slot(&self, now: Instant) -> Result<(), Duration> {
        let mut hits = self.lock();
        while let Some(oldest) = hits.front() {
            if now.duration_since(*oldest) >= self.window {
                hits.pop_front();
            } else {
                break;
            }
        }

        if hits.len() < self.max {
            hits.push_back(now);
            return Ok(());
        }
        let oldest = hits.front().copied().unwrap_or(now);
        Err((oldest + self.window).saturating_duration_since(now))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn test_rejects_degenerate_limits() {
        assert_eq!(
            RateLimiter::new(0, Duration::from_secs(1)).err(),
            Some(RateLimiterError::ZeroLimit)
        );
        assert_eq!(
            RateLimiter::new(1, Duration::ZERO).err(),
            Some(RateLimiterError::ZeroWindow)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_tenth_acquisition_waits_three_windows() {
        let limiter = RateLimiter::new(3, Duration::from_secs(1)).unwrap();
        let start = Instant::now();

        let mut started = Vec::new();
        for _ in 0..10 {
            limiter.acquire().await;
            started.push(start.elapsed());
        }

        let tenth = started[9];
        assert!(tenth >= Duration::from_secs(3), "{:?}", tenth);
        assert!(tenth < Duration::from_secs(4), "{:?}", tenth);
        assert!(started[2] < Duration::from_secs(1));
        assert!(started[3] >= Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_try_acquire_does_not_wait() {
        let limiter = RateLimiter::new(2, Duration::from_secs(1)).unwrap();
        assert!(limiter.try_acquire());
        assert!(limiter.try_acquire());
        assert!(!limiter.try_acquire());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(limiter.try_acquire());
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_acquirers_share_the_window() {
        let limiter = Arc::new(RateLimiter::new(2, Duration::from_secs(1)).unwrap());
        let start = Instant::now();

        let tasks: Vec<_> = (0..6)
            .map(|_| {
                let limiter = limiter.clone();
                tokio::spawn(async move {
                    limiter.acquire().await;
                    start.elapsed()
                })
            })
            .collect();

        let mut elapsed = Vec::new();
        for task in tasks {
            elapsed.push(task.await.unwrap());
        }
        elapsed.sort();
        assert!(elapsed[1] < Duration::from_secs(1));
        assert!(elapsed[5] >= Duration::from_secs(2));
    }
}
