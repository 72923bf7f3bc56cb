use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::Duration;

use lru::LruCache;
use tokio::time::Instant;

/// Per-process quiz re-submission limiter.
///
/// Bounded: once `capacity` users are tracked the least recently seen entry
/// is evicted, which may let that user retry early.
pub struct QuizCooldown {
    cooldown: Duration,
    entries: Mutex<LruCache<(String, String), Instant>>,
}

impl QuizCooldown {
    pub fn new(cooldown: Duration, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            cooldown,
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Record an attempt, or return how long the caller must still wait.
    pub fn try_attempt(&self, tenant: &str, user: &str) -> Result<(), Duration> {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let key = (tenant.to_string(), user.to_string());
        let now = Instant::now();

        if let Some(last) = entries.get(&key) {
            let elapsed = now.duration_since(*last);
            if elapsed < self.cooldown {
                return Err(self.cooldown - elapsed);
            }
        }
        entries.put(key, now);
        Ok(())
    }
}

impl Default for QuizCooldown {
    fn default() -> Self {
        Self::new(Duration::from_secs(60), 10_000)
    }
}
