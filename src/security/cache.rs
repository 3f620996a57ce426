use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Counter state after an increment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheCounter {
    pub count: u64,
    pub expires_in: Duration,
}

/// Fixed-window counter store. The TTL is set by the first increment of a window.
pub trait Cache: Send + Sync {
    fn incr_at(&self, key: &str, window: Duration, now: Instant) -> CacheCounter;

    fn incr(&self, key: &str, window: Duration) -> CacheCounter {
        self.incr_at(key, window, Instant::now())
    }

    /// Drop every entry expired at `now`, returning how many were removed
    fn purge_expired_at(&self, now: Instant) -> usize;

    fn purge_expired(&self) -> usize {
        self.purge_expired_at(Instant::now())
    }
}

#[derive(Debug)]
struct Entry {
    count: u64,
    expires_at: Instant,
}

#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Cache for MemoryCache {
    fn incr_at(&self, key: &str, window: Duration, now: Instant) -> CacheCounter {
        let mut entries = self.entries.lock();
        let entry = entries.entry(key.to_string()).or_insert(Entry {
            count: 0,
            expires_at: now + window,
        });

        // Lazy expiry: a stale entry starts a fresh window
        if entry.expires_at <= now {
            entry.count = 0;
            entry.expires_at = now + window;
        }

        entry.count += 1;
        CacheCounter {
            count: entry.count,
            expires_in: entry.expires_at.saturating_duration_since(now),
        }
    }

    fn purge_expired_at(&self, now: Instant) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        before - entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_within_window() {
        let cache = MemoryCache::new();
        let t0 = Instant::now();
        let window = Duration::from_secs(60);

        assert_eq!(cache.incr_at("ip:1", window, t0).count, 1);
        let second = cache.incr_at("ip:1", window, t0 + Duration::from_secs(10));
        assert_eq!(second.count, 2);
        assert_eq!(second.expires_in, Duration::from_secs(50));
        assert_eq!(cache.incr_at("ip:2", window, t0).count, 1);
    }

    #[test]
    fn window_resets_after_expiry() {
        let cache = MemoryCache::new();
        let t0 = Instant::now();
        let window = Duration::from_secs(60);

        cache.incr_at("k", window, t0);
        cache.incr_at("k", window, t0);
        let fresh = cache.incr_at("k", window, t0 + window);
        assert_eq!(fresh.count, 1);
        assert_eq!(fresh.expires_in, window);
    }

    #[test]
    fn purge_removes_only_expired() {
        let cache = MemoryCache::new();
        let t0 = Instant::now();
        cache.incr_at("short", Duration::from_secs(1), t0);
        cache.incr_at("long", Duration::from_secs(600), t0);

        assert_eq!(cache.purge_expired_at(t0 + Duration::from_secs(5)), 1);
        assert_eq!(cache.len(), 1);
    }
}
