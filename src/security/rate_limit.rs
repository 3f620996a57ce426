use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::debug;

use super::cache::{Cache, MemoryCache};
use crate::config::ApiConfig;

/// Named limit applied to one class of routes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub name: &'static str,
    pub limit: u64,
    pub window: Duration,
    pub enabled: bool,
}

impl RateLimitPolicy {
    /// Login, register and refresh. Always enforced.
    pub fn auth(api: &ApiConfig) -> Self {
        Self {
            name: "auth",
            limit: u64::from(api.auth_rate_limit_requests),
            window: Duration::from_secs(api.auth_rate_limit_window_secs),
            enabled: true,
        }
    }

    pub fn api(api: &ApiConfig) -> Self {
        Self {
            name: "api",
            limit: u64::from(api.rate_limit_requests),
            window: Duration::from_secs(api.rate_limit_window_secs),
            enabled: api.enable_rate_limiting,
        }
    }

    pub fn webhook(api: &ApiConfig) -> Self {
        Self {
            name: "webhook",
            limit: u64::from(api.webhook_rate_limit_requests),
            window: Duration::from_secs(60),
            enabled: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u64,
    pub remaining: u64,
    pub reset_in: Duration,
}

impl RateLimitDecision {
    fn unlimited(limit: u64) -> Self {
        Self {
            allowed: true,
            limit,
            remaining: limit,
            reset_in: Duration::ZERO,
        }
    }

    /// Whole seconds for the Retry-After header, never zero
    pub fn retry_after_secs(&self) -> u64 {
        self.reset_in.as_secs().max(1)
    }
}

#[derive(Clone)]
pub struct RateLimiter {
    cache: Arc<dyn Cache>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(Arc::new(MemoryCache::new()))
    }
}

impl RateLimiter {
    pub fn new(cache: Arc<dyn Cache>) -> Self {
        Self { cache }
    }

    pub fn check(&self, policy: &RateLimitPolicy, identifier: &str) -> RateLimitDecision {
        self.check_at(policy, identifier, Instant::now())
    }

    pub fn check_at(&self, policy: &RateLimitPolicy, identifier: &str, now: Instant) -> RateLimitDecision {
        if !policy.enabled || policy.limit == 0 {
            return RateLimitDecision::unlimited(policy.limit);
        }

        let key = format!("rl:{}:{}", policy.name, identifier);
        let counter = self.cache.incr_at(&key, policy.window, now);
        let allowed = counter.count <= policy.limit;

        if !allowed {
            debug!("Rate limit '{}' exceeded for {} ({} hits)", policy.name, identifier, counter.count);
        }

        RateLimitDecision {
            allowed,
            limit: policy.limit,
            remaining: policy.limit.saturating_sub(counter.count),
            reset_in: counter.expires_in,
        }
    }

    pub fn purge_expired(&self) -> usize {
        self.cache.purge_expired()
    }

    pub fn purge_expired_at(&self, now: Instant) -> usize {
        self.cache.purge_expired_at(now)
    }

    /// Periodically drop counters whose window has closed
    pub fn spawn_purge_task(&self, every: Duration) -> JoinHandle<()> {
        let limiter = self.clone();
        let every = every.max(Duration::from_secs(1));

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let removed = limiter.purge_expired();
                if removed > 0 {
                    debug!("Rate limiter purged {} expired counters", removed);
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(limit: u64) -> RateLimitPolicy {
        RateLimitPolicy {
            name: "test",
            limit,
            window: Duration::from_secs(60),
            enabled: true,
        }
    }

    #[test]
    fn blocks_after_limit() {
        let limiter = RateLimiter::default();
        let p = policy(3);
        let t0 = Instant::now();

        let decisions: Vec<_> = (0..4).map(|_| limiter.check_at(&p, "10.0.0.1", t0)).collect();
        assert!(decisions[..3].iter().all(|d| d.allowed));
        assert_eq!(decisions[2].remaining, 0);
        assert!(!decisions[3].allowed);
        assert_eq!(decisions[3].retry_after_secs(), 60);

        // Other clients are unaffected
        assert!(limiter.check_at(&p, "10.0.0.2", t0).allowed);
    }

    #[test]
    fn allows_again_next_window() {
        let limiter = RateLimiter::default();
        let p = policy(1);
        let t0 = Instant::now();
        assert!(limiter.check_at(&p, "a", t0).allowed);
        assert!(!limiter.check_at(&p, "a", t0 + Duration::from_secs(30)).allowed);
        assert!(limiter.check_at(&p, "a", t0 + Duration::from_secs(60)).allowed);
    }

    #[test]
    fn disabled_policy_never_blocks() {
        let limiter = RateLimiter::default();
        let p = RateLimitPolicy { enabled: false, ..policy(1) };
        for _ in 0..10 {
            assert!(limiter.check(&p, "a").allowed);
        }
    }

    #[test]
    fn purge_reclaims_closed_windows() {
        let cache = Arc::new(MemoryCache::new());
        let limiter = RateLimiter::new(cache.clone());
        let p = RateLimitPolicy {
            window: Duration::from_secs(1),
            ..policy(5)
        };
        let t0 = Instant::now();

        for i in 0..10_000 {
            limiter.check_at(&p, &format!("198.51.100.{}:{}", i % 256, i), t0);
        }
        assert_eq!(cache.len(), 10_000);

        let later = t0 + Duration::from_secs(3600);
        limiter.check_at(&p, "fresh", later);
        assert_eq!(limiter.purge_expired_at(later), 10_000);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn purge_task_runs_in_background() {
        let cache = Arc::new(MemoryCache::new());
        let limiter = RateLimiter::new(cache.clone());
        let p = RateLimitPolicy {
            window: Duration::from_millis(10),
            ..policy(5)
        };
        limiter.check(&p, "a");
        limiter.check(&p, "b");
        assert_eq!(cache.len(), 2);

        tokio::time::sleep(Duration::from_millis(20)).await;
        let task = limiter.spawn_purge_task(Duration::from_secs(1));
        // First interval tick fires immediately
        tokio::time::sleep(Duration::from_millis(100)).await;
        task.abort();
        assert!(cache.is_empty());
    }

    #[test]
    fn policies_are_separate_buckets() {
        let limiter = RateLimiter::default();
        let t0 = Instant::now();
        let a = RateLimitPolicy { name: "auth", ..policy(1) };
        let b = RateLimitPolicy { name: "webhook", ..policy(1) };
        assert!(limiter.check_at(&a, "ip", t0).allowed);
        assert!(limiter.check_at(&b, "ip", t0).allowed);
    }
}
