pub mod cache;
pub mod rate_limit;

pub use cache::{Cache, CacheCounter, MemoryCache};
pub use rate_limit::{RateLimitDecision, RateLimitPolicy, RateLimiter};
