//! Outbound rate limiting

mod limiter;

pub use limiter::RateLimiter;
