use anyhow::Result;

use crate::config::rate_limits::{current_window, AuthAction, AUTH_WINDOW_SECONDS};
use crate::infra::cache::RedisCache;

pub struct RateLimitInfo {
    pub limited: bool,
    pub limit: u32,
    pub remaining: u32,
}

#[derive(Clone)]
pub struct RateLimiter {
    cache: RedisCache,
    attempts_per_window: u32,
}

impl RateLimiter {
    pub fn new(cache: RedisCache, attempts_per_window: u32) -> Self {
        Self {
            cache,
            attempts_per_window,
        }
    }

    /// Counts one attempt of `action` from `ip` and reports whether the
    /// window budget is exhausted.
    pub async fn hit_ip(&self, ip: &str, action: AuthAction) -> Result<RateLimitInfo> {
        let window_seconds = AUTH_WINDOW_SECONDS;
        let key = format!(
            "ratelimit:ip:{}:{}:{}",
            ip,
            action.as_key(),
            current_window(window_seconds)
        );
        let limit = self.attempts_per_window;

        // INCR is atomic, so the returned count alone decides.
        let count = self.cache.incr_counter(&key, window_seconds).await?;
        if count > limit {
            tracing::debug!(
                ip = ip,
                action = action.as_key(),
                count = count,
                limit = limit,
                "IP rate limit exceeded"
            );
            return Ok(RateLimitInfo {
                limited: true,
                limit,
                remaining: 0,
            });
        }

        Ok(RateLimitInfo {
            limited: false,
            limit,
            remaining: limit - count,
        })
    }
}
