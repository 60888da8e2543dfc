//! Per-IP fixed-window rate limiting.
//!
//! Buckets are spread over mutex-guarded shards keyed by a hash of the client
//! IP. A shard that reaches its bucket cap drops expired buckets first, then
//! the bucket closest to reset.

use crate::error::HttpAppError;
use crate::utils::ip_extraction::client_ip_of;
use axum::{
    extract::{Request, State},
    http::HeaderValue,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::{Duration, Instant};
use streamhub_core::AppError;
use tokio::sync::Mutex;

#[derive(Clone)]
struct RateLimitBucket {
    count: u32,
    reset_at: Instant,
}

impl RateLimitBucket {
    fn new(window: Duration) -> Self {
        Self {
            count: 0,
            reset_at: Instant::now() + window,
        }
    }

    fn check_and_increment(&mut self, limit: u32, window: Duration) -> (bool, u32) {
        let now = Instant::now();

        if now >= self.reset_at {
            self.count = 0;
            self.reset_at = now + window;
        }

        if self.count < limit {
            self.count += 1;
            (true, limit.saturating_sub(self.count))
        } else {
            (false, 0)
        }
    }

    fn reset_in(&self) -> Duration {
        self.reset_at.saturating_duration_since(Instant::now())
    }
}

#[derive(Clone)]
pub struct HttpRateLimiter {
    shards: Vec<Arc<Mutex<HashMap<String, RateLimitBucket>>>>,
    limit: u32,
    window: Duration,
    trusted_proxy_count: usize,
    max_buckets: usize,
}

impl HttpRateLimiter {
    /// `limit` requests per `window_secs`, per client IP.
    pub fn with_shards(
        limit: u32,
        window_secs: u64,
        shard_count: usize,
        trusted_proxy_count: usize,
    ) -> Self {
        let shard_count = shard_count.max(1);
        let shards = (0..shard_count)
            .map(|_| Arc::new(Mutex::new(HashMap::new())))
            .collect();
        Self {
            shards,
            limit,
            window: Duration::from_secs(window_secs.max(1)),
            trusted_proxy_count,
            max_buckets: 10_000,
        }
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    fn shard_index(&self, key: &str) -> usize {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() as usize) % self.shards.len()
    }

    /// Counts one request for `key`. `Ok(remaining)` when admitted, otherwise
    /// `Err(time until the window resets)`.
    pub async fn check_rate_limit(&self, key: &str) -> Result<u32, Duration> {
        let shard_index = self.shard_index(key);
        let mut buckets = self.shards[shard_index].lock().await;

        if buckets.len() >= self.max_buckets && !buckets.contains_key(key) {
            let now = Instant::now();
            buckets.retain(|_, bucket| bucket.reset_at > now);

            if buckets.len() >= self.max_buckets {
                let oldest_key = buckets
                    .iter()
                    .min_by_key(|(_, bucket)| bucket.reset_at)
                    .map(|(k, _)| k.clone());

                if let Some(key_to_remove) = oldest_key {
                    buckets.remove(&key_to_remove);
                    tracing::debug!(
                        shard_index,
                        remaining_buckets = buckets.len(),
                        "Evicted oldest rate limit bucket due to capacity limit"
                    );
                }
            }
        }

        let window = self.window;
        let bucket = buckets
            .entry(key.to_string())
            .or_insert_with(|| RateLimitBucket::new(window));

        let (allowed, remaining) = bucket.check_and_increment(self.limit, window);
        if allowed {
            Ok(remaining)
        } else {
            Err(bucket.reset_in())
        }
    }
}

fn set_header(response: &mut Response, name: &'static str, value: impl ToString) {
    if let Ok(header_value) = HeaderValue::from_str(&value.to_string()) {
        response.headers_mut().insert(name, header_value);
    }
}

pub async fn rate_limit_middleware(
    State(rate_limiter): State<Arc<HttpRateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    let ip = client_ip_of(&request, rate_limiter.trusted_proxy_count);
    let key = format!("ip:{}", ip);
    let limit = rate_limiter.limit();

    match rate_limiter.check_rate_limit(&key).await {
        Ok(remaining) => {
            let mut response = next.run(request).await;
            set_header(&mut response, "X-RateLimit-Limit", limit);
            set_header(&mut response, "X-RateLimit-Remaining", remaining);
            response
        }
        Err(reset_in) => {
            let retry_after_secs = reset_in.as_secs().max(1);
            tracing::warn!(
                client_ip = %ip,
                path = %request.uri().path(),
                limit,
                retry_after_secs,
                "Rate limit exceeded"
            );

            let mut response =
                HttpAppError(AppError::RateLimited { retry_after_secs }).into_response();
            set_header(&mut response, "X-RateLimit-Limit", limit);
            set_header(&mut response, "X-RateLimit-Remaining", 0);
            response
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn admits_up_to_the_limit_then_rejects() {
        let limiter = HttpRateLimiter::with_shards(3, 900, 4, 0);
        assert_eq!(limiter.check_rate_limit("ip:1.1.1.1").await, Ok(2));
        assert_eq!(limiter.check_rate_limit("ip:1.1.1.1").await, Ok(1));
        assert_eq!(limiter.check_rate_limit("ip:1.1.1.1").await, Ok(0));

        let reset_in = limiter.check_rate_limit("ip:1.1.1.1").await.unwrap_err();
        assert!(reset_in <= Duration::from_secs(900));
        assert!(reset_in > Duration::from_secs(890));
    }

    #[tokio::test]
    async fn clients_are_counted_separately() {
        let limiter = HttpRateLimiter::with_shards(1, 60, 2, 0);
        assert!(limiter.check_rate_limit("ip:1.1.1.1").await.is_ok());
        assert!(limiter.check_rate_limit("ip:2.2.2.2").await.is_ok());
        assert!(limiter.check_rate_limit("ip:1.1.1.1").await.is_err());
    }

    #[test]
    fn bucket_resets_after_the_window() {
        let mut bucket = RateLimitBucket {
            count: 5,
            reset_at: Instant::now() - Duration::from_secs(1),
        };
        let (allowed, remaining) = bucket.check_and_increment(5, Duration::from_secs(60));
        assert!(allowed);
        assert_eq!(remaining, 4);
    }

    #[tokio::test]
    async fn full_shard_evicts_to_admit_new_clients() {
        let mut limiter = HttpRateLimiter::with_shards(10, 60, 1, 0);
        limiter.max_buckets = 2;
        assert!(limiter.check_rate_limit("a").await.is_ok());
        assert!(limiter.check_rate_limit("b").await.is_ok());
        assert!(limiter.check_rate_limit("c").await.is_ok());
        assert_eq!(limiter.shards[0].lock().await.len(), 2);
    }
}
