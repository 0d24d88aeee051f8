use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::RateLimitConfig;
use crate::middleware::client_ip;
use rocket::http::Status;
use rocket::request::{FromRequest, Outcome, Request};
use rocket_okapi::okapi::openapi3::{RefOr, Response as OpenApiResponse, Responses};
use rocket_okapi::r#gen::OpenApiGenerator;
use rocket_okapi::request::{OpenApiFromRequest, RequestHeaderInput};
use tokio::sync::Mutex;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allow,
    Limited { retry_after: Duration },
}

/// Per-IP sliding-window admission control. Each bucket holds the timestamps
/// of admitted requests in the trailing window; stale entries are dropped
/// lazily on every check. State is process-local: across multiple instances
/// the limit is an approximation, not a guarantee.
#[derive(Debug)]
pub struct SlidingWindowLimiter {
    window: Duration,
    max_requests: usize,
    prune_threshold: usize,
    online_cache_ttl: Duration,
    windows: Mutex<HashMap<String, Vec<Instant>>>,
    online_cache: Mutex<Option<(Instant, usize)>>,
}

impl SlidingWindowLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            window: Duration::from_secs(config.window_seconds.max(1)),
            max_requests: config.max_requests.max(1),
            prune_threshold: config.prune_threshold.max(1),
            online_cache_ttl: Duration::from_secs(config.online_cache_seconds),
            windows: Mutex::new(HashMap::new()),
            online_cache: Mutex::new(None),
        }
    }

    /// Admit or reject one request for `ip`. A rejected request is not
    /// recorded, so it does not extend the caller's own lockout.
    pub async fn check(&self, ip: &str) -> RateDecision {
        let now = Instant::now();
        let mut windows = self.windows.lock().await;

        // Opportunistic cleanup once the map grows past the threshold:
        // drop buckets with no in-window timestamps left.
        if windows.len() > self.prune_threshold {
            let window = self.window;
            windows.retain(|_, stamps| stamps.iter().any(|t| now.duration_since(*t) < window));
        }

        let stamps = windows.entry(ip.to_string()).or_default();
        stamps.retain(|t| now.duration_since(*t) < self.window);

        if stamps.len() >= self.max_requests {
            // The oldest in-window timestamp decides when capacity frees up.
            let oldest = stamps.first().copied().unwrap_or(now);
            let retry_after = self.window.saturating_sub(now.duration_since(oldest));
            return RateDecision::Limited { retry_after };
        }

        stamps.push(now);
        RateDecision::Allow
    }

    /// Number of distinct buckets with in-window activity, memoized for a
    /// short TTL. Backs the online-users counter proxy.
    pub async fn active_buckets(&self) -> usize {
        let now = Instant::now();

        {
            let cache = self.online_cache.lock().await;
            if let Some((cached_at, count)) = *cache {
                if now.duration_since(cached_at) < self.online_cache_ttl {
                    return count;
                }
            }
        }

        let count = {
            let windows = self.windows.lock().await;
            let window = self.window;
            windows
                .values()
                .filter(|stamps| stamps.iter().any(|t| now.duration_since(*t) < window))
                .count()
        };

        *self.online_cache.lock().await = Some((now, count));
        count
    }
}

/// Request guard enforcing the sliding-window limit for the route it guards.
#[derive(Debug, Clone, Copy)]
pub struct RateLimit;

/// Seconds until the window frees capacity; stashed for the 429 catcher.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitRetryAfter(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitError;

#[rocket::async_trait]
impl<'r> FromRequest<'r> for RateLimit {
    type Error = RateLimitError;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let limiter = match request.rocket().state::<Arc<SlidingWindowLimiter>>() {
            Some(limiter) => limiter,
            None => return Outcome::Success(RateLimit),
        };

        let ip = client_ip(request);

        match limiter.check(&ip).await {
            RateDecision::Allow => Outcome::Success(RateLimit),
            RateDecision::Limited { retry_after } => {
                let retry_after_secs = retry_after.as_secs().max(1);
                request.local_cache(|| Some(RateLimitRetryAfter(retry_after_secs)));
                warn!(
                    ip = %ip,
                    method = %request.method(),
                    uri = %request.uri(),
                    retry_after_secs = %retry_after_secs,
                    "rate limit exceeded"
                );
                Outcome::Error((Status::TooManyRequests, RateLimitError))
            }
        }
    }
}

impl<'a> OpenApiFromRequest<'a> for RateLimit {
    fn from_request_input(_gen: &mut OpenApiGenerator, _name: String, _required: bool) -> rocket_okapi::Result<RequestHeaderInput> {
        Ok(RequestHeaderInput::None)
    }

    fn get_responses(_gen: &mut OpenApiGenerator) -> rocket_okapi::Result<Responses> {
        let mut responses = Responses::default();
        responses.responses.insert(
            "429".to_string(),
            RefOr::Object(OpenApiResponse {
                description: "Too Many Requests".to_string(),
                ..Default::default()
            }),
        );
        Ok(responses)
    }
}
