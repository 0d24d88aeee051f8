use crate::middleware::ban_gate::BanGate;
use crate::middleware::rate_limit::{RateLimit, SlidingWindowLimiter};
use rocket::serde::json::Json;
use rocket::{State, get};
use rocket_okapi::openapi;
use schemars::JsonSchema;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Serialize, JsonSchema)]
pub struct OnlineResponse {
    pub online: u64,
}

/// Online users counter proxy
///
/// Approximated as the number of distinct client buckets with in-window
/// activity; the value is memoized with a short TTL. Admission is guarded by
/// the per-IP sliding window, so a single client cannot hammer this path.
#[openapi(tag = "Online")]
#[get("/")]
pub async fn get_online(
    limiter: &State<Arc<SlidingWindowLimiter>>,
    _gate: BanGate,
    _rate_limit: RateLimit,
) -> Json<OnlineResponse> {
    Json(OnlineResponse {
        online: limiter.active_buckets().await as u64,
    })
}

pub fn routes() -> (Vec<rocket::Route>, okapi::openapi3::OpenApi) {
    rocket_okapi::openapi_get_routes_spec![get_online]
}

#[cfg(test)]
mod tests {
    use crate::config::RateLimitConfig;
    use crate::middleware::rate_limit::SlidingWindowLimiter;
    use crate::routes::error::too_many_requests;
    use rocket::catchers;
    use rocket::http::{ContentType, Header, Status};
    use rocket::local::asynchronous::Client;
    use std::sync::Arc;

    fn limiter(max_requests: usize) -> Arc<SlidingWindowLimiter> {
        Arc::new(SlidingWindowLimiter::new(&RateLimitConfig {
            window_seconds: 60,
            max_requests,
            prune_threshold: 1024,
            online_cache_seconds: 0,
        }))
    }

    async fn test_client(max_requests: usize) -> Client {
        let (routes, _) = super::routes();
        let rocket = rocket::build()
            .manage(limiter(max_requests))
            .mount("/api/online", routes)
            .register("/api", catchers![too_many_requests]);
        Client::tracked(rocket).await.expect("valid rocket instance")
    }

    #[rocket::async_test]
    async fn counts_active_buckets() {
        let client = test_client(10).await;

        let response = client
            .get("/api/online")
            .header(Header::new("X-Forwarded-For", "1.2.3.4"))
            .dispatch()
            .await;

        assert_eq!(response.status(), Status::Ok);
        let body: serde_json::Value = response.into_json().await.expect("json body");
        assert_eq!(body["online"], 1);
    }

    #[rocket::async_test]
    async fn over_limit_answers_429_with_retry_after() {
        let client = test_client(1).await;

        let first = client
            .get("/api/online")
            .header(Header::new("X-Forwarded-For", "1.2.3.4"))
            .dispatch()
            .await;
        assert_eq!(first.status(), Status::Ok);

        let second = client
            .get("/api/online")
            .header(Header::new("X-Forwarded-For", "1.2.3.4"))
            .dispatch()
            .await;

        assert_eq!(second.status(), Status::TooManyRequests);
        assert!(second.headers().get_one("Retry-After").is_some());
        assert_eq!(second.content_type(), Some(ContentType::JSON));
    }

    #[rocket::async_test]
    async fn unattributable_traffic_shares_one_bucket() {
        let client = test_client(1).await;

        assert_eq!(client.get("/api/online").dispatch().await.status(), Status::Ok);
        // No forwarding headers at all: both requests land in "unknown".
        assert_eq!(client.get("/api/online").dispatch().await.status(), Status::TooManyRequests);
    }
}
