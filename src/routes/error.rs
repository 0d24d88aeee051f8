use crate::error::app_error::AppError;
use crate::middleware::ban_gate::BanExpiry;
use crate::middleware::rate_limit::RateLimitRetryAfter;
use rocket::http::{ContentType, Header, Status};
use rocket::response::{Redirect, Responder};
use rocket::serde::Serialize;
use rocket::serde::json::Json;
use rocket::{Request, Response, catch};
use std::io::Cursor;

#[derive(Serialize)]
#[serde(crate = "rocket::serde")]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[catch(404)]
pub fn not_found(_: &Request) -> Json<ErrorBody> {
    Json(ErrorBody {
        code: "NOT_FOUND".to_string(),
        message: "Not found".to_string(),
    })
}

#[catch(422)]
pub fn unprocessable(_: &Request) -> Json<ErrorBody> {
    Json(ErrorBody {
        code: "MALFORMED_BODY".to_string(),
        message: "Request body could not be parsed".to_string(),
    })
}

/// 403 on API paths: structured JSON with a stable code, carrying the ban
/// expiry the gate stashed on rejection.
#[catch(403)]
pub fn banned_api(req: &Request) -> AppError {
    let banned_until = req.local_cache(|| None::<BanExpiry>).as_ref().and_then(|expiry| expiry.0);
    AppError::DeviceBanned { banned_until }
}

/// 403 outside the API scope: send the client to the informational route.
#[catch(403)]
pub fn banned_redirect(_: &Request) -> Redirect {
    Redirect::to("/banned")
}

pub struct TooManyRequestsResponse {
    retry_after: u64,
}

impl<'r> Responder<'r, 'static> for TooManyRequestsResponse {
    fn respond_to(self, _: &Request<'_>) -> rocket::response::Result<'static> {
        let body = serde_json::json!({
            "code": "RATE_LIMITED",
            "message": "Too many requests",
        })
        .to_string();

        Response::build()
            .status(Status::TooManyRequests)
            .header(ContentType::JSON)
            .header(Header::new("Retry-After", self.retry_after.to_string()))
            .sized_body(body.len(), Cursor::new(body))
            .ok()
    }
}

#[catch(429)]
pub fn too_many_requests(req: &Request) -> TooManyRequestsResponse {
    let retry_after = req
        .local_cache(|| None::<RateLimitRetryAfter>)
        .as_ref()
        .map(|r| r.0)
        .unwrap_or(60);

    TooManyRequestsResponse { retry_after }
}
