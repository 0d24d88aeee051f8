use crate::config::BanConfig;
use crate::db::AttemptStore;
use crate::error::app_error::AppError;
use crate::error::json::JsonBody;
use crate::fingerprint::device_fingerprint;
use crate::middleware::UserAgent;
use crate::middleware::ban_gate::BanGate;
use crate::models::device_attempt::{BanStatusResponse, DeviceCheckRequest, FailureReportResponse};
use crate::service::gate::GateService;
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{State, post};
use rocket_okapi::openapi;
use validator::Validate;

/// Check the ban state for the calling device
///
/// Fingerprints the supplied descriptor and reports the current state after
/// lazy expiry. Does not record a failure. Gated like every non-exempt
/// route; the gate keys on the header fingerprint, a separate identity from
/// the device fingerprint this endpoint reports on.
#[openapi(tag = "Device")]
#[post("/check", data = "<payload>")]
pub async fn post_check(
    _gate: BanGate,
    store: &State<AttemptStore>,
    user_agent: UserAgent,
    payload: JsonBody<DeviceCheckRequest>,
) -> Result<Json<BanStatusResponse>, AppError> {
    payload.validate()?;
    let device_data = payload.device_data.as_ref().ok_or(AppError::MissingDeviceData)?;

    let ua = user_agent.0.unwrap_or_default();
    let fingerprint = device_fingerprint(&ua, device_data);

    let service = GateService::new(store.inner().as_ref());
    Ok(Json(service.status(&fingerprint).await?))
}

/// Report a failed attempt for the calling device
///
/// Increments the failure counter; crossing the ban threshold on this call
/// answers 403 so callers can branch, with the same body shape as a 200.
#[openapi(tag = "Device")]
#[post("/report", data = "<payload>")]
pub async fn post_report(
    _gate: BanGate,
    store: &State<AttemptStore>,
    ban_config: &State<BanConfig>,
    user_agent: UserAgent,
    payload: JsonBody<DeviceCheckRequest>,
) -> Result<(Status, Json<FailureReportResponse>), AppError> {
    payload.validate()?;
    let device_data = payload.device_data.as_ref().ok_or(AppError::MissingDeviceData)?;

    let ua = user_agent.0.unwrap_or_default();
    let fingerprint = device_fingerprint(&ua, device_data);

    let service = GateService::new(store.inner().as_ref());
    let record = service.report_failure(&fingerprint, ban_config).await?;

    let status = if record.newly_banned { Status::Forbidden } else { Status::Ok };
    Ok((
        status,
        Json(FailureReportResponse {
            failed_attempts: record.attempt.failed_attempts,
            is_banned: record.attempt.is_banned,
            banned_until: record.attempt.banned_until,
        }),
    ))
}

pub fn routes() -> (Vec<rocket::Route>, okapi::openapi3::OpenApi) {
    rocket_okapi::openapi_get_routes_spec![post_check, post_report]
}
