use crate::db::AttemptStore;
use crate::error::app_error::AppError;
use crate::middleware::ban_gate::BanGate;
use crate::models::device_attempt::BanStatusResponse;
use crate::service::gate::GateService;
use rocket::serde::json::Json;
use rocket::{State, get};
use rocket_okapi::openapi;
use schemars::JsonSchema;
use serde::Serialize;

#[derive(Debug, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BannedInfoResponse {
    pub message: String,
    pub status: Option<BanStatusResponse>,
}

/// Informational ban-state page
///
/// Redirect target for banned devices. The default `/banned` exempt prefix
/// makes the gate short-circuit here so a banned client can always reach
/// it; with a fingerprint it reports the stored state after lazy expiry.
#[openapi(tag = "Device")]
#[get("/?<fingerprint>")]
pub async fn get_banned(
    _gate: BanGate,
    store: &State<AttemptStore>,
    fingerprint: Option<String>,
) -> Result<Json<BannedInfoResponse>, AppError> {
    let status = match fingerprint {
        Some(fp) => Some(GateService::new(store.inner().as_ref()).status(&fp).await?),
        None => None,
    };

    Ok(Json(BannedInfoResponse {
        message: "Access from this device is temporarily restricted after repeated failed attempts.".to_string(),
        status,
    }))
}

pub fn routes() -> (Vec<rocket::Route>, okapi::openapi3::OpenApi) {
    rocket_okapi::openapi_get_routes_spec![get_banned]
}
