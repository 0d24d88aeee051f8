use crate::middleware::ban_gate::BanGate;
use rocket::get;
use rocket::serde::json::Json;
use rocket_okapi::openapi;
use schemars::JsonSchema;
use serde::Serialize;

#[derive(Debug, Serialize, JsonSchema)]
pub struct HealthResponse {
    pub status: String,
}

/// Exempt by default through `exempt_path_prefixes`, so the gate
/// short-circuits before hashing.
#[openapi(tag = "Health")]
#[get("/")]
pub async fn healthcheck(_gate: BanGate) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

pub fn routes() -> (Vec<rocket::Route>, okapi::openapi3::OpenApi) {
    rocket_okapi::openapi_get_routes_spec![healthcheck]
}
