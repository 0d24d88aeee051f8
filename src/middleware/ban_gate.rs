use crate::config::BanConfig;
use crate::db::AttemptStore;
use crate::fingerprint::{HeaderDescriptor, header_fingerprint};
use crate::service::gate::GateService;
use chrono::{DateTime, Utc};
use rocket::http::Status;
use rocket::request::{FromRequest, Outcome, Request};
use rocket_okapi::okapi::openapi3::{RefOr, Response as OpenApiResponse, Responses};
use rocket_okapi::r#gen::OpenApiGenerator;
use rocket_okapi::request::{OpenApiFromRequest, RequestHeaderInput};
use tracing::{error, warn};

/// Exemption check runs before any fingerprinting, so exempt paths never pay
/// the hashing cost.
pub fn is_exempt(path: &str, prefixes: &[String]) -> bool {
    prefixes.iter().any(|prefix| path.starts_with(prefix.as_str()))
}

/// Header-derived descriptor for the gating path. Narrower than the
/// client-supplied descriptor, so its fingerprint is a separate identity.
pub fn descriptor_from_headers(request: &Request<'_>) -> HeaderDescriptor {
    let header = |name: &str| request.headers().get_one(name).map(|v| v.to_string());

    HeaderDescriptor {
        user_agent: header("User-Agent"),
        accept_language: header("Accept-Language"),
        accept_encoding: header("Accept-Encoding"),
        platform_hint: header("Sec-CH-UA-Platform"),
        ua_hint: header("Sec-CH-UA"),
    }
}

/// Request guard denying banned devices. Consults the attempt store with
/// lazy expiry applied; a banned device gets a 403, which the catchers turn
/// into JSON (API paths) or a redirect to the informational route.
#[derive(Debug, Clone, Copy)]
pub struct BanGate;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BanGateError {
    DeviceBanned,
    StoreUnavailable,
}

/// Ban expiry stashed in the request local cache on rejection so the 403
/// catcher can include it in the error body.
#[derive(Debug, Clone, Copy)]
pub struct BanExpiry(pub Option<DateTime<Utc>>);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for BanGate {
    type Error = BanGateError;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let Some(config) = request.rocket().state::<BanConfig>() else {
            return Outcome::Success(BanGate);
        };

        if is_exempt(request.uri().path().as_str(), &config.exempt_path_prefixes) {
            return Outcome::Success(BanGate);
        }

        let Some(store) = request.rocket().state::<AttemptStore>() else {
            return Outcome::Success(BanGate);
        };

        let fingerprint = header_fingerprint(&descriptor_from_headers(request));

        match GateService::new(store.as_ref()).status(&fingerprint).await {
            Ok(status) if !status.is_banned => Outcome::Success(BanGate),
            Ok(status) => {
                warn!(
                    fingerprint = %fingerprint,
                    method = %request.method(),
                    uri = %request.uri(),
                    "banned device rejected"
                );
                request.local_cache(|| Some(BanExpiry(status.banned_until)));
                Outcome::Error((Status::Forbidden, BanGateError::DeviceBanned))
            }
            Err(e) => {
                error!(
                    error = ?e,
                    method = %request.method(),
                    uri = %request.uri(),
                    "attempt store unavailable during ban check"
                );
                Outcome::Error((Status::InternalServerError, BanGateError::StoreUnavailable))
            }
        }
    }
}

impl<'a> OpenApiFromRequest<'a> for BanGate {
    fn from_request_input(_gen: &mut OpenApiGenerator, _name: String, _required: bool) -> rocket_okapi::Result<RequestHeaderInput> {
        Ok(RequestHeaderInput::None)
    }

    fn get_responses(_gen: &mut OpenApiGenerator) -> rocket_okapi::Result<Responses> {
        let mut responses = Responses::default();
        responses.responses.insert(
            "403".to_string(),
            RefOr::Object(OpenApiResponse {
                description: "Forbidden".to_string(),
                ..Default::default()
            }),
        );
        Ok(responses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prefixes() -> Vec<String> {
        vec!["/banned".to_string(), "/api/health".to_string(), "/assets".to_string()]
    }

    #[test]
    fn exact_prefix_match_exempts() {
        assert!(is_exempt("/banned", &prefixes()));
        assert!(is_exempt("/banned/info", &prefixes()));
        assert!(is_exempt("/api/health", &prefixes()));
        assert!(is_exempt("/assets/logo.svg", &prefixes()));
    }

    #[test]
    fn non_exempt_paths_are_gated() {
        assert!(!is_exempt("/api/online", &prefixes()));
        assert!(!is_exempt("/api/device/check", &prefixes()));
        assert!(!is_exempt("/", &prefixes()));
    }

    #[rocket::async_test]
    async fn descriptor_collects_gate_headers() {
        use rocket::http::Header;
        use rocket::local::asynchronous::Client;

        let client = Client::untracked(rocket::build()).await.expect("valid rocket instance");
        let req = client
            .get("/")
            .header(Header::new("User-Agent", "agent"))
            .header(Header::new("Accept-Language", "vi-VN"))
            .header(Header::new("Sec-CH-UA-Platform", "\"Linux\""));

        let descriptor = descriptor_from_headers(req.inner());
        assert_eq!(descriptor.user_agent.as_deref(), Some("agent"));
        assert_eq!(descriptor.accept_language.as_deref(), Some("vi-VN"));
        assert_eq!(descriptor.platform_hint.as_deref(), Some("\"Linux\""));
        assert!(descriptor.accept_encoding.is_none());
    }
}
