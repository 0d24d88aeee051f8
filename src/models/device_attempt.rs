use crate::fingerprint::DeviceDescriptor;
use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Persistent failure/ban record for one fingerprint.
///
/// `is_banned == true` implies `banned_until` was in the future when the ban
/// was issued. Expiry is applied lazily on the read path; rows are reset in
/// place and never hard-deleted by this mechanism.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct DeviceAttempt {
    pub fingerprint: String,
    pub failed_attempts: i32,
    pub is_banned: bool,
    pub banned_at: Option<DateTime<Utc>>,
    pub banned_until: Option<DateTime<Utc>>,
    pub last_attempt_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Outcome of recording one failure. `newly_banned` is true only when this
/// call crossed the ban threshold, so callers can branch on the transition.
#[derive(Debug, Clone)]
pub struct FailureRecord {
    pub attempt: DeviceAttempt,
    pub newly_banned: bool,
}

#[derive(Debug, Deserialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeviceCheckRequest {
    #[validate(nested)]
    pub device_data: Option<DeviceDescriptor>,
}

#[derive(Debug, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BanStatusResponse {
    pub is_banned: bool,
    pub failed_attempts: i32,
    pub banned_until: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FailureReportResponse {
    pub failed_attempts: i32,
    pub is_banned: bool,
    pub banned_until: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_check_request_accepts_missing_device_data() {
        let request: DeviceCheckRequest = serde_json::from_str("{}").expect("valid json");
        assert!(request.device_data.is_none());
    }

    #[test]
    fn device_check_request_parses_camel_case_fields() {
        let request: DeviceCheckRequest = serde_json::from_str(
            r#"{"deviceData": {"language": "vi-VN", "screenResolution": "1920x1080", "cookieEnabled": true}}"#,
        )
        .expect("valid json");

        let data = request.device_data.expect("device data present");
        assert_eq!(data.language.as_deref(), Some("vi-VN"));
        assert_eq!(data.screen_resolution.as_deref(), Some("1920x1080"));
        assert_eq!(data.cookie_enabled, Some(true));
        assert!(data.canvas.is_none());
    }

    #[test]
    fn ban_status_response_serializes_camel_case() {
        let response = BanStatusResponse {
            is_banned: true,
            failed_attempts: 5,
            banned_until: None,
        };
        let json = serde_json::to_value(&response).expect("serializable");
        assert_eq!(json["isBanned"], true);
        assert_eq!(json["failedAttempts"], 5);
        assert!(json["bannedUntil"].is_null());
    }
}
