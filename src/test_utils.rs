use crate::config::BanConfig;
use crate::database::device_attempt::DeviceAttemptRepository;
use crate::error::app_error::AppError;
use crate::models::device_attempt::{DeviceAttempt, FailureRecord};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;

/// In-memory attempt store mirroring the Postgres upsert semantics, used in
/// place of a live database in unit and route tests.
#[derive(Default)]
pub struct MemoryRepository {
    rows: Mutex<HashMap<String, DeviceAttempt>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a banned row directly, bypassing the failure path.
    pub async fn insert_banned(&self, fingerprint: &str, failed_attempts: i32, banned_until: DateTime<Utc>) {
        let now = Utc::now();
        let attempt = DeviceAttempt {
            fingerprint: fingerprint.to_string(),
            failed_attempts,
            is_banned: true,
            banned_at: Some(banned_until - Duration::minutes(15)),
            banned_until: Some(banned_until),
            last_attempt_at: now,
            created_at: now,
            updated_at: now,
        };
        self.rows.lock().await.insert(fingerprint.to_string(), attempt);
    }
}

#[async_trait::async_trait]
impl DeviceAttemptRepository for MemoryRepository {
    async fn record_failure(&self, fingerprint: &str, config: &BanConfig) -> Result<FailureRecord, AppError> {
        let now = Utc::now();
        let mut rows = self.rows.lock().await;
        let attempt = rows.entry(fingerprint.to_string()).or_insert_with(|| DeviceAttempt {
            fingerprint: fingerprint.to_string(),
            failed_attempts: 0,
            is_banned: false,
            banned_at: None,
            banned_until: None,
            last_attempt_at: now,
            created_at: now,
            updated_at: now,
        });

        let mut newly_banned = false;
        if !attempt.is_banned {
            attempt.failed_attempts += 1;
            attempt.last_attempt_at = now;
            if attempt.failed_attempts >= config.max_failed_attempts {
                attempt.is_banned = true;
                attempt.banned_at = Some(now);
                attempt.banned_until = Some(now + Duration::minutes(config.ban_duration_minutes));
                newly_banned = true;
            }
        }
        attempt.updated_at = now;

        Ok(FailureRecord {
            attempt: attempt.clone(),
            newly_banned,
        })
    }

    async fn get_details(&self, fingerprint: &str) -> Result<Option<DeviceAttempt>, AppError> {
        Ok(self.rows.lock().await.get(fingerprint).cloned())
    }

    async fn reset_if_expired(&self, fingerprint: &str) -> Result<Option<DeviceAttempt>, AppError> {
        let now = Utc::now();
        let mut rows = self.rows.lock().await;

        if let Some(attempt) = rows.get_mut(fingerprint) {
            let expired = attempt.is_banned && attempt.banned_until.map(|until| until <= now).unwrap_or(false);
            if expired {
                attempt.failed_attempts = 0;
                attempt.is_banned = false;
                attempt.banned_at = None;
                attempt.banned_until = None;
                attempt.updated_at = now;
            }
            return Ok(Some(attempt.clone()));
        }

        Ok(None)
    }
}
