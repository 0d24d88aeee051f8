use crate::config::BanConfig;
use crate::database::postgres_repository::PostgresRepository;
use crate::error::app_error::AppError;
use crate::models::device_attempt::{DeviceAttempt, FailureRecord};
use chrono::{Duration, Utc};

/// Durable store keyed by fingerprint. The Postgres implementation performs
/// every mutation as a single conditional statement so concurrent failures
/// from the same device never lose updates.
#[async_trait::async_trait]
pub trait DeviceAttemptRepository: Send + Sync {
    /// Record one failure. Creates the row on first failure; increments only
    /// while the row is not currently banned; crossing the configured
    /// threshold on this call issues a time-boxed ban.
    ///
    /// The ban check reads the stored `is_banned` flag as-is, so an elapsed
    /// but uncleared ban still blocks the increment. Callers that want the
    /// new failure counted run [`reset_if_expired`](Self::reset_if_expired)
    /// first, as `GateService::report_failure` does.
    async fn record_failure(&self, fingerprint: &str, config: &BanConfig) -> Result<FailureRecord, AppError>;

    /// Read the row without mutating it.
    async fn get_details(&self, fingerprint: &str) -> Result<Option<DeviceAttempt>, AppError>;

    /// Lazy expiry: if the ban has elapsed, clear the ban fields and zero the
    /// counter, returning the cleared row. Idempotent; a no-op on rows that
    /// are not banned or still within their ban window.
    async fn reset_if_expired(&self, fingerprint: &str) -> Result<Option<DeviceAttempt>, AppError>;
}

#[derive(sqlx::FromRow)]
struct FailureRow {
    #[sqlx(flatten)]
    attempt: DeviceAttempt,
    newly_banned: bool,
}

#[async_trait::async_trait]
impl DeviceAttemptRepository for PostgresRepository {
    async fn record_failure(&self, fingerprint: &str, config: &BanConfig) -> Result<FailureRecord, AppError> {
        let now = Utc::now();
        let banned_until = now + Duration::minutes(config.ban_duration_minutes);

        // Atomic upsert: the increment and the ban transition are decided in
        // one statement against the stored row, not a value read earlier.
        // `newly_banned` compares banned_at against this call's timestamp.
        let row = sqlx::query_as::<_, FailureRow>(
            r#"
            INSERT INTO device_attempts
                (fingerprint, failed_attempts, is_banned, banned_at, banned_until, last_attempt_at)
            VALUES
                ($1, 1, 1 >= $2,
                 CASE WHEN 1 >= $2 THEN $3 END,
                 CASE WHEN 1 >= $2 THEN $4 END,
                 $3)
            ON CONFLICT (fingerprint) DO UPDATE SET
                failed_attempts = CASE WHEN device_attempts.is_banned
                    THEN device_attempts.failed_attempts
                    ELSE device_attempts.failed_attempts + 1 END,
                is_banned = device_attempts.is_banned
                    OR device_attempts.failed_attempts + 1 >= $2,
                banned_at = CASE WHEN NOT device_attempts.is_banned
                        AND device_attempts.failed_attempts + 1 >= $2
                    THEN $3 ELSE device_attempts.banned_at END,
                banned_until = CASE WHEN NOT device_attempts.is_banned
                        AND device_attempts.failed_attempts + 1 >= $2
                    THEN $4 ELSE device_attempts.banned_until END,
                last_attempt_at = CASE WHEN device_attempts.is_banned
                    THEN device_attempts.last_attempt_at ELSE $3 END,
                updated_at = $3
            RETURNING
                fingerprint, failed_attempts, is_banned, banned_at, banned_until,
                last_attempt_at, created_at, updated_at,
                COALESCE(banned_at = $3, false) AS newly_banned
            "#,
        )
        .bind(fingerprint)
        .bind(config.max_failed_attempts)
        .bind(now)
        .bind(banned_until)
        .fetch_one(&self.pool)
        .await?;

        Ok(FailureRecord {
            attempt: row.attempt,
            newly_banned: row.newly_banned,
        })
    }

    async fn get_details(&self, fingerprint: &str) -> Result<Option<DeviceAttempt>, AppError> {
        let attempt = sqlx::query_as::<_, DeviceAttempt>(
            r#"
            SELECT fingerprint, failed_attempts, is_banned, banned_at, banned_until,
                   last_attempt_at, created_at, updated_at
            FROM device_attempts
            WHERE fingerprint = $1
            "#,
        )
        .bind(fingerprint)
        .fetch_optional(&self.pool)
        .await?;

        Ok(attempt)
    }

    async fn reset_if_expired(&self, fingerprint: &str) -> Result<Option<DeviceAttempt>, AppError> {
        let now = Utc::now();

        let cleared = sqlx::query_as::<_, DeviceAttempt>(
            r#"
            UPDATE device_attempts
            SET failed_attempts = 0,
                is_banned = false,
                banned_at = NULL,
                banned_until = NULL,
                updated_at = $2
            WHERE fingerprint = $1
              AND is_banned
              AND banned_until <= $2
            RETURNING fingerprint, failed_attempts, is_banned, banned_at, banned_until,
                      last_attempt_at, created_at, updated_at
            "#,
        )
        .bind(fingerprint)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        match cleared {
            Some(attempt) => Ok(Some(attempt)),
            None => self.get_details(fingerprint).await,
        }
    }
}

#[cfg(test)]
mod tests {
    #[tokio::test]
    #[ignore = "requires database"]
    async fn record_failure_creates_row_on_first_failure() {
        // Requires a running PostgreSQL at DATABASE_URL
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn record_failure_bans_at_threshold() {
        // Requires a running PostgreSQL at DATABASE_URL
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn reset_if_expired_clears_elapsed_ban() {
        // Requires a running PostgreSQL at DATABASE_URL
    }
}
