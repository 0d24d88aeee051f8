use crate::config::BanConfig;
use crate::database::device_attempt::DeviceAttemptRepository;
use crate::error::app_error::AppError;
use crate::models::device_attempt::{BanStatusResponse, FailureRecord};

/// Ban decision surface over the attempt store. Every read path applies lazy
/// expiry first, so an elapsed ban self-heals without a background sweep.
pub struct GateService<'a> {
    repository: &'a dyn DeviceAttemptRepository,
}

impl<'a> GateService<'a> {
    pub fn new(repository: &'a dyn DeviceAttemptRepository) -> Self {
        GateService { repository }
    }

    /// Current ban state after lazy expiry. No row means not banned. Serves
    /// both the check endpoint and the request gate.
    pub async fn status(&self, fingerprint: &str) -> Result<BanStatusResponse, AppError> {
        match self.repository.reset_if_expired(fingerprint).await? {
            Some(attempt) => Ok(BanStatusResponse {
                is_banned: attempt.is_banned,
                failed_attempts: attempt.failed_attempts,
                banned_until: attempt.banned_until,
            }),
            None => Ok(BanStatusResponse {
                is_banned: false,
                failed_attempts: 0,
                banned_until: None,
            }),
        }
    }

    /// Record one failure. Expiry runs first so a stale ban does not swallow
    /// the new failure; the store itself refuses increments while banned.
    pub async fn report_failure(&self, fingerprint: &str, config: &BanConfig) -> Result<FailureRecord, AppError> {
        self.repository.reset_if_expired(fingerprint).await?;
        self.repository.record_failure(fingerprint, config).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MemoryRepository;
    use chrono::{Duration, Utc};

    fn ban_config() -> BanConfig {
        BanConfig::default()
    }

    #[tokio::test]
    async fn unknown_fingerprint_is_not_banned() {
        let repo = MemoryRepository::new();
        let service = GateService::new(&repo);

        assert!(repo.get_details("abc123").await.expect("store ok").is_none());
        assert!(!service.status("abc123").await.expect("store ok").is_banned);
    }

    #[tokio::test]
    async fn four_failures_do_not_ban() {
        let repo = MemoryRepository::new();
        let service = GateService::new(&repo);
        let config = ban_config();

        for _ in 0..4 {
            let record = service.report_failure("fp-a", &config).await.expect("store ok");
            assert!(!record.newly_banned);
        }

        let attempt = repo.get_details("fp-a").await.expect("store ok").expect("row exists");
        assert_eq!(attempt.failed_attempts, 4);
        assert!(!attempt.is_banned);
    }

    #[tokio::test]
    async fn fifth_failure_bans_with_future_expiry() {
        let repo = MemoryRepository::new();
        let service = GateService::new(&repo);
        let config = ban_config();

        for _ in 0..4 {
            service.report_failure("fp-a", &config).await.expect("store ok");
        }
        let record = service.report_failure("fp-a", &config).await.expect("store ok");

        assert!(record.newly_banned);
        assert!(record.attempt.is_banned);
        let banned_until = record.attempt.banned_until.expect("expiry set");
        assert!(banned_until > Utc::now());
        assert!(service.status("fp-a").await.expect("store ok").is_banned);
    }

    #[tokio::test]
    async fn failures_while_banned_do_not_increment() {
        let repo = MemoryRepository::new();
        let service = GateService::new(&repo);
        let config = ban_config();

        for _ in 0..6 {
            service.report_failure("fp-a", &config).await.expect("store ok");
        }

        let attempt = repo.get_details("fp-a").await.expect("store ok").expect("row exists");
        assert_eq!(attempt.failed_attempts, config.max_failed_attempts);
    }

    #[tokio::test]
    async fn expired_ban_self_heals_and_resets_counter() {
        let repo = MemoryRepository::new();
        let service = GateService::new(&repo);

        repo.insert_banned("fp-old", 5, Utc::now() - Duration::minutes(10)).await;

        assert!(!service.status("fp-old").await.expect("store ok").is_banned);

        let attempt = repo.get_details("fp-old").await.expect("store ok").expect("row exists");
        assert_eq!(attempt.failed_attempts, 0);
        assert!(!attempt.is_banned);
        assert!(attempt.banned_until.is_none());
    }

    #[tokio::test]
    async fn expiry_reset_is_idempotent() {
        let repo = MemoryRepository::new();
        let service = GateService::new(&repo);

        repo.insert_banned("fp-old", 5, Utc::now() - Duration::minutes(10)).await;

        assert!(!service.status("fp-old").await.expect("store ok").is_banned);
        assert!(!service.status("fp-old").await.expect("store ok").is_banned);

        let attempt = repo.get_details("fp-old").await.expect("store ok").expect("row exists");
        assert_eq!(attempt.failed_attempts, 0);
    }

    #[tokio::test]
    async fn active_ban_stays_banned() {
        let repo = MemoryRepository::new();
        let service = GateService::new(&repo);

        repo.insert_banned("fp-hot", 5, Utc::now() + Duration::minutes(10)).await;

        let status = service.status("fp-hot").await.expect("store ok");
        assert!(status.is_banned);
        assert_eq!(status.failed_attempts, 5);
        assert!(status.banned_until.is_some());
    }

    #[tokio::test]
    async fn record_failure_alone_leaves_a_stale_ban_in_place() {
        let repo = MemoryRepository::new();
        repo.insert_banned("fp-old", 5, Utc::now() - Duration::minutes(10)).await;

        let record = repo.record_failure("fp-old", &ban_config()).await.expect("store ok");
        assert!(record.attempt.is_banned);
        assert_eq!(record.attempt.failed_attempts, 5);
        assert!(!record.newly_banned);
    }

    #[tokio::test]
    async fn failure_after_expired_ban_starts_fresh_count() {
        let repo = MemoryRepository::new();
        let service = GateService::new(&repo);
        let config = ban_config();

        repo.insert_banned("fp-old", 5, Utc::now() - Duration::minutes(10)).await;

        let record = service.report_failure("fp-old", &config).await.expect("store ok");
        assert_eq!(record.attempt.failed_attempts, 1);
        assert!(!record.attempt.is_banned);
    }
}
