use sqlx::PgPool;

/// Postgres-backed implementation of the attempt store. All access to the
/// `device_attempts` table goes through this type so the backend stays
/// swappable behind the repository trait.
#[derive(Clone)]
pub struct PostgresRepository {
    pub pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}
