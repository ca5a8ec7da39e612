//! Idempotency Repository
//!
//! Maintenance access to the idempotency_keys table. The claim/settle cycle
//! for a key happens inside the event store's atomic append; this repository
//! only handles expiry of keys past their retention window.

use sqlx::PgPool;

/// Idempotency Repository Error
#[derive(Debug, thiserror::Error)]
pub enum IdempotencyError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Repository for idempotency key maintenance
#[derive(Debug, Clone)]
pub struct IdempotencyRepository {
    pool: PgPool,
}

impl IdempotencyRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Delete keys past their expiry
    pub async fn cleanup_expired(&self) -> Result<u64, IdempotencyError> {
        let rows = sqlx::query("DELETE FROM idempotency_keys WHERE expires_at < NOW()")
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(rows)
    }
}
