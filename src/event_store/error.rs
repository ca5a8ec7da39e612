//! Event Store Errors

use uuid::Uuid;

/// Errors that can occur while appending or replaying events
#[derive(Debug, thiserror::Error)]
pub enum EventStoreError {
    /// Optimistic concurrency conflict
    #[error("Version conflict for aggregate {aggregate_id}: expected {expected}, found {actual}")]
    VersionConflict {
        aggregate_id: Uuid,
        expected: i64,
        actual: i64,
    },

    /// Aggregate not found
    #[error("Aggregate not found: {0}")]
    AggregateNotFound(Uuid),

    /// Idempotency key is being processed by another request
    #[error("Idempotency key already in flight: {0}")]
    IdempotencyKeyInFlight(Uuid),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Retry budget exhausted for an atomic append
    #[error("Retries exhausted for atomic append")]
    RetriesExhausted,

    /// Invalid event data
    #[error("Invalid event data: {0}")]
    InvalidEventData(String),
}

impl EventStoreError {
    /// Check if this error is a version conflict
    pub fn is_version_conflict(&self) -> bool {
        matches!(self, EventStoreError::VersionConflict { .. })
    }

    /// Check if a retry could succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EventStoreError::VersionConflict { .. } | EventStoreError::Database(_)
        )
    }
}
