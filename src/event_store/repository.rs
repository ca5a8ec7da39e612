//! Event Store Repository
//!
//! Atomic event persistence with optimistic concurrency control. A booking
//! touches three aggregates at once, so appends take a batch of per-aggregate
//! requests and commit them in one transaction or not at all.

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use sqlx::{PgPool, Postgres, Transaction};
use std::time::Duration;
use uuid::Uuid;

use crate::aggregate::Aggregate;
use crate::domain::OperationContext;

use super::EventStoreError;

type EventRow = (
    Uuid,
    String,
    Uuid,
    i64,
    String,
    serde_json::Value,
    serde_json::Value,
    Option<Uuid>,
    DateTime<Utc>,
);

/// Event row as stored in the database
#[derive(Debug, Clone)]
pub struct PersistedEvent {
    pub id: Uuid,
    pub aggregate_type: String,
    pub aggregate_id: Uuid,
    pub version: i64,
    pub event_type: String,
    pub event_data: serde_json::Value,
    pub context: serde_json::Value,
    pub idempotency_key: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl From<EventRow> for PersistedEvent {
    fn from(row: EventRow) -> Self {
        let (id, aggregate_type, aggregate_id, version, event_type, event_data, context, key, created_at) =
            row;
        Self {
            id,
            aggregate_type,
            aggregate_id,
            version,
            event_type,
            event_data,
            context,
            idempotency_key: key,
            created_at,
        }
    }
}

/// One event to append against one aggregate at an expected version
#[derive(Debug)]
pub struct AppendRequest {
    pub aggregate_type: String,
    pub aggregate_id: Uuid,
    pub expected_version: i64,
    pub event_type: String,
    pub event_data: serde_json::Value,
}

impl AppendRequest {
    pub fn new<E: Serialize>(
        aggregate_type: &str,
        aggregate_id: Uuid,
        expected_version: i64,
        event_type: &str,
        event: &E,
    ) -> Result<Self, EventStoreError> {
        Ok(Self {
            aggregate_type: aggregate_type.to_string(),
            aggregate_id,
            expected_version,
            event_type: event_type.to_string(),
            event_data: serde_json::to_value(event)?,
        })
    }
}

/// Result of an atomic append
#[derive(Debug)]
pub struct AppendOutcome {
    pub event_ids: Vec<Uuid>,
    /// True when the idempotency key had already settled. No new events were
    /// written and `event_ids` holds only the original first event ID, so the
    /// caller must not re-apply projections.
    pub replayed: bool,
}

impl AppendOutcome {
    pub fn first_event_id(&self) -> Uuid {
        self.event_ids[0]
    }
}

/// Event Store for persisting and replaying events
#[derive(Debug, Clone)]
pub struct EventStore {
    pool: PgPool,
}

impl EventStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Atomically append a batch of events, retrying on version conflicts.
    ///
    /// The caller is expected to reload aggregates before retrying; version
    /// conflicts here only cover conflicts between the load and the append.
    pub async fn append_atomic(
        &self,
        requests: Vec<AppendRequest>,
        idempotency_key: Option<Uuid>,
        context: &OperationContext,
    ) -> Result<AppendOutcome, EventStoreError> {
        const MAX_ATTEMPTS: u32 = 3;

        for attempt in 0..MAX_ATTEMPTS {
            match self.try_append(&requests, idempotency_key, context).await {
                Ok(outcome) => return Ok(outcome),
                Err(EventStoreError::VersionConflict { .. }) if attempt < MAX_ATTEMPTS - 1 => {
                    let delay = Duration::from_millis(50 * (attempt as u64 + 1));
                    tokio::time::sleep(delay).await;
                    tracing::warn!(
                        "Version conflict on append, retrying (attempt {}/{})",
                        attempt + 1,
                        MAX_ATTEMPTS
                    );
                    continue;
                }
                Err(e) => return Err(e),
            }
        }

        Err(EventStoreError::RetriesExhausted)
    }

    /// Single append attempt inside one transaction
    async fn try_append(
        &self,
        requests: &[AppendRequest],
        idempotency_key: Option<Uuid>,
        context: &OperationContext,
    ) -> Result<AppendOutcome, EventStoreError> {
        let context_json = serde_json::to_value(context)?;

        let mut tx = self.pool.begin().await?;

        if let Some(key) = idempotency_key {
            if let Some(existing) = self.claim_idempotency_key(&mut tx, key).await? {
                // Already settled by a previous request
                return Ok(AppendOutcome {
                    event_ids: vec![existing],
                    replayed: true,
                });
            }
        }

        let mut event_ids = Vec::with_capacity(requests.len());

        for (idx, req) in requests.iter().enumerate() {
            let current_version = self.current_version(&mut tx, req.aggregate_id).await?;
            if current_version != req.expected_version {
                return Err(EventStoreError::VersionConflict {
                    aggregate_id: req.aggregate_id,
                    expected: req.expected_version,
                    actual: current_version,
                });
            }

            // The idempotency key rides on the first event of the batch only
            let key = if idx == 0 { idempotency_key } else { None };

            let event_id: Uuid = sqlx::query_scalar(
                r#"
                INSERT INTO events (
                    aggregate_type, aggregate_id, version,
                    event_type, event_data, context, idempotency_key
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                RETURNING id
                "#,
            )
            .bind(&req.aggregate_type)
            .bind(req.aggregate_id)
            .bind(req.expected_version + 1)
            .bind(&req.event_type)
            .bind(&req.event_data)
            .bind(&context_json)
            .bind(key)
            .fetch_one(&mut *tx)
            .await?;

            event_ids.push(event_id);
        }

        if let Some(key) = idempotency_key {
            self.settle_idempotency_key(&mut tx, key, event_ids[0])
                .await?;
        }

        tx.commit().await?;

        Ok(AppendOutcome {
            event_ids,
            replayed: false,
        })
    }

    /// Highest stored version for an aggregate, 0 if none
    async fn current_version(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        aggregate_id: Uuid,
    ) -> Result<i64, EventStoreError> {
        let version: Option<i64> =
            sqlx::query_scalar("SELECT MAX(version) FROM events WHERE aggregate_id = $1")
                .bind(aggregate_id)
                .fetch_optional(&mut **tx)
                .await?
                .flatten();

        Ok(version.unwrap_or(0))
    }

    /// Claim the idempotency key, returning the prior event ID when the key
    /// has already been settled.
    async fn claim_idempotency_key(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        key: Uuid,
    ) -> Result<Option<Uuid>, EventStoreError> {
        let existing: Option<(String, Option<Uuid>)> = sqlx::query_as(
            r#"
            SELECT processing_status, event_id
            FROM idempotency_keys
            WHERE key = $1
            "#,
        )
        .bind(key)
        .fetch_optional(&mut **tx)
        .await?;

        match existing {
            Some((status, event_id)) if status == "completed" => Ok(event_id),
            Some((status, _)) if status == "processing" => {
                Err(EventStoreError::IdempotencyKeyInFlight(key))
            }
            Some(_) => Ok(None), // Failed earlier, can be retried
            None => {
                sqlx::query(
                    r#"
                    INSERT INTO idempotency_keys (key, processing_status, processing_started_at)
                    VALUES ($1, 'processing', NOW())
                    "#,
                )
                .bind(key)
                .execute(&mut **tx)
                .await?;
                Ok(None)
            }
        }
    }

    async fn settle_idempotency_key(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        key: Uuid,
        event_id: Uuid,
    ) -> Result<(), EventStoreError> {
        sqlx::query(
            r#"
            UPDATE idempotency_keys
            SET processing_status = 'completed', event_id = $2
            WHERE key = $1
            "#,
        )
        .bind(key)
        .bind(event_id)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    /// Load an aggregate by replaying events on top of the latest snapshot
    pub async fn load_aggregate<A>(&self, aggregate_id: Uuid) -> Result<Option<A>, EventStoreError>
    where
        A: Aggregate + DeserializeOwned + Serialize,
        A::Event: DeserializeOwned,
    {
        let (from_version, snapshot) = self.load_snapshot::<A>(aggregate_id).await?;

        let rows: Vec<EventRow> = sqlx::query_as(
            r#"
            SELECT id, aggregate_type, aggregate_id, version, event_type,
                   event_data, context, idempotency_key, created_at
            FROM events
            WHERE aggregate_id = $1 AND version > $2
            ORDER BY version ASC
            "#,
        )
        .bind(aggregate_id)
        .bind(from_version)
        .fetch_all(&self.pool)
        .await?;

        if snapshot.is_none() && rows.is_empty() {
            return Ok(None);
        }

        let mut aggregate = snapshot.unwrap_or_default();
        for row in rows {
            let persisted = PersistedEvent::from(row);
            let event: A::Event = serde_json::from_value(persisted.event_data)?;
            aggregate = aggregate.apply(event);
        }

        Ok(Some(aggregate))
    }

    /// Load an aggregate that must exist
    pub async fn load_required<A>(&self, aggregate_id: Uuid) -> Result<A, EventStoreError>
    where
        A: Aggregate + DeserializeOwned + Serialize,
        A::Event: DeserializeOwned,
    {
        self.load_aggregate(aggregate_id)
            .await?
            .ok_or(EventStoreError::AggregateNotFound(aggregate_id))
    }

    async fn load_snapshot<A>(&self, aggregate_id: Uuid) -> Result<(i64, Option<A>), EventStoreError>
    where
        A: Aggregate + DeserializeOwned,
    {
        let row: Option<(i64, serde_json::Value)> = sqlx::query_as(
            r#"
            SELECT version, state
            FROM event_snapshots
            WHERE aggregate_type = $1 AND aggregate_id = $2
            "#,
        )
        .bind(A::aggregate_type())
        .bind(aggregate_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some((version, state)) => {
                let aggregate: A = serde_json::from_value(state)?;
                Ok((version, Some(aggregate)))
            }
            None => Ok((0, None)),
        }
    }

    /// Persist a snapshot when the aggregate version warrants it
    pub async fn save_snapshot_if_needed<A>(&self, aggregate: &A) -> Result<bool, EventStoreError>
    where
        A: Aggregate + Serialize,
    {
        if !aggregate.should_snapshot() {
            return Ok(false);
        }

        let state = serde_json::to_value(aggregate)?;

        sqlx::query(
            r#"
            INSERT INTO event_snapshots (aggregate_type, aggregate_id, version, state)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (aggregate_type, aggregate_id)
            DO UPDATE SET version = $3, state = $4, created_at = NOW()
            "#,
        )
        .bind(A::aggregate_type())
        .bind(aggregate.id())
        .bind(aggregate.version())
        .bind(state)
        .execute(&self.pool)
        .await?;

        tracing::info!(
            "Snapshot saved for {} aggregate {} at version {}",
            A::aggregate_type(),
            aggregate.id(),
            aggregate.version()
        );

        Ok(true)
    }

    /// Fetch a single persisted event by ID. Used to rebuild the original
    /// response when an idempotency key replays.
    pub async fn get_event(&self, event_id: Uuid) -> Result<PersistedEvent, EventStoreError> {
        let row: Option<EventRow> = sqlx::query_as(
            r#"
            SELECT id, aggregate_type, aggregate_id, version, event_type,
                   event_data, context, idempotency_key, created_at
            FROM events
            WHERE id = $1
            "#,
        )
        .bind(event_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(PersistedEvent::from)
            .ok_or(EventStoreError::InvalidEventData(format!(
                "event {} not found",
                event_id
            )))
    }

    /// Full event history of an aggregate, oldest first
    pub async fn get_events(
        &self,
        aggregate_id: Uuid,
    ) -> Result<Vec<PersistedEvent>, EventStoreError> {
        let rows: Vec<EventRow> = sqlx::query_as(
            r#"
            SELECT id, aggregate_type, aggregate_id, version, event_type,
                   event_data, context, idempotency_key, created_at
            FROM events
            WHERE aggregate_id = $1
            ORDER BY version ASC
            "#,
        )
        .bind(aggregate_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(PersistedEvent::from).collect())
    }
}
