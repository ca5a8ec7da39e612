//! Audit Log Service
//!
//! Tamper-evident audit logging with hash chain verification. Every
//! booking-ledger operation is recorded for compliance review.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::net::IpAddr;
use uuid::Uuid;

use crate::domain::OperationContext;

/// Audit log entry as stored in the database
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: Uuid,
    pub sequence_number: i64,
    pub api_key_id: Option<Uuid>,
    pub caller_account: Option<Uuid>,
    pub correlation_id: Option<Uuid>,
    pub action: String,
    pub resource_type: Option<String>,
    pub resource_id: Option<Uuid>,
    pub before_state: Option<serde_json::Value>,
    pub after_state: Option<serde_json::Value>,
    pub changed_fields: Option<Vec<String>>,
    pub client_ip: Option<IpAddr>,
    pub previous_hash: String,
    pub current_hash: String,
    pub created_at: DateTime<Utc>,
}

/// Audit action types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    AirlineCreated,
    PassengerCreated,
    FlightListed,
    BookingExecuted,
    BookingReturned,
    FlightTransferred,
    BalanceToppedUp,
    FundsWithdrawn,
    ApiKeyCreated,
    ApiKeyRevoked,
    PermissionDenied,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::AirlineCreated => "airline.created",
            AuditAction::PassengerCreated => "passenger.created",
            AuditAction::FlightListed => "flight.listed",
            AuditAction::BookingExecuted => "booking.executed",
            AuditAction::BookingReturned => "booking.returned",
            AuditAction::FlightTransferred => "flight.transferred",
            AuditAction::BalanceToppedUp => "balance.topped_up",
            AuditAction::FundsWithdrawn => "funds.withdrawn",
            AuditAction::ApiKeyCreated => "api_key.created",
            AuditAction::ApiKeyRevoked => "api_key.revoked",
            AuditAction::PermissionDenied => "auth.permission_denied",
        }
    }
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Builder for creating audit log entries
#[derive(Debug, Clone)]
pub struct AuditLogBuilder {
    action: String,
    resource_type: Option<String>,
    resource_id: Option<Uuid>,
    before_state: Option<serde_json::Value>,
    after_state: Option<serde_json::Value>,
    changed_fields: Option<Vec<String>>,
}

impl AuditLogBuilder {
    pub fn new(action: AuditAction) -> Self {
        Self {
            action: action.as_str().to_string(),
            resource_type: None,
            resource_id: None,
            before_state: None,
            after_state: None,
            changed_fields: None,
        }
    }

    /// Create with custom action string
    pub fn custom(action: &str) -> Self {
        Self {
            action: action.to_string(),
            resource_type: None,
            resource_id: None,
            before_state: None,
            after_state: None,
            changed_fields: None,
        }
    }

    pub fn resource_type(mut self, resource_type: &str) -> Self {
        self.resource_type = Some(resource_type.to_string());
        self
    }

    pub fn resource_id(mut self, resource_id: Uuid) -> Self {
        self.resource_id = Some(resource_id);
        self
    }

    pub fn before_state<T: Serialize>(mut self, state: &T) -> Self {
        self.before_state = serde_json::to_value(state).ok();
        self
    }

    pub fn after_state<T: Serialize>(mut self, state: &T) -> Self {
        self.after_state = serde_json::to_value(state).ok();
        self
    }

    pub fn changed_fields(mut self, fields: Vec<String>) -> Self {
        self.changed_fields = Some(fields);
        self
    }
}

/// Audit Log Service
#[derive(Debug, Clone)]
pub struct AuditLogService {
    pool: PgPool,
}

type AuditRow = (
    Uuid,
    i64,
    Option<Uuid>,
    Option<Uuid>,
    Option<Uuid>,
    String,
    Option<String>,
    Option<Uuid>,
    Option<serde_json::Value>,
    Option<serde_json::Value>,
    Option<Vec<String>>,
    Option<String>,
    String,
    String,
    DateTime<Utc>,
);

fn entry_from_row(row: AuditRow) -> AuditLogEntry {
    let (
        id,
        sequence_number,
        api_key_id,
        caller_account,
        correlation_id,
        action,
        resource_type,
        resource_id,
        before_state,
        after_state,
        changed_fields,
        client_ip,
        previous_hash,
        current_hash,
        created_at,
    ) = row;

    AuditLogEntry {
        id,
        sequence_number,
        api_key_id,
        caller_account,
        correlation_id,
        action,
        resource_type,
        resource_id,
        before_state,
        after_state,
        changed_fields,
        client_ip: client_ip.and_then(|s| s.parse().ok()),
        previous_hash,
        current_hash,
        created_at,
    }
}

impl AuditLogService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Write an audit log entry.
    /// The hash chain is calculated by the database trigger.
    pub async fn log(
        &self,
        builder: AuditLogBuilder,
        context: &OperationContext,
    ) -> Result<Uuid, AuditLogError> {
        let id = Uuid::new_v4();

        let result: (Uuid,) = sqlx::query_as(
            r#"
            INSERT INTO audit_logs (
                id, api_key_id, caller_account, correlation_id,
                action, resource_type, resource_id,
                before_state, after_state, changed_fields, client_ip
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING id
            "#,
        )
        .bind(id)
        .bind(context.api_key_id)
        .bind(context.caller_account)
        .bind(context.correlation_id)
        .bind(&builder.action)
        .bind(&builder.resource_type)
        .bind(builder.resource_id)
        .bind(&builder.before_state)
        .bind(&builder.after_state)
        .bind(&builder.changed_fields)
        .bind(context.client_ip.map(|ip| ip.to_string()))
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!(
            audit_id = %result.0,
            action = %builder.action,
            "Audit log entry created"
        );

        Ok(result.0)
    }

    /// Verify the integrity of the audit log hash chain
    pub async fn verify_hash_chain(
        &self,
        limit: Option<i64>,
    ) -> Result<ChainVerificationResult, AuditLogError> {
        let limit = limit.unwrap_or(1000);

        // States are hashed in their jsonb text rendering, so fetch the
        // same rendering the insert trigger saw
        let entries: Vec<(
            Uuid,
            i64,
            String,
            String,
            String,
            Option<Uuid>,
            Option<String>,
            Option<String>,
        )> = sqlx::query_as(
            r#"
            SELECT id, sequence_number, action, previous_hash, current_hash,
                   caller_account, before_state::text, after_state::text
            FROM audit_logs
            ORDER BY sequence_number ASC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        if entries.is_empty() {
            return Ok(ChainVerificationResult {
                is_valid: true,
                entries_checked: 0,
                first_invalid_entry: None,
                expected_hash: None,
                actual_hash: None,
            });
        }

        let mut previous_hash =
            "0000000000000000000000000000000000000000000000000000000000000000".to_string();

        for (id, seq, action, prev_hash, current_hash, caller, before_state, after_state) in
            &entries
        {
            if prev_hash != &previous_hash {
                return Ok(ChainVerificationResult {
                    is_valid: false,
                    entries_checked: *seq as u64,
                    first_invalid_entry: Some(*id),
                    expected_hash: Some(previous_hash),
                    actual_hash: Some(prev_hash.clone()),
                });
            }

            let hash_input = format!(
                "{}{}{}{}{}{}{}",
                id,
                seq,
                action,
                caller.map(|u| u.to_string()).unwrap_or_default(),
                before_state.as_deref().unwrap_or_default(),
                after_state.as_deref().unwrap_or_default(),
                prev_hash
            );

            let calculated_hash = sha256_hex(&hash_input);

            if &calculated_hash != current_hash {
                return Ok(ChainVerificationResult {
                    is_valid: false,
                    entries_checked: *seq as u64,
                    first_invalid_entry: Some(*id),
                    expected_hash: Some(calculated_hash),
                    actual_hash: Some(current_hash.clone()),
                });
            }

            previous_hash = current_hash.clone();
        }

        Ok(ChainVerificationResult {
            is_valid: true,
            entries_checked: entries.len() as u64,
            first_invalid_entry: None,
            expected_hash: None,
            actual_hash: None,
        })
    }

    /// Get recent audit logs
    pub async fn get_recent(&self, limit: i64) -> Result<Vec<AuditLogEntry>, AuditLogError> {
        let rows: Vec<AuditRow> = sqlx::query_as(
            r#"
            SELECT id, sequence_number, api_key_id, caller_account, correlation_id,
                   action, resource_type, resource_id,
                   before_state, after_state, changed_fields,
                   client_ip::text, previous_hash, current_hash, created_at
            FROM audit_logs
            ORDER BY sequence_number DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(entry_from_row).collect())
    }

    /// Get audit logs recorded for a caller account
    pub async fn get_by_caller(
        &self,
        caller_account: Uuid,
        limit: i64,
    ) -> Result<Vec<AuditLogEntry>, AuditLogError> {
        let rows: Vec<AuditRow> = sqlx::query_as(
            r#"
            SELECT id, sequence_number, api_key_id, caller_account, correlation_id,
                   action, resource_type, resource_id,
                   before_state, after_state, changed_fields,
                   client_ip::text, previous_hash, current_hash, created_at
            FROM audit_logs
            WHERE caller_account = $1
            ORDER BY sequence_number DESC
            LIMIT $2
            "#,
        )
        .bind(caller_account)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(entry_from_row).collect())
    }
}

/// Result of hash chain verification
#[derive(Debug, Clone)]
pub struct ChainVerificationResult {
    pub is_valid: bool,
    pub entries_checked: u64,
    pub first_invalid_entry: Option<Uuid>,
    pub expected_hash: Option<String>,
    pub actual_hash: Option<String>,
}

/// Calculate SHA-256 hash and return as hex string
fn sha256_hex(input: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

/// Audit log errors
#[derive(Debug, thiserror::Error)]
pub enum AuditLogError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audit_action_as_str() {
        assert_eq!(AuditAction::AirlineCreated.as_str(), "airline.created");
        assert_eq!(AuditAction::BookingExecuted.as_str(), "booking.executed");
        assert_eq!(
            AuditAction::PermissionDenied.as_str(),
            "auth.permission_denied"
        );
    }

    #[test]
    fn test_audit_log_builder() {
        let builder = AuditLogBuilder::new(AuditAction::FlightListed)
            .resource_type("Flight")
            .resource_id(Uuid::new_v4())
            .changed_fields(vec!["available_seats".to_string()]);

        assert_eq!(builder.action, "flight.listed");
        assert_eq!(builder.resource_type, Some("Flight".to_string()));
        assert!(builder.changed_fields.is_some());
    }

    #[test]
    fn test_sha256_hex() {
        let hash = sha256_hex("test input");
        assert_eq!(hash.len(), 64);
    }

    #[test]
    fn test_chain_verification_result() {
        let result = ChainVerificationResult {
            is_valid: true,
            entries_checked: 42,
            first_invalid_entry: None,
            expected_hash: None,
            actual_hash: None,
        };

        assert!(result.is_valid);
        assert_eq!(result.entries_checked, 42);
    }
}
