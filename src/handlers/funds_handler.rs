//! Funds Handlers
//!
//! Passenger top-ups and airline withdrawals.

use sqlx::PgPool;
use uuid::Uuid;

use crate::aggregate::{Aggregate, Airline, Passenger};
use crate::domain::{Amount, OperationContext};
use crate::error::AppError;
use crate::event_store::{AppendRequest, EventStore};
use crate::projection::ProjectionService;

use super::{TopUpCommand, TopUpResult, WithdrawCommand, WithdrawResult};

/// Handler for passenger balance top-ups
pub struct TopUpHandler {
    event_store: EventStore,
    projection: ProjectionService,
}

impl TopUpHandler {
    pub fn new(pool: PgPool) -> Self {
        Self {
            event_store: EventStore::new(pool.clone()),
            projection: ProjectionService::new(pool),
        }
    }

    pub async fn execute(
        &self,
        command: TopUpCommand,
        idempotency_key: Option<Uuid>,
        context: &OperationContext,
    ) -> Result<TopUpResult, AppError> {
        let caller = context
            .caller_account
            .ok_or_else(|| AppError::MissingHeader("X-Request-Account-Id".to_string()))?;

        let amount: Amount = command
            .amount
            .parse()
            .map_err(|e| AppError::InvalidRequest(format!("Invalid amount: {}", e)))?;

        let passenger: Passenger = self
            .event_store
            .load_aggregate(command.passenger_id)
            .await?
            .ok_or_else(|| AppError::PassengerNotFound(command.passenger_id.to_string()))?;

        let now = chrono::Utc::now();
        let event = passenger.top_up(caller, &amount, now)?;

        let request = AppendRequest::new(
            Passenger::aggregate_type(),
            command.passenger_id,
            passenger.version(),
            event.event_type(),
            &event,
        )?;

        let outcome = self
            .event_store
            .append_atomic(vec![request], idempotency_key, context)
            .await?;

        if outcome.replayed {
            // The original top-up already settled; balances stay untouched
            return Ok(TopUpResult {
                passenger_id: command.passenger_id,
                amount: amount.value(),
                status: "completed".to_string(),
            });
        }

        self.projection
            .apply_top_up(command.passenger_id, &amount, outcome.first_event_id())
            .await?;

        let passenger = passenger.apply(event);
        self.event_store.save_snapshot_if_needed(&passenger).await?;

        Ok(TopUpResult {
            passenger_id: command.passenger_id,
            amount: amount.value(),
            status: "completed".to_string(),
        })
    }
}

/// Handler for airline withdrawals
pub struct WithdrawHandler {
    event_store: EventStore,
    projection: ProjectionService,
}

impl WithdrawHandler {
    pub fn new(pool: PgPool) -> Self {
        Self {
            event_store: EventStore::new(pool.clone()),
            projection: ProjectionService::new(pool),
        }
    }

    pub async fn execute(
        &self,
        command: WithdrawCommand,
        idempotency_key: Option<Uuid>,
        context: &OperationContext,
    ) -> Result<WithdrawResult, AppError> {
        let caller = context
            .caller_account
            .ok_or_else(|| AppError::MissingHeader("X-Request-Account-Id".to_string()))?;

        let amount: Amount = command
            .amount
            .parse()
            .map_err(|e| AppError::InvalidRequest(format!("Invalid amount: {}", e)))?;

        let airline: Airline = self
            .event_store
            .load_aggregate(command.airline_id)
            .await?
            .ok_or_else(|| AppError::AirlineNotFound(command.airline_id.to_string()))?;

        let now = chrono::Utc::now();
        // The payment instrument leaves the ledger toward the owning account
        let (event, payment) = airline.withdraw(caller, &amount, now)?;

        let request = AppendRequest::new(
            Airline::aggregate_type(),
            command.airline_id,
            airline.version(),
            event.event_type(),
            &event,
        )?;

        let outcome = self
            .event_store
            .append_atomic(vec![request], idempotency_key, context)
            .await?;

        if outcome.replayed {
            // The original withdrawal already settled
            return Ok(WithdrawResult {
                airline_id: command.airline_id,
                amount: amount.value(),
                status: "completed".to_string(),
            });
        }

        self.projection
            .apply_withdrawal(command.airline_id, &amount, outcome.first_event_id())
            .await?;

        let airline = airline.apply(event);
        self.event_store.save_snapshot_if_needed(&airline).await?;

        tracing::info!(
            airline_id = %command.airline_id,
            amount = %payment.value(),
            "Funds withdrawn"
        );

        Ok(WithdrawResult {
            airline_id: command.airline_id,
            amount: payment.value(),
            status: "completed".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_top_up_command_deserializes() {
        let json = r#"{"passenger_id":"f58c02b5-5f0a-4bb7-bd3e-3a44e6f0b1aa","amount":"500.00"}"#;
        let cmd: TopUpCommand = serde_json::from_str(json).unwrap();
        assert_eq!(cmd.amount, "500.00");
    }

    #[test]
    fn test_withdraw_command_deserializes() {
        let json = r#"{"airline_id":"3a1f8a16-50b5-4c9f-9a15-5c4f1f1c2f1e","amount":"120.50"}"#;
        let cmd: WithdrawCommand = serde_json::from_str(json).unwrap();
        assert_eq!(cmd.amount, "120.50");
    }
}
