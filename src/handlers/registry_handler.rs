//! Registry Handlers
//!
//! Creation of airlines and passengers.

use sqlx::PgPool;
use uuid::Uuid;

use crate::aggregate::{Aggregate, Airline, Passenger};
use crate::domain::OperationContext;
use crate::error::AppError;
use crate::event_store::{AppendRequest, EventStore};
use crate::projection::ProjectionService;

use super::{
    CreateAirlineCommand, CreateAirlineResult, CreatePassengerCommand, CreatePassengerResult,
};

/// Handler for airline registration
pub struct CreateAirlineHandler {
    event_store: EventStore,
    projection: ProjectionService,
}

impl CreateAirlineHandler {
    pub fn new(pool: PgPool) -> Self {
        Self {
            event_store: EventStore::new(pool.clone()),
            projection: ProjectionService::new(pool),
        }
    }

    pub async fn execute(
        &self,
        command: CreateAirlineCommand,
        idempotency_key: Option<Uuid>,
        context: &OperationContext,
    ) -> Result<CreateAirlineResult, AppError> {
        if command.name.trim().is_empty() {
            return Err(AppError::InvalidRequest("Name must not be empty".to_string()));
        }

        let airline_id = Uuid::new_v4();
        let (airline, event) = Airline::create(airline_id, command.account_id, command.name.clone());

        let request = AppendRequest::new(
            Airline::aggregate_type(),
            airline_id,
            0,
            event.event_type(),
            &event,
        )?;

        let outcome = self
            .event_store
            .append_atomic(vec![request], idempotency_key, context)
            .await?;

        if outcome.replayed {
            // Return the airline created by the original request
            let persisted = self.event_store.get_event(outcome.first_event_id()).await?;
            let event: crate::domain::AirlineEvent = serde_json::from_value(persisted.event_data)
                .map_err(|e| AppError::Internal(e.to_string()))?;

            if let crate::domain::AirlineEvent::AirlineCreated {
                airline_id,
                airline_account,
                name,
                ..
            } = event
            {
                return Ok(CreateAirlineResult {
                    airline_id,
                    account_id: airline_account,
                    name,
                });
            }

            return Err(AppError::Internal("unexpected replayed event".to_string()));
        }

        self.projection
            .create_airline(
                airline_id,
                command.account_id,
                &command.name,
                outcome.first_event_id(),
            )
            .await?;

        Ok(CreateAirlineResult {
            airline_id,
            account_id: airline.airline_account(),
            name: command.name,
        })
    }
}

/// Handler for passenger registration
pub struct CreatePassengerHandler {
    event_store: EventStore,
    projection: ProjectionService,
}

impl CreatePassengerHandler {
    pub fn new(pool: PgPool) -> Self {
        Self {
            event_store: EventStore::new(pool.clone()),
            projection: ProjectionService::new(pool),
        }
    }

    pub async fn execute(
        &self,
        command: CreatePassengerCommand,
        idempotency_key: Option<Uuid>,
        context: &OperationContext,
    ) -> Result<CreatePassengerResult, AppError> {
        if command.name.trim().is_empty() {
            return Err(AppError::InvalidRequest("Name must not be empty".to_string()));
        }

        // The airline must exist before a passenger can register with it
        let _airline: Airline = self
            .event_store
            .load_aggregate(command.airline_id)
            .await?
            .ok_or_else(|| AppError::AirlineNotFound(command.airline_id.to_string()))?;

        let passenger_id = Uuid::new_v4();
        let (_, event) = Passenger::create(
            passenger_id,
            command.account_id,
            command.airline_id,
            command.name.clone(),
        );

        let request = AppendRequest::new(
            Passenger::aggregate_type(),
            passenger_id,
            0,
            event.event_type(),
            &event,
        )?;

        let outcome = self
            .event_store
            .append_atomic(vec![request], idempotency_key, context)
            .await?;

        if outcome.replayed {
            // Return the passenger created by the original request
            let persisted = self.event_store.get_event(outcome.first_event_id()).await?;
            let event: crate::domain::PassengerEvent = serde_json::from_value(persisted.event_data)
                .map_err(|e| AppError::Internal(e.to_string()))?;

            if let crate::domain::PassengerEvent::PassengerCreated {
                passenger_id,
                passenger_account,
                airline_id,
                name,
                ..
            } = event
            {
                return Ok(CreatePassengerResult {
                    passenger_id,
                    account_id: passenger_account,
                    airline_id,
                    name,
                });
            }

            return Err(AppError::Internal("unexpected replayed event".to_string()));
        }

        self.projection
            .create_passenger(
                passenger_id,
                command.account_id,
                command.airline_id,
                &command.name,
                outcome.first_event_id(),
            )
            .await?;

        Ok(CreatePassengerResult {
            passenger_id,
            account_id: command.account_id,
            airline_id: command.airline_id,
            name: command.name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_airline_command_deserializes() {
        let json = r#"{"account_id":"3a1f8a16-50b5-4c9f-9a15-5c4f1f1c2f1e","name":"Meridian Air"}"#;
        let cmd: CreateAirlineCommand = serde_json::from_str(json).unwrap();
        assert_eq!(cmd.name, "Meridian Air");
    }
}
