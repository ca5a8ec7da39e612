//! Listing Handler
//!
//! Publishes a flight: creates the Flight aggregate with its seat inventory
//! and stores the price memo on the issuing airline.

use sqlx::PgPool;
use uuid::Uuid;

use crate::aggregate::{Aggregate, Airline, Flight};
use crate::domain::{Amount, FlightMemo, OperationContext};
use crate::error::AppError;
use crate::event_store::{AppendRequest, EventStore};
use crate::projection::ProjectionService;

use super::{ListFlightCommand, ListFlightResult};

/// Handler for flight listings
pub struct ListFlightHandler {
    event_store: EventStore,
    projection: ProjectionService,
}

impl ListFlightHandler {
    pub fn new(pool: PgPool) -> Self {
        Self {
            event_store: EventStore::new(pool.clone()),
            projection: ProjectionService::new(pool),
        }
    }

    pub async fn execute(
        &self,
        command: ListFlightCommand,
        idempotency_key: Option<Uuid>,
        context: &OperationContext,
    ) -> Result<ListFlightResult, AppError> {
        let caller = context
            .caller_account
            .ok_or_else(|| AppError::MissingHeader("X-Request-Account-Id".to_string()))?;

        let price: Amount = command
            .ticket_price
            .parse()
            .map_err(|e| AppError::InvalidRequest(format!("Invalid ticket price: {}", e)))?;

        if command.flight_number.trim().is_empty() {
            return Err(AppError::InvalidRequest(
                "Flight number must not be empty".to_string(),
            ));
        }

        let airline: Airline = self
            .event_store
            .load_aggregate(command.airline_id)
            .await?
            .ok_or_else(|| AppError::AirlineNotFound(command.airline_id.to_string()))?;

        let flight_id = Uuid::new_v4();
        let memo = FlightMemo {
            memo_id: Uuid::new_v4(),
            flight_id,
            ticket_price: price.value(),
            airline_account: airline.airline_account(),
        };

        let now = chrono::Utc::now();
        let listed_event = airline.list_flight(caller, memo.clone(), now)?;

        let (flight, created_event) = Flight::create(
            flight_id,
            airline.airline_account(),
            command.flight_number.clone(),
            command.destination.clone(),
            command.departure_time,
        );

        let requests = vec![
            AppendRequest::new(
                Airline::aggregate_type(),
                command.airline_id,
                airline.version(),
                listed_event.event_type(),
                &listed_event,
            )?,
            AppendRequest::new(
                Flight::aggregate_type(),
                flight_id,
                0,
                created_event.event_type(),
                &created_event,
            )?,
        ];

        let outcome = self
            .event_store
            .append_atomic(requests, idempotency_key, context)
            .await?;

        if outcome.replayed {
            // Return the listing produced by the original request
            let persisted = self.event_store.get_event(outcome.first_event_id()).await?;
            let event: crate::domain::AirlineEvent = serde_json::from_value(persisted.event_data)
                .map_err(|e| AppError::Internal(e.to_string()))?;

            if let crate::domain::AirlineEvent::FlightListed { memo, .. } = event {
                let seats = self
                    .projection
                    .get_flight(memo.flight_id)
                    .await?
                    .map(|f| f.available_seats)
                    .unwrap_or(crate::aggregate::flight::INITIAL_SEATS);

                return Ok(ListFlightResult {
                    flight_id: memo.flight_id,
                    memo_id: memo.memo_id,
                    ticket_price: memo.ticket_price,
                    available_seats: seats,
                });
            }

            return Err(AppError::Internal("unexpected replayed event".to_string()));
        }

        self.projection
            .create_listing(
                command.airline_id,
                &command.flight_number,
                &command.destination,
                command.departure_time,
                &memo,
                outcome.first_event_id(),
                flight.available_seats(),
            )
            .await?;

        let airline = airline.apply(listed_event);
        self.event_store.save_snapshot_if_needed(&airline).await?;

        Ok(ListFlightResult {
            flight_id,
            memo_id: memo.memo_id,
            ticket_price: memo.ticket_price,
            available_seats: flight.available_seats(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_flight_command_deserializes() {
        let json = r#"{
            "airline_id": "3a1f8a16-50b5-4c9f-9a15-5c4f1f1c2f1e",
            "flight_number": "MA204",
            "destination": "Lisbon",
            "departure_time": "2026-10-01T09:30:00Z",
            "ticket_price": "500.00"
        }"#;
        let cmd: ListFlightCommand = serde_json::from_str(json).unwrap();
        assert_eq!(cmd.flight_number, "MA204");
        assert_eq!(cmd.ticket_price, "500.00");
    }
}
