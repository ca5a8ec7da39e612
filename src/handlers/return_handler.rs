//! Return and Transfer Handlers
//!
//! The compensating seat release for a booking, and the custody transfer of
//! a flight to a passenger. Both require the booking record as a capability.

use sqlx::PgPool;
use uuid::Uuid;

use crate::aggregate::{Aggregate, Airline, Flight, Passenger};
use crate::booking;
use crate::domain::{BookingRecord, OperationContext};
use crate::error::AppError;
use crate::event_store::{AppendRequest, EventStore};
use crate::projection::ProjectionService;

use super::{ReturnFlightCommand, ReturnFlightResult, TransferFlightCommand, TransferFlightResult};

/// Handler for booked seat returns
pub struct ReturnFlightHandler {
    event_store: EventStore,
    projection: ProjectionService,
}

impl ReturnFlightHandler {
    pub fn new(pool: PgPool) -> Self {
        Self {
            event_store: EventStore::new(pool.clone()),
            projection: ProjectionService::new(pool),
        }
    }

    pub async fn execute(
        &self,
        command: ReturnFlightCommand,
        idempotency_key: Option<Uuid>,
        context: &OperationContext,
    ) -> Result<ReturnFlightResult, AppError> {
        let caller = context
            .caller_account
            .ok_or_else(|| AppError::MissingHeader("X-Request-Account-Id".to_string()))?;

        let airline: Airline = self
            .event_store
            .load_aggregate(command.airline_id)
            .await?
            .ok_or_else(|| AppError::AirlineNotFound(command.airline_id.to_string()))?;

        let passenger: Passenger = self
            .event_store
            .load_aggregate(command.passenger_id)
            .await?
            .ok_or_else(|| AppError::PassengerNotFound(command.passenger_id.to_string()))?;

        let flight: Flight = self
            .event_store
            .load_aggregate(command.flight_id)
            .await?
            .ok_or_else(|| AppError::FlightNotFound(command.flight_id.to_string()))?;

        let record = self.load_record(command.booking_id).await?;

        let now = chrono::Utc::now();
        let transition = booking::return_booking(&airline, &passenger, &flight, &record, caller, now)?;

        let request = AppendRequest::new(
            Flight::aggregate_type(),
            command.flight_id,
            flight.version(),
            transition.seat_released.event_type(),
            &transition.seat_released,
        )?;

        let outcome = self
            .event_store
            .append_atomic(vec![request], idempotency_key, context)
            .await?;

        if outcome.replayed {
            // The original return already released the seat
            return Ok(ReturnFlightResult {
                booking_id: command.booking_id,
                flight_id: command.flight_id,
                status: "returned".to_string(),
            });
        }

        self.projection
            .apply_return(
                command.flight_id,
                outcome.first_event_id(),
                crate::aggregate::flight::INITIAL_SEATS,
            )
            .await?;

        let flight = flight.apply(transition.seat_released);
        self.event_store.save_snapshot_if_needed(&flight).await?;

        Ok(ReturnFlightResult {
            booking_id: command.booking_id,
            flight_id: command.flight_id,
            status: "returned".to_string(),
        })
    }

    async fn load_record(&self, booking_id: Uuid) -> Result<BookingRecord, AppError> {
        let row = self
            .projection
            .get_booking(booking_id)
            .await?
            .ok_or_else(|| AppError::BookingNotFound(booking_id.to_string()))?;

        Ok(row.into())
    }
}

/// Handler for flight custody transfers
pub struct TransferFlightHandler {
    event_store: EventStore,
    projection: ProjectionService,
}

impl TransferFlightHandler {
    pub fn new(pool: PgPool) -> Self {
        Self {
            event_store: EventStore::new(pool.clone()),
            projection: ProjectionService::new(pool),
        }
    }

    pub async fn execute(
        &self,
        command: TransferFlightCommand,
        idempotency_key: Option<Uuid>,
        context: &OperationContext,
    ) -> Result<TransferFlightResult, AppError> {
        let passenger: Passenger = self
            .event_store
            .load_aggregate(command.passenger_id)
            .await?
            .ok_or_else(|| AppError::PassengerNotFound(command.passenger_id.to_string()))?;

        let flight: Flight = self
            .event_store
            .load_aggregate(command.flight_id)
            .await?
            .ok_or_else(|| AppError::FlightNotFound(command.flight_id.to_string()))?;

        let record: BookingRecord = self
            .projection
            .get_booking(command.booking_id)
            .await?
            .ok_or_else(|| AppError::BookingNotFound(command.booking_id.to_string()))?
            .into();

        let now = chrono::Utc::now();
        let event = booking::claim_flight(&flight, &passenger, &record, now)?;

        let request = AppendRequest::new(
            Flight::aggregate_type(),
            command.flight_id,
            flight.version(),
            event.event_type(),
            &event,
        )?;

        let outcome = self
            .event_store
            .append_atomic(vec![request], idempotency_key, context)
            .await?;

        if outcome.replayed {
            // The original transfer already moved custody
            return Ok(TransferFlightResult {
                flight_id: command.flight_id,
                passenger_id: command.passenger_id,
                status: "transferred".to_string(),
            });
        }

        self.projection
            .apply_custody_transfer(command.flight_id, command.passenger_id, outcome.first_event_id())
            .await?;

        let flight = flight.apply(event);
        self.event_store.save_snapshot_if_needed(&flight).await?;

        Ok(TransferFlightResult {
            flight_id: command.flight_id,
            passenger_id: command.passenger_id,
            status: "transferred".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_return_flight_command_deserializes() {
        let json = r#"{
            "airline_id": "3a1f8a16-50b5-4c9f-9a15-5c4f1f1c2f1e",
            "passenger_id": "f58c02b5-5f0a-4bb7-bd3e-3a44e6f0b1aa",
            "flight_id": "9d0afc2e-33b5-4d9f-8a4c-6a70de2b6e01",
            "booking_id": "c2a45e86-91e2-47f9-9f3e-2b8e5a7d4c33"
        }"#;
        let cmd: ReturnFlightCommand = serde_json::from_str(json).unwrap();
        assert_ne!(cmd.flight_id, cmd.booking_id);
    }
}
