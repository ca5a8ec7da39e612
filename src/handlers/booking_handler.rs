//! Booking Handlers
//!
//! Orchestrate the booking settlement: load the three aggregates, run the
//! pure transition, append the events atomically and project the result.
//! The airline-initiated and passenger-initiated paths share everything but
//! the authorization check.

use sqlx::PgPool;
use uuid::Uuid;

use crate::aggregate::{Aggregate, Airline, Flight, Passenger};
use crate::booking::{self, BookingTransition};
use crate::domain::OperationContext;
use crate::error::AppError;
use crate::event_store::{AppendRequest, EventStore};
use crate::projection::ProjectionService;

use super::{BookFlightCommand, BookingResult};

/// Which identity authorizes the booking
enum Initiator {
    Airline,
    Passenger,
}

struct BookingOrchestrator {
    event_store: EventStore,
    projection: ProjectionService,
}

impl BookingOrchestrator {
    fn new(pool: PgPool) -> Self {
        Self {
            event_store: EventStore::new(pool.clone()),
            projection: ProjectionService::new(pool),
        }
    }

    async fn execute(
        &self,
        command: BookFlightCommand,
        initiator: Initiator,
        idempotency_key: Option<Uuid>,
        context: &OperationContext,
    ) -> Result<BookingResult, AppError> {
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

        let booking_id = Uuid::new_v4();
        let now = chrono::Utc::now();

        let transition: BookingTransition = match initiator {
            Initiator::Airline => booking::book(
                &airline,
                &passenger,
                &flight,
                command.memo_id,
                caller,
                booking_id,
                now,
            )?,
            Initiator::Passenger => booking::book_for_self(
                &airline,
                &passenger,
                &flight,
                command.memo_id,
                caller,
                booking_id,
                now,
            )?,
        };

        let requests = vec![
            AppendRequest::new(
                Flight::aggregate_type(),
                command.flight_id,
                flight.version(),
                transition.seat_reserved.event_type(),
                &transition.seat_reserved,
            )?,
            AppendRequest::new(
                Passenger::aggregate_type(),
                command.passenger_id,
                passenger.version(),
                transition.fare_debited.event_type(),
                &transition.fare_debited,
            )?,
            AppendRequest::new(
                Airline::aggregate_type(),
                command.airline_id,
                airline.version(),
                transition.settlement_credited.event_type(),
                &transition.settlement_credited,
            )?,
        ];

        let outcome = self
            .event_store
            .append_atomic(requests, idempotency_key, context)
            .await?;

        if outcome.replayed {
            return self.replay_result(outcome.first_event_id(), &command).await;
        }

        self.projection
            .apply_booking(&transition.record, outcome.first_event_id())
            .await?;

        let airline = airline.apply(transition.settlement_credited);
        let passenger = passenger.apply(transition.fare_debited);
        let flight = flight.apply(transition.seat_reserved);

        self.event_store.save_snapshot_if_needed(&airline).await?;
        self.event_store.save_snapshot_if_needed(&passenger).await?;
        self.event_store.save_snapshot_if_needed(&flight).await?;

        tracing::info!(
            booking_id = %booking_id,
            passenger_id = %command.passenger_id,
            flight_id = %command.flight_id,
            amount = %transition.record.paid_amount,
            "Booking settled"
        );

        Ok(BookingResult {
            booking_id,
            passenger_id: command.passenger_id,
            flight_id: command.flight_id,
            paid_amount: transition.record.paid_amount,
            status: "booked".to_string(),
        })
    }

    /// Rebuild the original response from the stored booking when an
    /// idempotency key replays. Nothing is re-applied.
    async fn replay_result(
        &self,
        event_id: Uuid,
        command: &BookFlightCommand,
    ) -> Result<BookingResult, AppError> {
        let persisted = self.event_store.get_event(event_id).await?;
        let event: crate::domain::FlightEvent = serde_json::from_value(persisted.event_data)
            .map_err(|e| AppError::Internal(e.to_string()))?;

        let booking_id = match event {
            crate::domain::FlightEvent::SeatReserved { booking_id, .. } => booking_id,
            other => {
                return Err(AppError::Internal(format!(
                    "unexpected replayed event {}",
                    other.event_type()
                )))
            }
        };

        let record = self
            .projection
            .get_booking(booking_id)
            .await?
            .ok_or_else(|| AppError::BookingNotFound(booking_id.to_string()))?;

        tracing::info!(booking_id = %booking_id, "Booking replayed from idempotency key");

        Ok(BookingResult {
            booking_id,
            passenger_id: command.passenger_id,
            flight_id: command.flight_id,
            paid_amount: record.paid_amount,
            status: "booked".to_string(),
        })
    }
}

/// Handler for airline-initiated bookings
pub struct BookFlightHandler {
    inner: BookingOrchestrator,
}

impl BookFlightHandler {
    pub fn new(pool: PgPool) -> Self {
        Self {
            inner: BookingOrchestrator::new(pool),
        }
    }

    pub async fn execute(
        &self,
        command: BookFlightCommand,
        idempotency_key: Option<Uuid>,
        context: &OperationContext,
    ) -> Result<BookingResult, AppError> {
        self.inner
            .execute(command, Initiator::Airline, idempotency_key, context)
            .await
    }
}

/// Handler for passenger-initiated bookings.
///
/// Settles the fare into the airline balance in the same transition, so no
/// payment instrument is left in flight afterwards.
pub struct BookFlightForSelfHandler {
    inner: BookingOrchestrator,
}

impl BookFlightForSelfHandler {
    pub fn new(pool: PgPool) -> Self {
        Self {
            inner: BookingOrchestrator::new(pool),
        }
    }

    pub async fn execute(
        &self,
        command: BookFlightCommand,
        idempotency_key: Option<Uuid>,
        context: &OperationContext,
    ) -> Result<BookingResult, AppError> {
        self.inner
            .execute(command, Initiator::Passenger, idempotency_key, context)
            .await
    }
}
