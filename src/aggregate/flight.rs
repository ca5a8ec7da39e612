//! Flight Aggregate
//!
//! A flight starts with a fixed seat inventory under airline custody. Seats
//! are reserved by bookings and released by the compensating return; custody
//! can move to a passenger exactly once, against a valid booking record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{DomainError, FlightEvent};

use super::Aggregate;

/// Every flight is listed with this many seats.
pub const INITIAL_SEATS: i32 = 100;

/// Who currently holds the flight object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "holder", content = "account")]
pub enum Custody {
    /// Held by the issuing airline's account
    Airline(Uuid),
    /// Held by a passenger aggregate after an ownership transfer
    Passenger(Uuid),
}

/// Flight Aggregate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Flight {
    /// Aggregate ID
    id: Uuid,

    /// Owning account of the issuing airline; immutable after creation
    airline_account: Uuid,

    /// Carrier flight number, e.g. "MA204"
    flight_number: String,

    /// Destination airport or city
    destination: String,

    /// Scheduled departure
    departure_time: Option<DateTime<Utc>>,

    /// Remaining seats; stays within [0, INITIAL_SEATS]
    available_seats: i32,

    /// Current holder of the flight object
    custody: Custody,

    /// Current version
    version: i64,

    /// When the flight was created
    created_at: Option<DateTime<Utc>>,
}

impl Default for Flight {
    fn default() -> Self {
        Self {
            id: Uuid::nil(),
            airline_account: Uuid::nil(),
            flight_number: String::new(),
            destination: String::new(),
            departure_time: None,
            available_seats: 0,
            custody: Custody::Airline(Uuid::nil()),
            version: 0,
            created_at: None,
        }
    }
}

impl Flight {
    /// Create a new flight with the full seat inventory under airline custody
    pub fn create(
        flight_id: Uuid,
        airline_account: Uuid,
        flight_number: String,
        destination: String,
        departure_time: DateTime<Utc>,
    ) -> (Self, FlightEvent) {
        let now = Utc::now();

        let event = FlightEvent::FlightCreated {
            flight_id,
            airline_account,
            flight_number: flight_number.clone(),
            destination: destination.clone(),
            departure_time,
            available_seats: INITIAL_SEATS,
            created_at: now,
        };

        let flight = Self {
            id: flight_id,
            airline_account,
            flight_number,
            destination,
            departure_time: Some(departure_time),
            available_seats: INITIAL_SEATS,
            custody: Custody::Airline(airline_account),
            version: 1,
            created_at: Some(now),
        };

        (flight, event)
    }

    /// Reserve one seat for a booking.
    ///
    /// Fails when the flight is sold out; the caller has already been
    /// authorized by the booking transition.
    pub fn reserve_seat(
        &self,
        booking_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<FlightEvent, DomainError> {
        if self.available_seats == 0 {
            return Err(DomainError::InvalidFlight);
        }

        Ok(FlightEvent::SeatReserved {
            flight_id: self.id,
            booking_id,
            reserved_at: now,
        })
    }

    /// Release one seat for a returned booking.
    ///
    /// Fails when the inventory is already full, which would mean the release
    /// does not correspond to a prior reservation.
    pub fn release_seat(
        &self,
        booking_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<FlightEvent, DomainError> {
        if self.available_seats >= INITIAL_SEATS {
            return Err(DomainError::InvalidFlight);
        }

        Ok(FlightEvent::SeatReleased {
            flight_id: self.id,
            booking_id,
            released_at: now,
        })
    }

    /// Move custody of the flight object to a passenger.
    ///
    /// Only valid while the airline still holds the flight; a second transfer
    /// fails because custody is no longer with the airline.
    pub fn transfer_custody(
        &self,
        passenger_id: Uuid,
        booking_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<FlightEvent, DomainError> {
        match self.custody {
            Custody::Airline(_) => Ok(FlightEvent::CustodyTransferred {
                flight_id: self.id,
                passenger_id,
                booking_id,
                transferred_at: now,
            }),
            Custody::Passenger(_) => Err(DomainError::InvalidFlight),
        }
    }

    // =========================================================================
    // Getters
    // =========================================================================

    pub fn airline_account(&self) -> Uuid {
        self.airline_account
    }

    pub fn flight_number(&self) -> &str {
        &self.flight_number
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    pub fn departure_time(&self) -> Option<DateTime<Utc>> {
        self.departure_time
    }

    pub fn available_seats(&self) -> i32 {
        self.available_seats
    }

    pub fn custody(&self) -> Custody {
        self.custody
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }
}

impl Aggregate for Flight {
    type Event = FlightEvent;

    fn aggregate_type() -> &'static str {
        "Flight"
    }

    fn id(&self) -> Uuid {
        self.id
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn apply(mut self, event: Self::Event) -> Self {
        match event {
            FlightEvent::FlightCreated {
                flight_id,
                airline_account,
                flight_number,
                destination,
                departure_time,
                available_seats,
                created_at,
            } => {
                self.id = flight_id;
                self.airline_account = airline_account;
                self.flight_number = flight_number;
                self.destination = destination;
                self.departure_time = Some(departure_time);
                self.available_seats = available_seats;
                self.custody = Custody::Airline(airline_account);
                self.created_at = Some(created_at);
            }

            FlightEvent::SeatReserved { .. } => {
                if self.available_seats > 0 {
                    self.available_seats -= 1;
                } else {
                    tracing::error!(
                        "Seat reservation during replay for sold-out flight {}",
                        self.id
                    );
                }
            }

            FlightEvent::SeatReleased { .. } => {
                if self.available_seats < INITIAL_SEATS {
                    self.available_seats += 1;
                } else {
                    tracing::error!(
                        "Seat release during replay for full flight {}",
                        self.id
                    );
                }
            }

            FlightEvent::CustodyTransferred { passenger_id, .. } => {
                self.custody = Custody::Passenger(passenger_id);
            }
        }

        self.version += 1;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_flight() -> Flight {
        let (flight, _) = Flight::create(
            Uuid::new_v4(),
            Uuid::new_v4(),
            "MA204".to_string(),
            "Lisbon".to_string(),
            Utc::now(),
        );
        flight
    }

    #[test]
    fn test_flight_create() {
        let flight_id = Uuid::new_v4();
        let account = Uuid::new_v4();

        let (flight, event) = Flight::create(
            flight_id,
            account,
            "MA204".to_string(),
            "Lisbon".to_string(),
            Utc::now(),
        );

        assert_eq!(flight.id(), flight_id);
        assert_eq!(flight.airline_account(), account);
        assert_eq!(flight.available_seats(), INITIAL_SEATS);
        assert_eq!(flight.custody(), Custody::Airline(account));
        assert_eq!(flight.version(), 1);
        assert!(matches!(event, FlightEvent::FlightCreated { .. }));
    }

    #[test]
    fn test_reserve_seat_decrements() {
        let flight = new_flight();

        let event = flight.reserve_seat(Uuid::new_v4(), Utc::now()).unwrap();
        let flight = flight.apply(event);

        assert_eq!(flight.available_seats(), INITIAL_SEATS - 1);
    }

    #[test]
    fn test_reserve_seat_sold_out() {
        let mut flight = new_flight();

        for _ in 0..INITIAL_SEATS {
            let event = flight.reserve_seat(Uuid::new_v4(), Utc::now()).unwrap();
            flight = flight.apply(event);
        }

        assert_eq!(flight.available_seats(), 0);
        let result = flight.reserve_seat(Uuid::new_v4(), Utc::now());
        assert!(matches!(result, Err(DomainError::InvalidFlight)));
    }

    #[test]
    fn test_release_seat_restores() {
        let flight = new_flight();
        let booking_id = Uuid::new_v4();

        let event = flight.reserve_seat(booking_id, Utc::now()).unwrap();
        let flight = flight.apply(event);

        let event = flight.release_seat(booking_id, Utc::now()).unwrap();
        let flight = flight.apply(event);

        assert_eq!(flight.available_seats(), INITIAL_SEATS);
    }

    #[test]
    fn test_release_seat_at_full_inventory() {
        let flight = new_flight();

        let result = flight.release_seat(Uuid::new_v4(), Utc::now());
        assert!(matches!(result, Err(DomainError::InvalidFlight)));
    }

    #[test]
    fn test_transfer_custody() {
        let flight = new_flight();
        let passenger_id = Uuid::new_v4();

        let event = flight
            .transfer_custody(passenger_id, Uuid::new_v4(), Utc::now())
            .unwrap();
        let flight = flight.apply(event);

        assert_eq!(flight.custody(), Custody::Passenger(passenger_id));
    }

    #[test]
    fn test_transfer_custody_only_once() {
        let flight = new_flight();

        let event = flight
            .transfer_custody(Uuid::new_v4(), Uuid::new_v4(), Utc::now())
            .unwrap();
        let flight = flight.apply(event);

        let result = flight.transfer_custody(Uuid::new_v4(), Uuid::new_v4(), Utc::now());
        assert!(matches!(result, Err(DomainError::InvalidFlight)));
    }
}
