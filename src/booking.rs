//! Booking transitions
//!
//! Pure settlement logic spanning the Airline, Passenger and Flight
//! aggregates. Each function validates its preconditions in a fixed order and
//! returns the events plus the booking record to persist; no function here
//! touches storage, which keeps the whole settlement path unit-testable.
//!
//! A booking atomically reserves a seat, debits the ticket price from the
//! passenger exactly once and credits the same amount to the airline, so the
//! two balance moves always conserve value.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::aggregate::{Aggregate, Airline, Flight, Passenger};
use crate::domain::{
    AirlineEvent, Amount, BookingRecord, DomainError, FlightEvent, PassengerEvent,
};

/// Everything a successful booking produces: one event per aggregate touched
/// plus the immutable receipt.
#[derive(Debug, Clone)]
pub struct BookingTransition {
    pub seat_reserved: FlightEvent,
    pub fare_debited: PassengerEvent,
    pub settlement_credited: AirlineEvent,
    pub record: BookingRecord,
}

/// Everything a return produces.
#[derive(Debug, Clone)]
pub struct ReturnTransition {
    pub seat_released: FlightEvent,
}

/// Book a seat on behalf of a passenger, initiated by the airline.
///
/// Preconditions, checked in order, each with a distinct error:
/// 1. `caller` is the airline's owning account (`NotAirline`)
/// 2. the passenger is registered with this airline (`NotPassenger`)
/// 3. the airline holds a memo under `memo_id` (`InvalidFlightBooking`)
/// 4. the memo quotes this flight and the airline issued it (`InvalidFlight`)
/// 5. the flight has a seat left (`InvalidFlight`)
/// 6. the passenger balance covers the ticket price (`InsufficientFunds`)
pub fn book(
    airline: &Airline,
    passenger: &Passenger,
    flight: &Flight,
    memo_id: Uuid,
    caller: Uuid,
    booking_id: Uuid,
    now: DateTime<Utc>,
) -> Result<BookingTransition, DomainError> {
    if caller != airline.airline_account() {
        return Err(DomainError::NotAirline);
    }

    settle(airline, passenger, flight, memo_id, booking_id, now)
}

/// Book a seat for oneself, initiated by the passenger.
///
/// Same settlement as [`book`], but authorized by the passenger's own account
/// instead of the airline's. The settlement credits the airline balance
/// directly, so no payment instrument is left over.
pub fn book_for_self(
    airline: &Airline,
    passenger: &Passenger,
    flight: &Flight,
    memo_id: Uuid,
    caller: Uuid,
    booking_id: Uuid,
    now: DateTime<Utc>,
) -> Result<BookingTransition, DomainError> {
    if caller != passenger.passenger_account() {
        return Err(DomainError::NotPassenger);
    }

    settle(airline, passenger, flight, memo_id, booking_id, now)
}

/// Shared settlement path: relationship checks, seat reservation and the
/// single debit/credit pair.
fn settle(
    airline: &Airline,
    passenger: &Passenger,
    flight: &Flight,
    memo_id: Uuid,
    booking_id: Uuid,
    now: DateTime<Utc>,
) -> Result<BookingTransition, DomainError> {
    if passenger.airline_id() != airline.id() {
        return Err(DomainError::NotPassenger);
    }

    let memo = airline
        .memo(memo_id)
        .ok_or(DomainError::InvalidFlightBooking)?;

    if memo.flight_id != flight.id() || flight.airline_account() != airline.airline_account() {
        return Err(DomainError::InvalidFlight);
    }

    let seat_reserved = flight.reserve_seat(booking_id, now)?;

    let price = Amount::new(memo.ticket_price)
        .map_err(|e| DomainError::InvalidAmount(e.to_string()))?;

    let fare_debited = passenger.debit_fare(&price, booking_id, now)?;
    let settlement_credited = airline.credit_settlement(&price, booking_id, now)?;

    let record = BookingRecord {
        id: booking_id,
        passenger_id: passenger.id(),
        flight_id: flight.id(),
        passenger_account: passenger.passenger_account(),
        airline_account: airline.airline_account(),
        paid_amount: memo.ticket_price,
        ticket_price: memo.ticket_price,
        booked_at: now,
    };

    Ok(BookingTransition {
        seat_reserved,
        fare_debited,
        settlement_credited,
        record,
    })
}

/// Return a booked seat, initiated by the airline.
///
/// The compensating transition for [`book`]: it releases exactly the seat the
/// record reserved. Balances are untouched and the record stays on file.
pub fn return_booking(
    airline: &Airline,
    passenger: &Passenger,
    flight: &Flight,
    record: &BookingRecord,
    caller: Uuid,
    now: DateTime<Utc>,
) -> Result<ReturnTransition, DomainError> {
    if caller != airline.airline_account() {
        return Err(DomainError::NotAirline);
    }

    if passenger.airline_id() != airline.id() {
        return Err(DomainError::NotPassenger);
    }

    if flight.airline_account() != airline.airline_account() {
        return Err(DomainError::InvalidFlight);
    }

    if !record.links(passenger.id(), flight.id()) {
        return Err(DomainError::InvalidFlightBooking);
    }

    let seat_released = flight.release_seat(record.id, now)?;

    Ok(ReturnTransition { seat_released })
}

/// Transfer custody of the flight object to the passenger.
///
/// The booking record serves as the capability: without a record linking this
/// passenger to this flight, the transfer is refused.
pub fn claim_flight(
    flight: &Flight,
    passenger: &Passenger,
    record: &BookingRecord,
    now: DateTime<Utc>,
) -> Result<FlightEvent, DomainError> {
    if !record.links(passenger.id(), flight.id()) {
        return Err(DomainError::InvalidFlightBooking);
    }

    flight.transfer_custody(passenger.id(), record.id, now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{flight::INITIAL_SEATS, Aggregate};
    use crate::domain::FlightMemo;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    struct Fixture {
        airline: Airline,
        passenger: Passenger,
        flight: Flight,
        memo_id: Uuid,
    }

    /// Airline with one listed flight at 500, passenger funded to `funds`.
    fn fixture(funds: Decimal) -> Fixture {
        let airline_account = Uuid::new_v4();
        let (airline, _) =
            Airline::create(Uuid::new_v4(), airline_account, "Meridian Air".to_string());

        let (flight, _) = Flight::create(
            Uuid::new_v4(),
            airline_account,
            "MA204".to_string(),
            "Lisbon".to_string(),
            Utc::now(),
        );

        let memo = FlightMemo {
            memo_id: Uuid::new_v4(),
            flight_id: flight.id(),
            ticket_price: dec!(500),
            airline_account,
        };
        let memo_id = memo.memo_id;
        let event = airline
            .list_flight(airline_account, memo, Utc::now())
            .unwrap();
        let airline = airline.apply(event);

        let (passenger, _) = Passenger::create(
            Uuid::new_v4(),
            Uuid::new_v4(),
            airline.id(),
            "Dana Reyes".to_string(),
        );
        let passenger = if funds > dec!(0) {
            let amount = Amount::new(funds).unwrap();
            let event = passenger
                .top_up(passenger.passenger_account(), &amount, Utc::now())
                .unwrap();
            passenger.apply(event)
        } else {
            passenger
        };

        Fixture {
            airline,
            passenger,
            flight,
            memo_id,
        }
    }

    fn booked(f: &Fixture) -> (Airline, Passenger, Flight, BookingRecord) {
        let transition = book(
            &f.airline,
            &f.passenger,
            &f.flight,
            f.memo_id,
            f.airline.airline_account(),
            Uuid::new_v4(),
            Utc::now(),
        )
        .unwrap();

        (
            f.airline.clone().apply(transition.settlement_credited),
            f.passenger.clone().apply(transition.fare_debited),
            f.flight.clone().apply(transition.seat_reserved),
            transition.record,
        )
    }

    #[test]
    fn booking_moves_ticket_price_exactly_once() {
        // Regression check: the fare leaves the passenger exactly once and
        // lands on the airline exactly once, nothing else moves.
        let f = fixture(dec!(800));
        let (airline, passenger, _, record) = booked(&f);

        assert_eq!(passenger.balance().value(), dec!(300));
        assert_eq!(airline.balance().value(), dec!(500));
        assert_eq!(record.paid_amount, dec!(500));
        assert_eq!(record.ticket_price, dec!(500));

        let total_before = dec!(800);
        let total_after = passenger.balance().value() + airline.balance().value();
        assert_eq!(total_before, total_after);
    }

    #[test]
    fn booking_reserves_a_seat() {
        let f = fixture(dec!(500));
        let (_, _, flight, _) = booked(&f);

        assert_eq!(flight.available_seats(), INITIAL_SEATS - 1);
    }

    #[test]
    fn booking_requires_airline_caller() {
        let f = fixture(dec!(500));

        let result = book(
            &f.airline,
            &f.passenger,
            &f.flight,
            f.memo_id,
            Uuid::new_v4(),
            Uuid::new_v4(),
            Utc::now(),
        );
        assert!(matches!(result, Err(DomainError::NotAirline)));
    }

    #[test]
    fn booking_requires_registered_passenger() {
        let f = fixture(dec!(500));
        let (stranger, _) = Passenger::create(
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            "Unrelated".to_string(),
        );

        let result = book(
            &f.airline,
            &stranger,
            &f.flight,
            f.memo_id,
            f.airline.airline_account(),
            Uuid::new_v4(),
            Utc::now(),
        );
        assert!(matches!(result, Err(DomainError::NotPassenger)));
    }

    #[test]
    fn booking_requires_known_memo() {
        let f = fixture(dec!(500));

        let result = book(
            &f.airline,
            &f.passenger,
            &f.flight,
            Uuid::new_v4(),
            f.airline.airline_account(),
            Uuid::new_v4(),
            Utc::now(),
        );
        assert!(matches!(result, Err(DomainError::InvalidFlightBooking)));
    }

    #[test]
    fn booking_requires_matching_flight() {
        let f = fixture(dec!(500));
        let (other_flight, _) = Flight::create(
            Uuid::new_v4(),
            f.airline.airline_account(),
            "MA300".to_string(),
            "Oslo".to_string(),
            Utc::now(),
        );

        let result = book(
            &f.airline,
            &f.passenger,
            &other_flight,
            f.memo_id,
            f.airline.airline_account(),
            Uuid::new_v4(),
            Utc::now(),
        );
        assert!(matches!(result, Err(DomainError::InvalidFlight)));
    }

    #[test]
    fn booking_requires_available_seat() {
        let f = fixture(dec!(500));
        let mut flight = f.flight.clone();
        for _ in 0..INITIAL_SEATS {
            let event = flight.reserve_seat(Uuid::new_v4(), Utc::now()).unwrap();
            flight = flight.apply(event);
        }

        let result = book(
            &f.airline,
            &f.passenger,
            &flight,
            f.memo_id,
            f.airline.airline_account(),
            Uuid::new_v4(),
            Utc::now(),
        );
        assert!(matches!(result, Err(DomainError::InvalidFlight)));
    }

    #[test]
    fn booking_requires_sufficient_funds() {
        let f = fixture(dec!(499.99));

        let result = book(
            &f.airline,
            &f.passenger,
            &f.flight,
            f.memo_id,
            f.airline.airline_account(),
            Uuid::new_v4(),
            Utc::now(),
        );
        assert!(matches!(result, Err(DomainError::InsufficientFunds { .. })));
    }

    #[test]
    fn self_booking_requires_passenger_caller() {
        let f = fixture(dec!(500));

        let result = book_for_self(
            &f.airline,
            &f.passenger,
            &f.flight,
            f.memo_id,
            f.airline.airline_account(),
            Uuid::new_v4(),
            Utc::now(),
        );
        assert!(matches!(result, Err(DomainError::NotPassenger)));
    }

    #[test]
    fn self_booking_settles_like_booking() {
        let f = fixture(dec!(500));

        let transition = book_for_self(
            &f.airline,
            &f.passenger,
            &f.flight,
            f.memo_id,
            f.passenger.passenger_account(),
            Uuid::new_v4(),
            Utc::now(),
        )
        .unwrap();

        let airline = f.airline.clone().apply(transition.settlement_credited);
        let passenger = f.passenger.clone().apply(transition.fare_debited);
        assert_eq!(passenger.balance().value(), dec!(0));
        assert_eq!(airline.balance().value(), dec!(500));
    }

    #[test]
    fn return_releases_the_reserved_seat() {
        let f = fixture(dec!(500));
        let (airline, passenger, flight, record) = booked(&f);

        let transition = return_booking(
            &airline,
            &passenger,
            &flight,
            &record,
            airline.airline_account(),
            Utc::now(),
        )
        .unwrap();

        let flight = flight.apply(transition.seat_released);
        assert_eq!(flight.available_seats(), INITIAL_SEATS);
    }

    #[test]
    fn return_leaves_balances_untouched() {
        let f = fixture(dec!(500));
        let (airline, passenger, flight, record) = booked(&f);

        return_booking(
            &airline,
            &passenger,
            &flight,
            &record,
            airline.airline_account(),
            Utc::now(),
        )
        .unwrap();

        assert_eq!(passenger.balance().value(), dec!(0));
        assert_eq!(airline.balance().value(), dec!(500));
    }

    #[test]
    fn return_requires_airline_caller() {
        let f = fixture(dec!(500));
        let (airline, passenger, flight, record) = booked(&f);

        let result = return_booking(
            &airline,
            &passenger,
            &flight,
            &record,
            passenger.passenger_account(),
            Utc::now(),
        );
        assert!(matches!(result, Err(DomainError::NotAirline)));
    }

    #[test]
    fn return_requires_linking_record() {
        let f = fixture(dec!(500));
        let (airline, passenger, flight, mut record) = booked(&f);
        record.flight_id = Uuid::new_v4();

        let result = return_booking(
            &airline,
            &passenger,
            &flight,
            &record,
            airline.airline_account(),
            Utc::now(),
        );
        assert!(matches!(result, Err(DomainError::InvalidFlightBooking)));
    }

    #[test]
    fn claim_requires_linking_record() {
        let f = fixture(dec!(500));
        let (_, passenger, flight, mut record) = booked(&f);
        record.passenger_id = Uuid::new_v4();

        let result = claim_flight(&flight, &passenger, &record, Utc::now());
        assert!(matches!(result, Err(DomainError::InvalidFlightBooking)));
    }

    #[test]
    fn claim_transfers_custody_once() {
        let f = fixture(dec!(500));
        let (_, passenger, flight, record) = booked(&f);

        let event = claim_flight(&flight, &passenger, &record, Utc::now()).unwrap();
        let flight = flight.apply(event);

        let again = claim_flight(&flight, &passenger, &record, Utc::now());
        assert!(matches!(again, Err(DomainError::InvalidFlight)));
    }
}
