//! Price memos and booking records
//!
//! `FlightMemo` is the quote an airline stores at listing time; it is created
//! once and never mutated. `BookingRecord` is the immutable receipt of a
//! completed booking, written exactly once into an append-only table.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A stored price quote linking a flight to its ticket price at listing time.
///
/// Owned by, and only reachable through, the issuing airline's memo map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightMemo {
    /// Memo identifier, the key into the airline's memo map
    pub memo_id: Uuid,

    /// The flight this memo quotes
    pub flight_id: Uuid,

    /// Ticket price fixed at listing time
    pub ticket_price: Decimal,

    /// Owning account of the issuing airline
    pub airline_account: Uuid,
}

/// Immutable receipt of a completed booking.
///
/// Created exactly once per successful booking and never mutated or deleted
/// afterwards; the `booking_records` table rejects UPDATE and DELETE.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingRecord {
    /// Record identifier
    pub id: Uuid,

    /// Passenger aggregate the seat was booked for
    pub passenger_id: Uuid,

    /// Flight aggregate the seat was booked on
    pub flight_id: Uuid,

    /// Owning account of the passenger
    pub passenger_account: Uuid,

    /// Owning account of the airline
    pub airline_account: Uuid,

    /// Amount actually debited from the passenger
    pub paid_amount: Decimal,

    /// Ticket price from the memo (equals `paid_amount`)
    pub ticket_price: Decimal,

    /// When the booking was settled
    pub booked_at: DateTime<Utc>,
}

impl BookingRecord {
    /// Whether this record links the given passenger and flight, i.e. whether
    /// it can serve as a capability for return or ownership transfer.
    pub fn links(&self, passenger_id: Uuid, flight_id: Uuid) -> bool {
        self.passenger_id == passenger_id && self.flight_id == flight_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample_record() -> BookingRecord {
        BookingRecord {
            id: Uuid::new_v4(),
            passenger_id: Uuid::new_v4(),
            flight_id: Uuid::new_v4(),
            passenger_account: Uuid::new_v4(),
            airline_account: Uuid::new_v4(),
            paid_amount: dec!(500),
            ticket_price: dec!(500),
            booked_at: Utc::now(),
        }
    }

    #[test]
    fn test_record_links_passenger_and_flight() {
        let record = sample_record();
        assert!(record.links(record.passenger_id, record.flight_id));
        assert!(!record.links(Uuid::new_v4(), record.flight_id));
        assert!(!record.links(record.passenger_id, Uuid::new_v4()));
    }

    #[test]
    fn test_memo_serialization_roundtrip() {
        let memo = FlightMemo {
            memo_id: Uuid::new_v4(),
            flight_id: Uuid::new_v4(),
            ticket_price: dec!(249.99),
            airline_account: Uuid::new_v4(),
        };

        let json = serde_json::to_string(&memo).unwrap();
        let back: FlightMemo = serde_json::from_str(&json).unwrap();
        assert_eq!(memo, back);
    }
}
