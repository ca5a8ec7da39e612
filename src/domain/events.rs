//! Domain Events
//!
//! Event definitions for the booking ledger. Events are immutable facts that
//! have happened; aggregate state is derived by replaying them.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::record::FlightMemo;

/// Airline-related events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AirlineEvent {
    /// Airline was created
    AirlineCreated {
        airline_id: Uuid,
        airline_account: Uuid,
        name: String,
        created_at: DateTime<Utc>,
    },

    /// A flight was listed: price recorded and memo stored in the memo map
    FlightListed {
        airline_id: Uuid,
        memo: FlightMemo,
        listed_at: DateTime<Utc>,
    },

    /// Booking settlement credited the airline balance
    SettlementCredited {
        airline_id: Uuid,
        amount: Decimal,
        booking_id: Uuid,
        credited_at: DateTime<Utc>,
    },

    /// Funds were withdrawn to the airline's owning account
    FundsWithdrawn {
        airline_id: Uuid,
        amount: Decimal,
        withdrawn_at: DateTime<Utc>,
    },
}

impl AirlineEvent {
    /// Get the event type as a string
    pub fn event_type(&self) -> &'static str {
        match self {
            AirlineEvent::AirlineCreated { .. } => "AirlineCreated",
            AirlineEvent::FlightListed { .. } => "FlightListed",
            AirlineEvent::SettlementCredited { .. } => "SettlementCredited",
            AirlineEvent::FundsWithdrawn { .. } => "FundsWithdrawn",
        }
    }

    /// Get the airline aggregate this event relates to
    pub fn airline_id(&self) -> Uuid {
        match self {
            AirlineEvent::AirlineCreated { airline_id, .. } => *airline_id,
            AirlineEvent::FlightListed { airline_id, .. } => *airline_id,
            AirlineEvent::SettlementCredited { airline_id, .. } => *airline_id,
            AirlineEvent::FundsWithdrawn { airline_id, .. } => *airline_id,
        }
    }
}

/// Passenger-related events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PassengerEvent {
    /// Passenger was created, registered with an airline
    PassengerCreated {
        passenger_id: Uuid,
        passenger_account: Uuid,
        airline_id: Uuid,
        name: String,
        created_at: DateTime<Utc>,
    },

    /// Passenger prepaid balance was topped up
    BalanceToppedUp {
        passenger_id: Uuid,
        amount: Decimal,
        topped_up_at: DateTime<Utc>,
    },

    /// Ticket price was debited as part of a booking settlement
    FareDebited {
        passenger_id: Uuid,
        amount: Decimal,
        booking_id: Uuid,
        debited_at: DateTime<Utc>,
    },
}

impl PassengerEvent {
    /// Get the event type as a string
    pub fn event_type(&self) -> &'static str {
        match self {
            PassengerEvent::PassengerCreated { .. } => "PassengerCreated",
            PassengerEvent::BalanceToppedUp { .. } => "BalanceToppedUp",
            PassengerEvent::FareDebited { .. } => "FareDebited",
        }
    }

    /// Get the passenger aggregate this event relates to
    pub fn passenger_id(&self) -> Uuid {
        match self {
            PassengerEvent::PassengerCreated { passenger_id, .. } => *passenger_id,
            PassengerEvent::BalanceToppedUp { passenger_id, .. } => *passenger_id,
            PassengerEvent::FareDebited { passenger_id, .. } => *passenger_id,
        }
    }
}

/// Flight-related events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum FlightEvent {
    /// Flight was created by its issuing airline
    FlightCreated {
        flight_id: Uuid,
        airline_account: Uuid,
        flight_number: String,
        destination: String,
        departure_time: DateTime<Utc>,
        available_seats: i32,
        created_at: DateTime<Utc>,
    },

    /// A seat was reserved as part of a booking settlement
    SeatReserved {
        flight_id: Uuid,
        booking_id: Uuid,
        reserved_at: DateTime<Utc>,
    },

    /// A seat was released by the compensating return transition
    SeatReleased {
        flight_id: Uuid,
        booking_id: Uuid,
        released_at: DateTime<Utc>,
    },

    /// Custody of the flight moved from the airline to a passenger
    CustodyTransferred {
        flight_id: Uuid,
        passenger_id: Uuid,
        booking_id: Uuid,
        transferred_at: DateTime<Utc>,
    },
}

impl FlightEvent {
    /// Get the event type as a string
    pub fn event_type(&self) -> &'static str {
        match self {
            FlightEvent::FlightCreated { .. } => "FlightCreated",
            FlightEvent::SeatReserved { .. } => "SeatReserved",
            FlightEvent::SeatReleased { .. } => "SeatReleased",
            FlightEvent::CustodyTransferred { .. } => "CustodyTransferred",
        }
    }

    /// Get the flight aggregate this event relates to
    pub fn flight_id(&self) -> Uuid {
        match self {
            FlightEvent::FlightCreated { flight_id, .. } => *flight_id,
            FlightEvent::SeatReserved { flight_id, .. } => *flight_id,
            FlightEvent::SeatReleased { flight_id, .. } => *flight_id,
            FlightEvent::CustodyTransferred { flight_id, .. } => *flight_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_airline_event_serialization() {
        let event = AirlineEvent::SettlementCredited {
            airline_id: Uuid::new_v4(),
            amount: dec!(500),
            booking_id: Uuid::new_v4(),
            credited_at: Utc::now(),
        };

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("SettlementCredited"));

        let deserialized: AirlineEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(event.event_type(), deserialized.event_type());
    }

    #[test]
    fn test_flight_event_ids() {
        let flight_id = Uuid::new_v4();
        let event = FlightEvent::SeatReserved {
            flight_id,
            booking_id: Uuid::new_v4(),
            reserved_at: Utc::now(),
        };

        assert_eq!(event.flight_id(), flight_id);
        assert_eq!(event.event_type(), "SeatReserved");
    }

    #[test]
    fn test_passenger_event_serialization() {
        let event = PassengerEvent::FareDebited {
            passenger_id: Uuid::new_v4(),
            amount: dec!(249.99),
            booking_id: Uuid::new_v4(),
            debited_at: Utc::now(),
        };

        let json = serde_json::to_string(&event).unwrap();
        let deserialized: PassengerEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(event.event_type(), deserialized.event_type());
    }
}
