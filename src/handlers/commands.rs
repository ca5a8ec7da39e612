//! Command definitions
//!
//! Commands represent intentions to change the ledger state. Amounts travel
//! as strings so decimal precision survives JSON.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Command to register a new airline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAirlineCommand {
    /// Owning account of the airline
    pub account_id: Uuid,
    pub name: String,
}

/// Command to register a new passenger with an airline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePassengerCommand {
    /// Owning account of the passenger
    pub account_id: Uuid,
    pub airline_id: Uuid,
    pub name: String,
}

/// Command to list a flight with its ticket price
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListFlightCommand {
    pub airline_id: Uuid,
    pub flight_number: String,
    pub destination: String,
    pub departure_time: DateTime<Utc>,
    /// Ticket price (as string for precise decimal)
    pub ticket_price: String,
}

/// Command to book a seat, airline-initiated on behalf of the passenger
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookFlightCommand {
    pub airline_id: Uuid,
    pub passenger_id: Uuid,
    pub flight_id: Uuid,
    pub memo_id: Uuid,
}

/// Command to top up a passenger's prepaid balance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopUpCommand {
    pub passenger_id: Uuid,
    /// Amount to credit (as string for precise decimal)
    pub amount: String,
}

/// Command to withdraw funds from an airline balance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawCommand {
    pub airline_id: Uuid,
    /// Amount to withdraw (as string for precise decimal)
    pub amount: String,
}

/// Command to return a booked seat
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReturnFlightCommand {
    pub airline_id: Uuid,
    pub passenger_id: Uuid,
    pub flight_id: Uuid,
    pub booking_id: Uuid,
}

/// Command to transfer flight custody to a passenger against their booking
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferFlightCommand {
    pub passenger_id: Uuid,
    pub flight_id: Uuid,
    pub booking_id: Uuid,
}

/// Result of a successful airline creation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAirlineResult {
    pub airline_id: Uuid,
    pub account_id: Uuid,
    pub name: String,
}

/// Result of a successful passenger creation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePassengerResult {
    pub passenger_id: Uuid,
    pub account_id: Uuid,
    pub airline_id: Uuid,
    pub name: String,
}

/// Result of a successful listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListFlightResult {
    pub flight_id: Uuid,
    pub memo_id: Uuid,
    pub ticket_price: Decimal,
    pub available_seats: i32,
}

/// Result of a settled booking
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingResult {
    pub booking_id: Uuid,
    pub passenger_id: Uuid,
    pub flight_id: Uuid,
    pub paid_amount: Decimal,
    pub status: String,
}

/// Result of a successful top-up
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopUpResult {
    pub passenger_id: Uuid,
    pub amount: Decimal,
    pub status: String,
}

/// Result of a successful withdrawal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawResult {
    pub airline_id: Uuid,
    pub amount: Decimal,
    pub status: String,
}

/// Result of a returned booking
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReturnFlightResult {
    pub booking_id: Uuid,
    pub flight_id: Uuid,
    pub status: String,
}

/// Result of a custody transfer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferFlightResult {
    pub flight_id: Uuid,
    pub passenger_id: Uuid,
    pub status: String,
}
