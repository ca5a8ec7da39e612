//! Domain module
//!
//! Core domain types and business rules of the booking ledger.

pub mod amount;
pub mod context;
pub mod error;
pub mod events;
pub mod payment;
pub mod record;

pub use amount::{Amount, AmountError, Balance};
pub use context::OperationContext;
pub use error::DomainError;
pub use events::{AirlineEvent, FlightEvent, PassengerEvent};
pub use payment::Payment;
pub use record::{BookingRecord, FlightMemo};
