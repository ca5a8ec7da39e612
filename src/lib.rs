//! aeroledger Library
//!
//! Re-exports modules for integration testing and external use.

pub mod aggregate;
pub mod api;
pub mod audit;
pub mod booking;
pub mod domain;
pub mod event_store;
pub mod handlers;
pub mod idempotency;
pub mod jobs;
pub mod projection;

pub mod config;
pub mod db;
mod error;

pub use config::Config;
pub use domain::{AirlineEvent, FlightEvent, PassengerEvent};
pub use domain::{Amount, AmountError, Balance, DomainError, OperationContext};
pub use error::{AppError, AppResult};
