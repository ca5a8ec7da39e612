//! Command Handlers module
//!
//! CQRS command handlers that orchestrate booking operations.
//! Each handler coordinates aggregates, event store, and projections.

mod booking_handler;
mod commands;
mod funds_handler;
mod listing_handler;
mod registry_handler;
mod return_handler;


pub use booking_handler::{BookFlightForSelfHandler, BookFlightHandler};
pub use commands::*;
pub use funds_handler::{TopUpHandler, WithdrawHandler};
pub use listing_handler::ListFlightHandler;
pub use registry_handler::{CreateAirlineHandler, CreatePassengerHandler};
pub use return_handler::{ReturnFlightHandler, TransferFlightHandler};
