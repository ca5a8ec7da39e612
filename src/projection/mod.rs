//! Projection module
//!
//! Read-model tables derived from events, the query side of CQRS.

mod service;

pub use service::{
    AirlineRow, BookingRecordRow, FlightRow, MemoRow, PassengerRow, ProjectionError,
    ProjectionService,
};
