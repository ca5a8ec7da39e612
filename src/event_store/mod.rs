//! Event Store module
//!
//! Persistence layer for Event Sourcing: appends events to PostgreSQL with
//! optimistic concurrency control and rebuilds aggregates by replay.

mod error;
mod repository;

pub use error::EventStoreError;
pub use repository::{AppendOutcome, AppendRequest, EventStore, PersistedEvent};
