//! Idempotency module
//!
//! Maintenance of stored idempotency keys; the keys themselves are claimed
//! and settled by the event store so a retried booking or top-up settles once.

mod repository;

pub use repository::{IdempotencyError, IdempotencyRepository};
