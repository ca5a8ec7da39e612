//! Integration tests for the event store

use aeroledger::domain::{FlightEvent, OperationContext};
use aeroledger::event_store::{AppendRequest, EventStore};
use aeroledger::idempotency::IdempotencyRepository;
use chrono::Utc;
use uuid::Uuid;

mod common;

#[tokio::test]
async fn test_event_store_append_and_load() {
    let pool = common::setup_test_db().await;
    let event_store = EventStore::new(pool);

    let flight_id = Uuid::new_v4();

    let event = FlightEvent::FlightCreated {
        flight_id,
        airline_account: Uuid::new_v4(),
        flight_number: "MA204".to_string(),
        destination: "Lisbon".to_string(),
        departure_time: Utc::now(),
        available_seats: 100,
        created_at: Utc::now(),
    };

    let req = AppendRequest::new("Flight", flight_id, 0, "FlightCreated", &event).unwrap();

    let context = OperationContext::new().with_correlation_id(Uuid::new_v4());

    let outcome = event_store
        .append_atomic(vec![req], None, &context)
        .await
        .unwrap();
    assert_eq!(outcome.event_ids.len(), 1);
    assert!(!outcome.replayed);

    let events = event_store.get_events(flight_id).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, "FlightCreated");
    assert_eq!(events[0].version, 1);
}

#[tokio::test]
async fn test_event_store_concurrency_conflict() {
    let pool = common::setup_test_db().await;
    let event_store = EventStore::new(pool);

    let flight_id = Uuid::new_v4();

    let event1 = FlightEvent::FlightCreated {
        flight_id,
        airline_account: Uuid::new_v4(),
        flight_number: "MA204".to_string(),
        destination: "Lisbon".to_string(),
        departure_time: Utc::now(),
        available_seats: 100,
        created_at: Utc::now(),
    };

    let req1 = AppendRequest::new("Flight", flight_id, 0, "FlightCreated", &event1).unwrap();
    let context = OperationContext::new().with_correlation_id(Uuid::new_v4());

    event_store
        .append_atomic(vec![req1], None, &context)
        .await
        .unwrap();

    // Append with a stale expected version, must fail
    let event2 = FlightEvent::SeatReserved {
        flight_id,
        booking_id: Uuid::new_v4(),
        reserved_at: Utc::now(),
    };

    let req2 = AppendRequest::new("Flight", flight_id, 0, "SeatReserved", &event2).unwrap();

    let result = event_store.append_atomic(vec![req2], None, &context).await;
    assert!(result.is_err(), "Should fail due to version conflict");
}

#[tokio::test]
async fn test_event_store_idempotent_replay() {
    let pool = common::setup_test_db().await;
    let event_store = EventStore::new(pool);

    let flight_id = Uuid::new_v4();
    let idempotency_key = Uuid::new_v4();
    let context = OperationContext::new().with_correlation_id(Uuid::new_v4());

    let event = FlightEvent::FlightCreated {
        flight_id,
        airline_account: Uuid::new_v4(),
        flight_number: "MA204".to_string(),
        destination: "Lisbon".to_string(),
        departure_time: Utc::now(),
        available_seats: 100,
        created_at: Utc::now(),
    };

    let req = AppendRequest::new("Flight", flight_id, 0, "FlightCreated", &event).unwrap();
    let first = event_store
        .append_atomic(vec![req], Some(idempotency_key), &context)
        .await
        .unwrap();
    assert!(!first.replayed);

    // Same key again: no new event, original ID comes back
    let req = AppendRequest::new("Flight", flight_id, 0, "FlightCreated", &event).unwrap();
    let second = event_store
        .append_atomic(vec![req], Some(idempotency_key), &context)
        .await
        .unwrap();

    assert!(second.replayed);
    assert_eq!(second.first_event_id(), first.first_event_id());

    let events = event_store.get_events(flight_id).await.unwrap();
    assert_eq!(events.len(), 1);
}

#[tokio::test]
async fn test_cleanup_expired_idempotency_keys() {
    let pool = common::setup_test_db().await;

    let expired = Uuid::new_v4();
    let live = Uuid::new_v4();

    sqlx::query(
        r#"
        INSERT INTO idempotency_keys (key, processing_status, expires_at)
        VALUES ($1, 'completed', NOW() - INTERVAL '1 hour'),
               ($2, 'completed', NOW() + INTERVAL '1 hour')
        "#,
    )
    .bind(expired)
    .bind(live)
    .execute(&pool)
    .await
    .unwrap();

    let repository = IdempotencyRepository::new(pool.clone());
    let deleted = repository.cleanup_expired().await.unwrap();
    assert_eq!(deleted, 1);

    let remaining: Vec<(Uuid,)> = sqlx::query_as("SELECT key FROM idempotency_keys")
        .fetch_all(&pool)
        .await
        .unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].0, live);
}
