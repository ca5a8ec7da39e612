//! Event store pressure tool
//!
//! Run with: cargo run --bin seat_pressure --release -- --events 1000

use sqlx::postgres::PgPoolOptions;
use std::time::Instant;

/// Payload for a seeded flight event. Must stay deserializable as
/// `FlightEvent::FlightCreated` or replaying a seeded flight fails.
fn flight_created_payload(flight_id: uuid::Uuid, sequence: u64) -> serde_json::Value {
    serde_json::json!({
        "type": "FlightCreated",
        "flight_id": flight_id,
        "airline_account": uuid::Uuid::new_v4(),
        "flight_number": format!("LT{:04}", sequence % 10000),
        "destination": "Lisbon",
        "departure_time": chrono::Utc::now(),
        "available_seats": 100,
        "created_at": chrono::Utc::now()
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let args: Vec<String> = std::env::args().collect();
    let event_count: u64 = args
        .iter()
        .position(|a| a == "--events")
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
        .unwrap_or(1000);

    let database_url = std::env::var("DATABASE_URL")?;

    println!("Seat pressure - Inserting {} flight events", event_count);
    println!("Connecting to database...");

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&database_url)
        .await?;

    let start = Instant::now();
    let mut success_count = 0u64;

    for i in 0..event_count {
        let event_id = uuid::Uuid::new_v4();
        let flight_id = uuid::Uuid::new_v4();
        let payload = flight_created_payload(flight_id, i);

        let result = sqlx::query(
            r#"
            INSERT INTO events (id, aggregate_type, aggregate_id, event_type, version, event_data, context, created_at)
            VALUES ($1, 'Flight', $2, 'FlightCreated', 1, $3, '{}'::jsonb, NOW())
            "#,
        )
        .bind(event_id)
        .bind(flight_id)
        .bind(&payload)
        .execute(&pool)
        .await;

        if result.is_ok() {
            success_count += 1;
        }

        if (i + 1) % 1000 == 0 {
            println!("Inserted {} events...", i + 1);
        }
    }

    let elapsed = start.elapsed();
    let rate = success_count as f64 / elapsed.as_secs_f64();

    println!("\n=== Pressure Results ===");
    println!("Total events: {}", event_count);
    println!("Successful: {}", success_count);
    println!("Time: {:.2}s", elapsed.as_secs_f64());
    println!("Rate: {:.0} events/sec", rate);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use aeroledger::domain::FlightEvent;

    #[test]
    fn test_seeded_payload_deserializes_as_flight_event() {
        let flight_id = uuid::Uuid::new_v4();
        let payload = flight_created_payload(flight_id, 42);

        let event: FlightEvent = serde_json::from_value(payload).unwrap();

        match event {
            FlightEvent::FlightCreated {
                flight_id: id,
                available_seats,
                ..
            } => {
                assert_eq!(id, flight_id);
                assert_eq!(available_seats, 100);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }
}
