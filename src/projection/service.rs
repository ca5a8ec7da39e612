//! Projection Service
//!
//! Updates read-model tables after events are persisted: airline and
//! passenger balances, flight seat counts, price memos and the append-only
//! booking record table. Queries read from these tables only.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::domain::{Amount, BookingRecord, FlightMemo};

/// Airline read model row
#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
pub struct AirlineRow {
    pub id: Uuid,
    pub account_id: Uuid,
    pub name: String,
    pub balance: Decimal,
    pub created_at: DateTime<Utc>,
}

/// Passenger read model row
#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
pub struct PassengerRow {
    pub id: Uuid,
    pub account_id: Uuid,
    pub airline_id: Uuid,
    pub name: String,
    pub balance: Decimal,
    pub created_at: DateTime<Utc>,
}

/// Flight read model row
#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
pub struct FlightRow {
    pub id: Uuid,
    pub airline_account: Uuid,
    pub flight_number: String,
    pub destination: String,
    pub departure_time: DateTime<Utc>,
    pub available_seats: i32,
    pub custody_holder: String,
    pub custody_passenger_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Price memo read model row
#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
pub struct MemoRow {
    pub memo_id: Uuid,
    pub airline_id: Uuid,
    pub flight_id: Uuid,
    pub ticket_price: Decimal,
    pub airline_account: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Booking record row, written exactly once per settled booking
#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
pub struct BookingRecordRow {
    pub id: Uuid,
    pub passenger_id: Uuid,
    pub flight_id: Uuid,
    pub passenger_account: Uuid,
    pub airline_account: Uuid,
    pub paid_amount: Decimal,
    pub ticket_price: Decimal,
    pub booked_at: DateTime<Utc>,
}

impl From<BookingRecordRow> for BookingRecord {
    fn from(row: BookingRecordRow) -> Self {
        Self {
            id: row.id,
            passenger_id: row.passenger_id,
            flight_id: row.flight_id,
            passenger_account: row.passenger_account,
            airline_account: row.airline_account,
            paid_amount: row.paid_amount,
            ticket_price: row.ticket_price,
            booked_at: row.booked_at,
        }
    }
}

/// Projection Service for updating and querying read models
#[derive(Debug, Clone)]
pub struct ProjectionService {
    pool: PgPool,
}

impl ProjectionService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // =========================================================================
    // Creation projections
    // =========================================================================

    /// Register a new airline row with a zero balance
    pub async fn create_airline(
        &self,
        airline_id: Uuid,
        account_id: Uuid,
        name: &str,
        event_id: Uuid,
    ) -> Result<(), ProjectionError> {
        sqlx::query(
            r#"
            INSERT INTO airlines (id, account_id, name, balance, last_event_id, last_event_version)
            VALUES ($1, $2, $3, 0, $4, 1)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(airline_id)
        .bind(account_id)
        .bind(name)
        .bind(event_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Register a new passenger row with a zero balance
    pub async fn create_passenger(
        &self,
        passenger_id: Uuid,
        account_id: Uuid,
        airline_id: Uuid,
        name: &str,
        event_id: Uuid,
    ) -> Result<(), ProjectionError> {
        sqlx::query(
            r#"
            INSERT INTO passengers (id, account_id, airline_id, name, balance, last_event_id, last_event_version)
            VALUES ($1, $2, $3, $4, 0, $5, 1)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(passenger_id)
        .bind(account_id)
        .bind(airline_id)
        .bind(name)
        .bind(event_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Register a flight with its full seat inventory and store its memo
    pub async fn create_listing(
        &self,
        airline_id: Uuid,
        flight_number: &str,
        destination: &str,
        departure_time: DateTime<Utc>,
        memo: &FlightMemo,
        event_id: Uuid,
        initial_seats: i32,
    ) -> Result<(), ProjectionError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO flights (
                id, airline_account, flight_number, destination, departure_time,
                available_seats, custody_holder, last_event_id, last_event_version
            )
            VALUES ($1, $2, $3, $4, $5, $6, 'airline', $7, 1)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(memo.flight_id)
        .bind(memo.airline_account)
        .bind(flight_number)
        .bind(destination)
        .bind(departure_time)
        .bind(initial_seats)
        .bind(event_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO flight_memos (memo_id, airline_id, flight_id, ticket_price, airline_account)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (memo_id) DO NOTHING
            "#,
        )
        .bind(memo.memo_id)
        .bind(airline_id)
        .bind(memo.flight_id)
        .bind(memo.ticket_price)
        .bind(memo.airline_account)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(())
    }

    // =========================================================================
    // Booking settlement projection
    // =========================================================================

    /// Apply a settled booking: balances move, a seat is taken and the record
    /// is written. One transaction; the record insert has no update path.
    pub async fn apply_booking(
        &self,
        record: &BookingRecord,
        event_id: Uuid,
    ) -> Result<(), ProjectionError> {
        let mut tx = self.pool.begin().await?;

        let fare = record.paid_amount;

        self.shift_passenger_balance(&mut tx, record.passenger_id, -fare, event_id)
            .await?;

        let airline_id = self.airline_of_account(&mut tx, record.airline_account).await?;
        self.shift_airline_balance(&mut tx, airline_id, fare, event_id)
            .await?;

        let seats_taken = sqlx::query(
            r#"
            UPDATE flights
            SET available_seats = available_seats - 1,
                last_event_id = $2,
                updated_at = NOW()
            WHERE id = $1 AND available_seats > 0
            "#,
        )
        .bind(record.flight_id)
        .bind(event_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if seats_taken == 0 {
            return Err(ProjectionError::FlightNotFound(record.flight_id));
        }

        sqlx::query(
            r#"
            INSERT INTO booking_records (
                id, passenger_id, flight_id, passenger_account,
                airline_account, paid_amount, ticket_price, booked_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(record.id)
        .bind(record.passenger_id)
        .bind(record.flight_id)
        .bind(record.passenger_account)
        .bind(record.airline_account)
        .bind(record.paid_amount)
        .bind(record.ticket_price)
        .bind(record.booked_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::debug!(
            "Projection updated for booking {}: passenger {} -> airline account {} ({})",
            record.id,
            record.passenger_id,
            record.airline_account,
            fare
        );

        Ok(())
    }

    /// Apply a returned booking: one seat back, balances and record untouched
    pub async fn apply_return(
        &self,
        flight_id: Uuid,
        event_id: Uuid,
        initial_seats: i32,
    ) -> Result<(), ProjectionError> {
        let released = sqlx::query(
            r#"
            UPDATE flights
            SET available_seats = available_seats + 1,
                last_event_id = $2,
                updated_at = NOW()
            WHERE id = $1 AND available_seats < $3
            "#,
        )
        .bind(flight_id)
        .bind(event_id)
        .bind(initial_seats)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if released == 0 {
            return Err(ProjectionError::FlightNotFound(flight_id));
        }

        Ok(())
    }

    /// Apply a custody transfer to a passenger
    pub async fn apply_custody_transfer(
        &self,
        flight_id: Uuid,
        passenger_id: Uuid,
        event_id: Uuid,
    ) -> Result<(), ProjectionError> {
        sqlx::query(
            r#"
            UPDATE flights
            SET custody_holder = 'passenger',
                custody_passenger_id = $2,
                last_event_id = $3,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(flight_id)
        .bind(passenger_id)
        .bind(event_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // =========================================================================
    // Balance projections
    // =========================================================================

    /// Apply a passenger top-up
    pub async fn apply_top_up(
        &self,
        passenger_id: Uuid,
        amount: &Amount,
        event_id: Uuid,
    ) -> Result<(), ProjectionError> {
        let mut tx = self.pool.begin().await?;
        self.shift_passenger_balance(&mut tx, passenger_id, amount.value(), event_id)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    /// Apply an airline withdrawal
    pub async fn apply_withdrawal(
        &self,
        airline_id: Uuid,
        amount: &Amount,
        event_id: Uuid,
    ) -> Result<(), ProjectionError> {
        let mut tx = self.pool.begin().await?;
        self.shift_airline_balance(&mut tx, airline_id, -amount.value(), event_id)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn shift_passenger_balance(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        passenger_id: Uuid,
        delta: Decimal,
        event_id: Uuid,
    ) -> Result<(), ProjectionError> {
        let updated = sqlx::query(
            r#"
            UPDATE passengers
            SET balance = balance + $2,
                last_event_id = $3,
                last_event_version = last_event_version + 1,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(passenger_id)
        .bind(delta)
        .bind(event_id)
        .execute(&mut **tx)
        .await?
        .rows_affected();

        if updated == 0 {
            return Err(ProjectionError::PassengerNotFound(passenger_id));
        }

        Ok(())
    }

    async fn shift_airline_balance(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        airline_id: Uuid,
        delta: Decimal,
        event_id: Uuid,
    ) -> Result<(), ProjectionError> {
        let updated = sqlx::query(
            r#"
            UPDATE airlines
            SET balance = balance + $2,
                last_event_id = $3,
                last_event_version = last_event_version + 1,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(airline_id)
        .bind(delta)
        .bind(event_id)
        .execute(&mut **tx)
        .await?
        .rows_affected();

        if updated == 0 {
            return Err(ProjectionError::AirlineNotFound(airline_id));
        }

        Ok(())
    }

    /// Resolve an airline row ID from its owning account
    async fn airline_of_account(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        account_id: Uuid,
    ) -> Result<Uuid, ProjectionError> {
        let id: Option<Uuid> = sqlx::query_scalar("SELECT id FROM airlines WHERE account_id = $1")
            .bind(account_id)
            .fetch_optional(&mut **tx)
            .await?;

        id.ok_or(ProjectionError::AirlineAccountNotFound(account_id))
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub async fn get_airline(&self, airline_id: Uuid) -> Result<Option<AirlineRow>, ProjectionError> {
        let row = sqlx::query_as::<_, AirlineRow>(
            "SELECT id, account_id, name, balance, created_at FROM airlines WHERE id = $1",
        )
        .bind(airline_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn get_passenger(
        &self,
        passenger_id: Uuid,
    ) -> Result<Option<PassengerRow>, ProjectionError> {
        let row = sqlx::query_as::<_, PassengerRow>(
            r#"
            SELECT id, account_id, airline_id, name, balance, created_at
            FROM passengers WHERE id = $1
            "#,
        )
        .bind(passenger_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn get_flight(&self, flight_id: Uuid) -> Result<Option<FlightRow>, ProjectionError> {
        let row = sqlx::query_as::<_, FlightRow>(
            r#"
            SELECT id, airline_account, flight_number, destination, departure_time,
                   available_seats, custody_holder, custody_passenger_id, created_at
            FROM flights WHERE id = $1
            "#,
        )
        .bind(flight_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    /// All flights listed by an airline's account, newest first
    pub async fn list_flights_of_airline(
        &self,
        airline_account: Uuid,
    ) -> Result<Vec<FlightRow>, ProjectionError> {
        let rows = sqlx::query_as::<_, FlightRow>(
            r#"
            SELECT id, airline_account, flight_number, destination, departure_time,
                   available_seats, custody_holder, custody_passenger_id, created_at
            FROM flights
            WHERE airline_account = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(airline_account)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn get_memo(&self, memo_id: Uuid) -> Result<Option<MemoRow>, ProjectionError> {
        let row = sqlx::query_as::<_, MemoRow>(
            r#"
            SELECT memo_id, airline_id, flight_id, ticket_price, airline_account, created_at
            FROM flight_memos WHERE memo_id = $1
            "#,
        )
        .bind(memo_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn get_booking(
        &self,
        booking_id: Uuid,
    ) -> Result<Option<BookingRecordRow>, ProjectionError> {
        let row = sqlx::query_as::<_, BookingRecordRow>(
            r#"
            SELECT id, passenger_id, flight_id, passenger_account, airline_account,
                   paid_amount, ticket_price, booked_at
            FROM booking_records WHERE id = $1
            "#,
        )
        .bind(booking_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    /// All booking records of a passenger, newest first
    pub async fn list_bookings_of_passenger(
        &self,
        passenger_id: Uuid,
    ) -> Result<Vec<BookingRecordRow>, ProjectionError> {
        let rows = sqlx::query_as::<_, BookingRecordRow>(
            r#"
            SELECT id, passenger_id, flight_id, passenger_account, airline_account,
                   paid_amount, ticket_price, booked_at
            FROM booking_records
            WHERE passenger_id = $1
            ORDER BY booked_at DESC
            "#,
        )
        .bind(passenger_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn get_airline_balance(
        &self,
        airline_id: Uuid,
    ) -> Result<Option<Decimal>, ProjectionError> {
        let balance: Option<Decimal> =
            sqlx::query_scalar("SELECT balance FROM airlines WHERE id = $1")
                .bind(airline_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(balance)
    }

    pub async fn get_passenger_balance(
        &self,
        passenger_id: Uuid,
    ) -> Result<Option<Decimal>, ProjectionError> {
        let balance: Option<Decimal> =
            sqlx::query_scalar("SELECT balance FROM passengers WHERE id = $1")
                .bind(passenger_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(balance)
    }
}

/// Projection errors
#[derive(Debug, thiserror::Error)]
pub enum ProjectionError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Airline not found: {0}")]
    AirlineNotFound(Uuid),

    #[error("No airline for account: {0}")]
    AirlineAccountNotFound(Uuid),

    #[error("Passenger not found: {0}")]
    PassengerNotFound(Uuid),

    #[error("Flight not found: {0}")]
    FlightNotFound(Uuid),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_projection_error_display() {
        let err = ProjectionError::FlightNotFound(Uuid::nil());
        assert!(err.to_string().contains("Flight not found"));

        let err = ProjectionError::PassengerNotFound(Uuid::nil());
        assert!(err.to_string().contains("Passenger not found"));
    }
}
