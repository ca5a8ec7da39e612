//! API Routes
//!
//! HTTP endpoint definitions.

use axum::{
    extract::{Extension, Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::audit::{AuditAction, AuditLogBuilder, AuditLogService};
use crate::domain::OperationContext;
use crate::error::AppError;
use crate::handlers::{
    BookFlightCommand, BookFlightForSelfHandler, BookFlightHandler, CreateAirlineCommand,
    CreateAirlineHandler, CreatePassengerCommand, CreatePassengerHandler, ListFlightCommand,
    ListFlightHandler, ReturnFlightCommand, ReturnFlightHandler, TopUpCommand, TopUpHandler,
    TransferFlightCommand, TransferFlightHandler, WithdrawCommand, WithdrawHandler,
};
use crate::projection::ProjectionService;

use super::middleware::{AuthenticatedApiKey, RequestAccount};

// =========================================================================
// Request/Response types
// =========================================================================

#[derive(Debug, Deserialize)]
pub struct CreateAirlineRequest {
    pub account_id: Uuid,
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct CreateAirlineResponse {
    pub airline_id: Uuid,
    pub account_id: Uuid,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct CreatePassengerRequest {
    pub account_id: Uuid,
    pub airline_id: Uuid,
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct CreatePassengerResponse {
    pub passenger_id: Uuid,
    pub account_id: Uuid,
    pub airline_id: Uuid,
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct AirlineResponse {
    pub id: Uuid,
    pub account_id: Uuid,
    pub name: String,
    pub balance: Decimal,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct PassengerResponse {
    pub id: Uuid,
    pub account_id: Uuid,
    pub airline_id: Uuid,
    pub name: String,
    pub balance: Decimal,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct ListFlightRequest {
    pub airline_id: Uuid,
    pub flight_number: String,
    pub destination: String,
    pub departure_time: DateTime<Utc>,
    pub ticket_price: String,
}

#[derive(Debug, Serialize)]
pub struct ListFlightResponse {
    pub flight_id: Uuid,
    pub memo_id: Uuid,
    pub ticket_price: Decimal,
    pub available_seats: i32,
}

#[derive(Debug, Serialize)]
pub struct FlightResponse {
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

#[derive(Debug, Deserialize)]
pub struct BookFlightRequest {
    pub airline_id: Uuid,
    pub passenger_id: Uuid,
    pub flight_id: Uuid,
    pub memo_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct BookFlightResponse {
    pub booking_id: Uuid,
    pub passenger_id: Uuid,
    pub flight_id: Uuid,
    pub paid_amount: Decimal,
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct BookingResponse {
    pub id: Uuid,
    pub passenger_id: Uuid,
    pub flight_id: Uuid,
    pub passenger_account: Uuid,
    pub airline_account: Uuid,
    pub paid_amount: Decimal,
    pub ticket_price: Decimal,
    pub booked_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct TopUpRequest {
    pub amount: String,
}

#[derive(Debug, Serialize)]
pub struct TopUpResponse {
    pub passenger_id: Uuid,
    pub amount: Decimal,
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct WithdrawRequest {
    pub amount: String,
}

#[derive(Debug, Serialize)]
pub struct WithdrawResponse {
    pub airline_id: Uuid,
    pub amount: Decimal,
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct ReturnFlightRequest {
    pub airline_id: Uuid,
    pub passenger_id: Uuid,
    pub flight_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct ReturnFlightResponse {
    pub booking_id: Uuid,
    pub flight_id: Uuid,
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct TransferFlightRequest {
    pub passenger_id: Uuid,
    pub flight_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct TransferFlightResponse {
    pub flight_id: Uuid,
    pub passenger_id: Uuid,
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub id: Uuid,
    pub balance: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    #[serde(default)]
    pub aggregate_type: Option<String>,
    #[serde(default)]
    pub aggregate_id: Option<Uuid>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    50
}

#[derive(Debug, Serialize)]
pub struct EventResponse {
    pub id: Uuid,
    pub aggregate_type: String,
    pub aggregate_id: Uuid,
    pub event_type: String,
    pub version: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct EventsListResponse {
    pub events: Vec<EventResponse>,
    pub total: i64,
}

#[derive(Debug, Deserialize)]
pub struct AuditVerifyQuery {
    #[serde(default)]
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct AuditVerifyResponse {
    pub is_valid: bool,
    pub entries_checked: u64,
    pub first_invalid_entry: Option<Uuid>,
}

// =========================================================================
// API Router
// =========================================================================

/// Create the API router
pub fn create_router() -> Router<PgPool> {
    Router::new()
        // Airline registry
        .route("/airlines", post(create_airline))
        .route("/airlines/:airline_id", get(get_airline))
        .route("/airlines/:airline_id/balance", get(get_airline_balance))
        .route("/airlines/:airline_id/flights", get(get_airline_flights))
        .route("/airlines/:airline_id/withdrawals", post(withdraw))
        // Passenger registry
        .route("/passengers", post(create_passenger))
        .route("/passengers/:passenger_id", get(get_passenger))
        .route(
            "/passengers/:passenger_id/balance",
            get(get_passenger_balance),
        )
        .route(
            "/passengers/:passenger_id/bookings",
            get(get_passenger_bookings),
        )
        .route("/passengers/:passenger_id/top-ups", post(top_up))
        // Flight listings
        .route("/flights", post(list_flight))
        .route("/flights/:flight_id", get(get_flight))
        // Bookings
        .route("/bookings", post(book_flight))
        .route("/bookings/self", post(book_flight_for_self))
        .route("/bookings/:booking_id", get(get_booking))
        .route("/bookings/:booking_id/return", post(return_flight))
        .route("/bookings/:booking_id/transfer", post(transfer_flight))
        // Admin
        .route("/admin/events", get(get_events))
        .route("/admin/audit/verify", get(verify_audit_chain))
}

/// Extract an Idempotency-Key header if present and well formed
fn idempotency_key(headers: &HeaderMap) -> Option<Uuid> {
    headers
        .get("Idempotency-Key")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| Uuid::parse_str(s).ok())
}

/// Record an audit entry for a completed operation. Audit failures are
/// logged but never fail the request that already settled.
async fn audit(pool: &PgPool, builder: AuditLogBuilder, context: &OperationContext) {
    let service = AuditLogService::new(pool.clone());
    if let Err(e) = service.log(builder, context).await {
        tracing::warn!("Failed to write audit log entry: {}", e);
    }
}

// =========================================================================
// POST /airlines
// =========================================================================

/// Register a new airline
async fn create_airline(
    State(pool): State<PgPool>,
    Extension(context): Extension<OperationContext>,
    headers: HeaderMap,
    Json(request): Json<CreateAirlineRequest>,
) -> Result<(StatusCode, Json<CreateAirlineResponse>), AppError> {
    let handler = CreateAirlineHandler::new(pool.clone());

    let command = CreateAirlineCommand {
        account_id: request.account_id,
        name: request.name,
    };

    let result = handler
        .execute(command, idempotency_key(&headers), &context)
        .await?;

    audit(
        &pool,
        AuditLogBuilder::new(AuditAction::AirlineCreated)
            .resource_type("Airline")
            .resource_id(result.airline_id)
            .after_state(&result),
        &context,
    )
    .await;

    Ok((
        StatusCode::CREATED,
        Json(CreateAirlineResponse {
            airline_id: result.airline_id,
            account_id: result.account_id,
            name: result.name,
        }),
    ))
}

// =========================================================================
// GET /airlines/:airline_id
// =========================================================================

async fn get_airline(
    State(pool): State<PgPool>,
    Path(airline_id): Path<Uuid>,
) -> Result<Json<AirlineResponse>, AppError> {
    let projection = ProjectionService::new(pool);

    let row = projection
        .get_airline(airline_id)
        .await?
        .ok_or_else(|| AppError::AirlineNotFound(airline_id.to_string()))?;

    Ok(Json(AirlineResponse {
        id: row.id,
        account_id: row.account_id,
        name: row.name,
        balance: row.balance,
        created_at: row.created_at,
    }))
}

// =========================================================================
// GET /airlines/:airline_id/balance
// =========================================================================

async fn get_airline_balance(
    State(pool): State<PgPool>,
    Path(airline_id): Path<Uuid>,
) -> Result<Json<BalanceResponse>, AppError> {
    let projection = ProjectionService::new(pool);

    let balance = projection
        .get_airline_balance(airline_id)
        .await?
        .ok_or_else(|| AppError::AirlineNotFound(airline_id.to_string()))?;

    Ok(Json(BalanceResponse {
        id: airline_id,
        balance,
    }))
}

// =========================================================================
// GET /airlines/:airline_id/flights
// =========================================================================

async fn get_airline_flights(
    State(pool): State<PgPool>,
    Path(airline_id): Path<Uuid>,
) -> Result<Json<Vec<FlightResponse>>, AppError> {
    let projection = ProjectionService::new(pool);

    let airline = projection
        .get_airline(airline_id)
        .await?
        .ok_or_else(|| AppError::AirlineNotFound(airline_id.to_string()))?;

    let rows = projection.list_flights_of_airline(airline.account_id).await?;

    Ok(Json(rows.into_iter().map(flight_response).collect()))
}

// =========================================================================
// POST /airlines/:airline_id/withdrawals
// =========================================================================

/// Withdraw earned revenue from an airline balance
async fn withdraw(
    State(pool): State<PgPool>,
    Extension(context): Extension<OperationContext>,
    request_account: Option<Extension<RequestAccount>>,
    Path(airline_id): Path<Uuid>,
    headers: HeaderMap,
    Json(request): Json<WithdrawRequest>,
) -> Result<Json<WithdrawResponse>, AppError> {
    request_account.ok_or_else(|| AppError::MissingHeader("X-Request-Account-Id".to_string()))?;

    let handler = WithdrawHandler::new(pool.clone());

    let command = WithdrawCommand {
        airline_id,
        amount: request.amount,
    };

    let result = handler
        .execute(command, idempotency_key(&headers), &context)
        .await?;

    audit(
        &pool,
        AuditLogBuilder::new(AuditAction::FundsWithdrawn)
            .resource_type("Airline")
            .resource_id(airline_id)
            .after_state(&result),
        &context,
    )
    .await;

    Ok(Json(WithdrawResponse {
        airline_id: result.airline_id,
        amount: result.amount,
        status: result.status,
    }))
}

// =========================================================================
// POST /passengers
// =========================================================================

/// Register a new passenger with an airline
async fn create_passenger(
    State(pool): State<PgPool>,
    Extension(context): Extension<OperationContext>,
    headers: HeaderMap,
    Json(request): Json<CreatePassengerRequest>,
) -> Result<(StatusCode, Json<CreatePassengerResponse>), AppError> {
    let handler = CreatePassengerHandler::new(pool.clone());

    let command = CreatePassengerCommand {
        account_id: request.account_id,
        airline_id: request.airline_id,
        name: request.name,
    };

    let result = handler
        .execute(command, idempotency_key(&headers), &context)
        .await?;

    audit(
        &pool,
        AuditLogBuilder::new(AuditAction::PassengerCreated)
            .resource_type("Passenger")
            .resource_id(result.passenger_id)
            .after_state(&result),
        &context,
    )
    .await;

    Ok((
        StatusCode::CREATED,
        Json(CreatePassengerResponse {
            passenger_id: result.passenger_id,
            account_id: result.account_id,
            airline_id: result.airline_id,
            name: result.name,
        }),
    ))
}

// =========================================================================
// GET /passengers/:passenger_id
// =========================================================================

async fn get_passenger(
    State(pool): State<PgPool>,
    Path(passenger_id): Path<Uuid>,
) -> Result<Json<PassengerResponse>, AppError> {
    let projection = ProjectionService::new(pool);

    let row = projection
        .get_passenger(passenger_id)
        .await?
        .ok_or_else(|| AppError::PassengerNotFound(passenger_id.to_string()))?;

    Ok(Json(PassengerResponse {
        id: row.id,
        account_id: row.account_id,
        airline_id: row.airline_id,
        name: row.name,
        balance: row.balance,
        created_at: row.created_at,
    }))
}

// =========================================================================
// GET /passengers/:passenger_id/balance
// =========================================================================

async fn get_passenger_balance(
    State(pool): State<PgPool>,
    Path(passenger_id): Path<Uuid>,
) -> Result<Json<BalanceResponse>, AppError> {
    let projection = ProjectionService::new(pool);

    let balance = projection
        .get_passenger_balance(passenger_id)
        .await?
        .ok_or_else(|| AppError::PassengerNotFound(passenger_id.to_string()))?;

    Ok(Json(BalanceResponse {
        id: passenger_id,
        balance,
    }))
}

// =========================================================================
// GET /passengers/:passenger_id/bookings
// =========================================================================

async fn get_passenger_bookings(
    State(pool): State<PgPool>,
    Path(passenger_id): Path<Uuid>,
) -> Result<Json<Vec<BookingResponse>>, AppError> {
    let projection = ProjectionService::new(pool);

    // Distinguish an unknown passenger from one with no bookings
    projection
        .get_passenger(passenger_id)
        .await?
        .ok_or_else(|| AppError::PassengerNotFound(passenger_id.to_string()))?;

    let rows = projection.list_bookings_of_passenger(passenger_id).await?;

    Ok(Json(rows.into_iter().map(booking_response).collect()))
}

// =========================================================================
// POST /passengers/:passenger_id/top-ups
// =========================================================================

/// Credit a passenger's prepaid balance
async fn top_up(
    State(pool): State<PgPool>,
    Extension(context): Extension<OperationContext>,
    request_account: Option<Extension<RequestAccount>>,
    Path(passenger_id): Path<Uuid>,
    headers: HeaderMap,
    Json(request): Json<TopUpRequest>,
) -> Result<Json<TopUpResponse>, AppError> {
    request_account.ok_or_else(|| AppError::MissingHeader("X-Request-Account-Id".to_string()))?;

    let handler = TopUpHandler::new(pool.clone());

    let command = TopUpCommand {
        passenger_id,
        amount: request.amount,
    };

    let result = handler
        .execute(command, idempotency_key(&headers), &context)
        .await?;

    audit(
        &pool,
        AuditLogBuilder::new(AuditAction::BalanceToppedUp)
            .resource_type("Passenger")
            .resource_id(passenger_id)
            .after_state(&result),
        &context,
    )
    .await;

    Ok(Json(TopUpResponse {
        passenger_id: result.passenger_id,
        amount: result.amount,
        status: result.status,
    }))
}

// =========================================================================
// POST /flights
// =========================================================================

/// List a flight with its ticket price memo
async fn list_flight(
    State(pool): State<PgPool>,
    Extension(context): Extension<OperationContext>,
    request_account: Option<Extension<RequestAccount>>,
    headers: HeaderMap,
    Json(request): Json<ListFlightRequest>,
) -> Result<(StatusCode, Json<ListFlightResponse>), AppError> {
    request_account.ok_or_else(|| AppError::MissingHeader("X-Request-Account-Id".to_string()))?;

    let handler = ListFlightHandler::new(pool.clone());

    let command = ListFlightCommand {
        airline_id: request.airline_id,
        flight_number: request.flight_number,
        destination: request.destination,
        departure_time: request.departure_time,
        ticket_price: request.ticket_price,
    };

    let result = handler
        .execute(command, idempotency_key(&headers), &context)
        .await?;

    audit(
        &pool,
        AuditLogBuilder::new(AuditAction::FlightListed)
            .resource_type("Flight")
            .resource_id(result.flight_id)
            .after_state(&result),
        &context,
    )
    .await;

    Ok((
        StatusCode::CREATED,
        Json(ListFlightResponse {
            flight_id: result.flight_id,
            memo_id: result.memo_id,
            ticket_price: result.ticket_price,
            available_seats: result.available_seats,
        }),
    ))
}

// =========================================================================
// GET /flights/:flight_id
// =========================================================================

async fn get_flight(
    State(pool): State<PgPool>,
    Path(flight_id): Path<Uuid>,
) -> Result<Json<FlightResponse>, AppError> {
    let projection = ProjectionService::new(pool);

    let row = projection
        .get_flight(flight_id)
        .await?
        .ok_or_else(|| AppError::FlightNotFound(flight_id.to_string()))?;

    Ok(Json(flight_response(row)))
}

// =========================================================================
// POST /bookings
// =========================================================================

/// Book a seat, airline-initiated against a listed price memo
async fn book_flight(
    State(pool): State<PgPool>,
    Extension(context): Extension<OperationContext>,
    request_account: Option<Extension<RequestAccount>>,
    headers: HeaderMap,
    Json(request): Json<BookFlightRequest>,
) -> Result<(StatusCode, Json<BookFlightResponse>), AppError> {
    request_account.ok_or_else(|| AppError::MissingHeader("X-Request-Account-Id".to_string()))?;

    let handler = BookFlightHandler::new(pool.clone());

    let command = BookFlightCommand {
        airline_id: request.airline_id,
        passenger_id: request.passenger_id,
        flight_id: request.flight_id,
        memo_id: request.memo_id,
    };

    let result = handler
        .execute(command, idempotency_key(&headers), &context)
        .await?;

    audit(
        &pool,
        AuditLogBuilder::new(AuditAction::BookingExecuted)
            .resource_type("BookingRecord")
            .resource_id(result.booking_id)
            .after_state(&result),
        &context,
    )
    .await;

    Ok((
        StatusCode::CREATED,
        Json(BookFlightResponse {
            booking_id: result.booking_id,
            passenger_id: result.passenger_id,
            flight_id: result.flight_id,
            paid_amount: result.paid_amount,
            status: result.status,
        }),
    ))
}

// =========================================================================
// POST /bookings/self
// =========================================================================

/// Book a seat, passenger-initiated; settles directly into the airline
async fn book_flight_for_self(
    State(pool): State<PgPool>,
    Extension(context): Extension<OperationContext>,
    request_account: Option<Extension<RequestAccount>>,
    headers: HeaderMap,
    Json(request): Json<BookFlightRequest>,
) -> Result<(StatusCode, Json<BookFlightResponse>), AppError> {
    request_account.ok_or_else(|| AppError::MissingHeader("X-Request-Account-Id".to_string()))?;

    let handler = BookFlightForSelfHandler::new(pool.clone());

    let command = BookFlightCommand {
        airline_id: request.airline_id,
        passenger_id: request.passenger_id,
        flight_id: request.flight_id,
        memo_id: request.memo_id,
    };

    let result = handler
        .execute(command, idempotency_key(&headers), &context)
        .await?;

    audit(
        &pool,
        AuditLogBuilder::new(AuditAction::BookingExecuted)
            .resource_type("BookingRecord")
            .resource_id(result.booking_id)
            .after_state(&result),
        &context,
    )
    .await;

    Ok((
        StatusCode::CREATED,
        Json(BookFlightResponse {
            booking_id: result.booking_id,
            passenger_id: result.passenger_id,
            flight_id: result.flight_id,
            paid_amount: result.paid_amount,
            status: result.status,
        }),
    ))
}

// =========================================================================
// GET /bookings/:booking_id
// =========================================================================

async fn get_booking(
    State(pool): State<PgPool>,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<BookingResponse>, AppError> {
    let projection = ProjectionService::new(pool);

    let row = projection
        .get_booking(booking_id)
        .await?
        .ok_or_else(|| AppError::BookingNotFound(booking_id.to_string()))?;

    Ok(Json(booking_response(row)))
}

// =========================================================================
// POST /bookings/:booking_id/return
// =========================================================================

/// Release a booked seat back to inventory against the booking record
async fn return_flight(
    State(pool): State<PgPool>,
    Extension(context): Extension<OperationContext>,
    request_account: Option<Extension<RequestAccount>>,
    Path(booking_id): Path<Uuid>,
    headers: HeaderMap,
    Json(request): Json<ReturnFlightRequest>,
) -> Result<Json<ReturnFlightResponse>, AppError> {
    request_account.ok_or_else(|| AppError::MissingHeader("X-Request-Account-Id".to_string()))?;

    let handler = ReturnFlightHandler::new(pool.clone());

    let command = ReturnFlightCommand {
        airline_id: request.airline_id,
        passenger_id: request.passenger_id,
        flight_id: request.flight_id,
        booking_id,
    };

    let result = handler
        .execute(command, idempotency_key(&headers), &context)
        .await?;

    audit(
        &pool,
        AuditLogBuilder::new(AuditAction::BookingReturned)
            .resource_type("BookingRecord")
            .resource_id(booking_id)
            .after_state(&result),
        &context,
    )
    .await;

    Ok(Json(ReturnFlightResponse {
        booking_id: result.booking_id,
        flight_id: result.flight_id,
        status: result.status,
    }))
}

// =========================================================================
// POST /bookings/:booking_id/transfer
// =========================================================================

/// Transfer flight custody to the passenger holding the booking record
async fn transfer_flight(
    State(pool): State<PgPool>,
    Extension(context): Extension<OperationContext>,
    request_account: Option<Extension<RequestAccount>>,
    Path(booking_id): Path<Uuid>,
    headers: HeaderMap,
    Json(request): Json<TransferFlightRequest>,
) -> Result<Json<TransferFlightResponse>, AppError> {
    request_account.ok_or_else(|| AppError::MissingHeader("X-Request-Account-Id".to_string()))?;

    let handler = TransferFlightHandler::new(pool.clone());

    let command = TransferFlightCommand {
        passenger_id: request.passenger_id,
        flight_id: request.flight_id,
        booking_id,
    };

    let result = handler
        .execute(command, idempotency_key(&headers), &context)
        .await?;

    audit(
        &pool,
        AuditLogBuilder::new(AuditAction::FlightTransferred)
            .resource_type("Flight")
            .resource_id(result.flight_id)
            .after_state(&result),
        &context,
    )
    .await;

    Ok(Json(TransferFlightResponse {
        flight_id: result.flight_id,
        passenger_id: result.passenger_id,
        status: result.status,
    }))
}

// =========================================================================
// GET /admin/events
// =========================================================================

/// Inspect the event stream (admin only)
async fn get_events(
    State(pool): State<PgPool>,
    Extension(api_key): Extension<AuthenticatedApiKey>,
    Query(query): Query<EventsQuery>,
) -> Result<Json<EventsListResponse>, AppError> {
    if !api_key.has_permission("admin") {
        return Err(AppError::Forbidden("admin permission required".to_string()));
    }

    let limit = query.limit.min(1000);
    let offset = query.offset;

    let events: Vec<(Uuid, String, Uuid, String, i64, DateTime<Utc>)> =
        if let Some(ref agg_type) = query.aggregate_type {
            if let Some(agg_id) = query.aggregate_id {
                sqlx::query_as(
                    r#"
                    SELECT id, aggregate_type, aggregate_id, event_type, version, created_at
                    FROM events
                    WHERE aggregate_type = $1 AND aggregate_id = $2
                    ORDER BY created_at DESC
                    LIMIT $3 OFFSET $4
                    "#,
                )
                .bind(agg_type)
                .bind(agg_id)
                .bind(limit)
                .bind(offset)
                .fetch_all(&pool)
                .await?
            } else {
                sqlx::query_as(
                    r#"
                    SELECT id, aggregate_type, aggregate_id, event_type, version, created_at
                    FROM events
                    WHERE aggregate_type = $1
                    ORDER BY created_at DESC
                    LIMIT $2 OFFSET $3
                    "#,
                )
                .bind(agg_type)
                .bind(limit)
                .bind(offset)
                .fetch_all(&pool)
                .await?
            }
        } else {
            sqlx::query_as(
                r#"
                SELECT id, aggregate_type, aggregate_id, event_type, version, created_at
                FROM events
                ORDER BY created_at DESC
                LIMIT $1 OFFSET $2
                "#,
            )
            .bind(limit)
            .bind(offset)
            .fetch_all(&pool)
            .await?
        };

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM events")
        .fetch_one(&pool)
        .await?;

    let events: Vec<EventResponse> = events
        .into_iter()
        .map(
            |(id, aggregate_type, aggregate_id, event_type, version, created_at)| EventResponse {
                id,
                aggregate_type,
                aggregate_id,
                event_type,
                version,
                created_at,
            },
        )
        .collect();

    Ok(Json(EventsListResponse { events, total }))
}

// =========================================================================
// GET /admin/audit/verify
// =========================================================================

/// Verify the audit log hash chain (admin only)
async fn verify_audit_chain(
    State(pool): State<PgPool>,
    Extension(api_key): Extension<AuthenticatedApiKey>,
    Query(query): Query<AuditVerifyQuery>,
) -> Result<Json<AuditVerifyResponse>, AppError> {
    if !api_key.has_permission("admin") {
        return Err(AppError::Forbidden("admin permission required".to_string()));
    }

    let service = AuditLogService::new(pool);
    let result = service
        .verify_hash_chain(query.limit)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(Json(AuditVerifyResponse {
        is_valid: result.is_valid,
        entries_checked: result.entries_checked,
        first_invalid_entry: result.first_invalid_entry,
    }))
}

// =========================================================================
// Row conversions
// =========================================================================

fn flight_response(row: crate::projection::FlightRow) -> FlightResponse {
    FlightResponse {
        id: row.id,
        airline_account: row.airline_account,
        flight_number: row.flight_number,
        destination: row.destination,
        departure_time: row.departure_time,
        available_seats: row.available_seats,
        custody_holder: row.custody_holder,
        custody_passenger_id: row.custody_passenger_id,
        created_at: row.created_at,
    }
}

fn booking_response(row: crate::projection::BookingRecordRow) -> BookingResponse {
    BookingResponse {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_airline_request_deserialize() {
        let json = r#"{
            "account_id": "550e8400-e29b-41d4-a716-446655440000",
            "name": "Meridian Air"
        }"#;

        let request: CreateAirlineRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.name, "Meridian Air");
    }

    #[test]
    fn test_list_flight_request_deserialize() {
        let json = r#"{
            "airline_id": "550e8400-e29b-41d4-a716-446655440001",
            "flight_number": "MA204",
            "destination": "Lisbon",
            "departure_time": "2026-09-14T08:30:00Z",
            "ticket_price": "500.00"
        }"#;

        let request: ListFlightRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.ticket_price, "500.00");
        assert_eq!(request.destination, "Lisbon");
    }

    #[test]
    fn test_events_query_defaults() {
        let query: EventsQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(query.limit, 50);
        assert_eq!(query.offset, 0);
        assert!(query.aggregate_type.is_none());
    }

    #[test]
    fn test_idempotency_key_parsing() {
        let mut headers = HeaderMap::new();
        assert!(idempotency_key(&headers).is_none());

        headers.insert(
            "Idempotency-Key",
            "550e8400-e29b-41d4-a716-446655440000".parse().unwrap(),
        );
        assert!(idempotency_key(&headers).is_some());

        headers.insert("Idempotency-Key", "not-a-uuid".parse().unwrap());
        assert!(idempotency_key(&headers).is_none());
    }
}
