//! Error handling module
//!
//! Centralized error types and HTTP response conversion.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// Application-wide Result type
pub type AppResult<T> = Result<T, AppError>;

/// Application error types
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // Client errors (4xx)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid API key")]
    InvalidApiKey,

    #[error("Permission denied")]
    PermissionDenied,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Airline not found: {0}")]
    AirlineNotFound(String),

    #[error("Passenger not found: {0}")]
    PassengerNotFound(String),

    #[error("Flight not found: {0}")]
    FlightNotFound(String),

    #[error("Booking not found: {0}")]
    BookingNotFound(String),

    #[error("Idempotency conflict: same key with different request")]
    IdempotencyConflict,

    #[error("Version conflict: concurrent modification detected")]
    VersionConflict,

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Missing required header: {0}")]
    MissingHeader(String),

    // Domain errors
    #[error(transparent)]
    Domain(#[from] crate::domain::DomainError),

    // Server errors (5xx)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub error_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_code, details) = match &self {
            // 400 Bad Request
            AppError::InvalidRequest(msg) => {
                (StatusCode::BAD_REQUEST, "invalid_request", Some(msg.clone()))
            }
            AppError::MissingHeader(header) => {
                (StatusCode::BAD_REQUEST, "missing_header", Some(header.clone()))
            }

            // 401 Unauthorized
            AppError::InvalidApiKey => (StatusCode::UNAUTHORIZED, "invalid_api_key", None),

            // 403 Forbidden
            AppError::PermissionDenied => (StatusCode::FORBIDDEN, "permission_denied", None),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", Some(msg.clone())),

            // 404 Not Found
            AppError::AirlineNotFound(id) => {
                (StatusCode::NOT_FOUND, "airline_not_found", Some(id.clone()))
            }
            AppError::PassengerNotFound(id) => {
                (StatusCode::NOT_FOUND, "passenger_not_found", Some(id.clone()))
            }
            AppError::FlightNotFound(id) => {
                (StatusCode::NOT_FOUND, "flight_not_found", Some(id.clone()))
            }
            AppError::BookingNotFound(id) => {
                (StatusCode::NOT_FOUND, "booking_not_found", Some(id.clone()))
            }

            // 409 Conflict
            AppError::IdempotencyConflict => {
                (StatusCode::CONFLICT, "idempotency_conflict", None)
            }
            AppError::VersionConflict => (StatusCode::CONFLICT, "version_conflict", None),

            // 429 Too Many Requests
            AppError::RateLimitExceeded => {
                (StatusCode::TOO_MANY_REQUESTS, "rate_limit_exceeded", None)
            }

            // Domain errors - each precondition kind keeps its own code
            AppError::Domain(ref domain_err) => {
                use crate::domain::DomainError;
                match domain_err {
                    DomainError::NotAirline => {
                        (StatusCode::FORBIDDEN, "not_airline", None)
                    }
                    DomainError::NotPassenger => {
                        (StatusCode::FORBIDDEN, "not_passenger", None)
                    }
                    DomainError::InvalidFlight => {
                        (StatusCode::UNPROCESSABLE_ENTITY, "invalid_flight", None)
                    }
                    DomainError::InvalidFlightBooking => {
                        (StatusCode::UNPROCESSABLE_ENTITY, "invalid_flight_booking", None)
                    }
                    DomainError::InsufficientFunds { .. } => (
                        StatusCode::BAD_REQUEST,
                        "insufficient_funds",
                        Some(domain_err.to_string()),
                    ),
                    DomainError::InvalidPayment => {
                        (StatusCode::BAD_REQUEST, "invalid_payment", None)
                    }
                    DomainError::InvalidAmount(msg) => {
                        (StatusCode::BAD_REQUEST, "invalid_amount", Some(msg.clone()))
                    }
                }
            }

            // 500 Internal Server Error
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "database_error", None)
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
            AppError::Config(e) => {
                tracing::error!("Config error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "config_error", None)
            }
        };

        let body = ErrorResponse {
            error: self.to_string(),
            error_code: error_code.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

impl From<crate::event_store::EventStoreError> for AppError {
    fn from(e: crate::event_store::EventStoreError) -> Self {
        use crate::event_store::EventStoreError;
        match e {
            EventStoreError::VersionConflict { .. } | EventStoreError::RetriesExhausted => {
                AppError::VersionConflict
            }
            EventStoreError::IdempotencyKeyInFlight(_) => AppError::IdempotencyConflict,
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl From<crate::projection::ProjectionError> for AppError {
    fn from(e: crate::projection::ProjectionError) -> Self {
        use crate::projection::ProjectionError;
        match e {
            ProjectionError::AirlineNotFound(id) | ProjectionError::AirlineAccountNotFound(id) => {
                AppError::AirlineNotFound(id.to_string())
            }
            ProjectionError::PassengerNotFound(id) => AppError::PassengerNotFound(id.to_string()),
            ProjectionError::FlightNotFound(id) => AppError::FlightNotFound(id.to_string()),
            ProjectionError::Database(e) => AppError::Database(e),
        }
    }
}
