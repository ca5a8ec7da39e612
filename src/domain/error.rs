//! Domain Error Types
//!
//! Pure booking/settlement errors that don't depend on infrastructure.

use thiserror::Error;

/// Business rule violations in the booking and settlement engine.
///
/// Every precondition failure is a distinct kind; a failed precondition
/// aborts the whole transition with no state change.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DomainError {
    /// Caller is not the owning account of the airline it is acting on
    #[error("Caller is not the airline on record")]
    NotAirline,

    /// Caller is not the passenger's owning account, or the passenger is not
    /// registered with the airline involved in the transition
    #[error("Caller is not the passenger on record, or passenger is registered with a different airline")]
    NotPassenger,

    /// Flight/airline relationship violated, no seats available, or custody
    /// does not permit the operation
    #[error("Invalid flight for this operation")]
    InvalidFlight,

    /// The referenced price memo or booking record does not exist
    #[error("No such flight booking reference")]
    InvalidFlightBooking,

    /// Balance below the required amount
    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds {
        required: rust_decimal::Decimal,
        available: rust_decimal::Decimal,
    },

    /// A payment instrument carried zero value where positive value was required
    #[error("Payment instrument carries no value")]
    InvalidPayment,

    /// Invalid amount (zero, negative, over-scale, or exceeding the limit)
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
}

impl DomainError {
    /// Create an insufficient funds error
    pub fn insufficient_funds(
        required: rust_decimal::Decimal,
        available: rust_decimal::Decimal,
    ) -> Self {
        Self::InsufficientFunds {
            required,
            available,
        }
    }

    /// Authorization failures (caller identity mismatch)
    pub fn is_authorization_error(&self) -> bool {
        matches!(self, Self::NotAirline | Self::NotPassenger)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn test_insufficient_funds_error() {
        let err = DomainError::insufficient_funds(Decimal::new(500, 0), Decimal::new(120, 0));

        assert!(!err.is_authorization_error());
        assert!(err.to_string().contains("500"));
        assert!(err.to_string().contains("120"));
    }

    #[test]
    fn test_authorization_errors() {
        assert!(DomainError::NotAirline.is_authorization_error());
        assert!(DomainError::NotPassenger.is_authorization_error());
        assert!(!DomainError::InvalidFlight.is_authorization_error());
        assert!(!DomainError::InvalidFlightBooking.is_authorization_error());
    }
}
