//! Payment instrument
//!
//! An opaque carrier of value split off a balance and later merged into
//! another. `take` and `join` are the only ways value moves between balances,
//! which gives a conservation guarantee: the total across balances and
//! in-flight payments never changes outside explicit top-ups and withdrawals.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::amount::{Amount, Balance};
use super::error::DomainError;

/// A unit of value in flight between two balances.
///
/// A Payment always carries a positive value; a zero-value instrument cannot
/// be constructed (`InvalidPayment`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    amount: Amount,
}

impl Payment {
    /// Split `amount` off `balance`, returning the reduced balance and the
    /// payment carrying exactly that value.
    pub fn take(balance: &Balance, amount: &Amount) -> Result<(Balance, Payment), DomainError> {
        if !balance.is_sufficient_for(amount) {
            return Err(DomainError::InsufficientFunds {
                required: amount.value(),
                available: balance.value(),
            });
        }

        let remaining = balance
            .debit(amount)
            .map_err(|e| DomainError::InvalidAmount(e.to_string()))?;

        Ok((
            remaining,
            Payment {
                amount: amount.clone(),
            },
        ))
    }

    /// Merge this payment into `balance`, consuming the instrument.
    pub fn join(self, balance: &Balance) -> Result<Balance, DomainError> {
        balance
            .credit(&self.amount)
            .map_err(|e| DomainError::InvalidAmount(e.to_string()))
    }

    /// The value this instrument carries.
    pub fn value(&self) -> Decimal {
        self.amount.value()
    }

    /// Borrow the carried amount.
    pub fn amount(&self) -> &Amount {
        &self.amount
    }

    /// Reject instruments that would carry no value where positive value is
    /// required.
    pub fn from_amount(amount: Amount) -> Result<Self, DomainError> {
        if amount.value() <= Decimal::ZERO {
            return Err(DomainError::InvalidPayment);
        }
        Ok(Payment { amount })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_take_and_join_conserve_value() {
        let source = Balance::new(dec!(500)).unwrap();
        let sink = Balance::zero();
        let fare = Amount::new(dec!(180)).unwrap();

        let (source, payment) = Payment::take(&source, &fare).unwrap();
        assert_eq!(payment.value(), dec!(180));
        assert_eq!(source.value(), dec!(320));

        let sink = payment.join(&sink).unwrap();
        assert_eq!(sink.value(), dec!(180));

        // Nothing created, nothing destroyed
        assert_eq!(source.value() + sink.value(), dec!(500));
    }

    #[test]
    fn test_take_insufficient_funds() {
        let source = Balance::new(dec!(100)).unwrap();
        let fare = Amount::new(dec!(180)).unwrap();

        let result = Payment::take(&source, &fare);
        assert!(matches!(result, Err(DomainError::InsufficientFunds { .. })));
    }

    #[test]
    fn test_take_exact_balance() {
        let source = Balance::new(dec!(180)).unwrap();
        let fare = Amount::new(dec!(180)).unwrap();

        let (source, payment) = Payment::take(&source, &fare).unwrap();
        assert_eq!(source.value(), dec!(0));
        assert_eq!(payment.value(), dec!(180));
    }
}
