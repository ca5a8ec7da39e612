//! Airline Aggregate
//!
//! An airline owns its listed flights' price memos and accumulates booking
//! settlements in its balance. The owning account is fixed at creation and
//! every mutating operation checks the caller against it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::domain::{AirlineEvent, Amount, Balance, DomainError, FlightMemo, Payment};

use super::Aggregate;

/// Airline Aggregate
///
/// State is derived from events, never directly mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Airline {
    /// Aggregate ID
    id: Uuid,

    /// Owning account; immutable after creation, equals the creating account
    airline_account: Uuid,

    /// Human-readable carrier name
    name: String,

    /// flight-id -> ticket price fixed at listing time
    prices: HashMap<Uuid, rust_decimal::Decimal>,

    /// memo-id -> price memo; memos are write-once
    memos: HashMap<Uuid, FlightMemo>,

    /// Accumulated settlement balance (never negative)
    balance: Balance,

    /// Current version (number of events applied)
    version: i64,

    /// When the airline was created
    created_at: Option<DateTime<Utc>>,
}

impl Default for Airline {
    fn default() -> Self {
        Self {
            id: Uuid::nil(),
            airline_account: Uuid::nil(),
            name: String::new(),
            prices: HashMap::new(),
            memos: HashMap::new(),
            balance: Balance::zero(),
            version: 0,
            created_at: None,
        }
    }
}

impl Airline {
    /// Create a new airline and generate the creation event
    pub fn create(airline_id: Uuid, airline_account: Uuid, name: String) -> (Self, AirlineEvent) {
        let now = Utc::now();

        let event = AirlineEvent::AirlineCreated {
            airline_id,
            airline_account,
            name: name.clone(),
            created_at: now,
        };

        let airline = Self {
            id: airline_id,
            airline_account,
            name,
            prices: HashMap::new(),
            memos: HashMap::new(),
            balance: Balance::zero(),
            version: 1,
            created_at: Some(now),
        };

        (airline, event)
    }

    // =========================================================================
    // Listing
    // =========================================================================

    /// List a flight: record the quote in the memo map.
    ///
    /// Only the owning account may list; the memo itself is built by the
    /// listing handler alongside the new Flight aggregate.
    pub fn list_flight(
        &self,
        caller: Uuid,
        memo: FlightMemo,
        now: DateTime<Utc>,
    ) -> Result<AirlineEvent, DomainError> {
        if caller != self.airline_account {
            return Err(DomainError::NotAirline);
        }

        Ok(AirlineEvent::FlightListed {
            airline_id: self.id,
            memo,
            listed_at: now,
        })
    }

    // =========================================================================
    // Settlement
    // =========================================================================

    /// Credit a booking settlement into the balance.
    ///
    /// Authorization happens in the booking transition; this only validates
    /// that the credit keeps the balance within bounds.
    pub fn credit_settlement(
        &self,
        amount: &Amount,
        booking_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<AirlineEvent, DomainError> {
        self.balance
            .credit(amount)
            .map_err(|e| DomainError::InvalidAmount(e.to_string()))?;

        Ok(AirlineEvent::SettlementCredited {
            airline_id: self.id,
            amount: amount.value(),
            booking_id,
            credited_at: now,
        })
    }

    /// Withdraw funds to the owning account.
    ///
    /// Returns the event and the payment instrument carrying the withdrawn
    /// value.
    pub fn withdraw(
        &self,
        caller: Uuid,
        amount: &Amount,
        now: DateTime<Utc>,
    ) -> Result<(AirlineEvent, Payment), DomainError> {
        if caller != self.airline_account {
            return Err(DomainError::NotAirline);
        }

        let (_, payment) = Payment::take(&self.balance, amount)?;

        let event = AirlineEvent::FundsWithdrawn {
            airline_id: self.id,
            amount: amount.value(),
            withdrawn_at: now,
        };

        Ok((event, payment))
    }

    // =========================================================================
    // Getters
    // =========================================================================

    pub fn airline_account(&self) -> Uuid {
        self.airline_account
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn balance(&self) -> &Balance {
        &self.balance
    }

    /// Look up a price memo by ID
    pub fn memo(&self, memo_id: Uuid) -> Option<&FlightMemo> {
        self.memos.get(&memo_id)
    }

    /// Look up the listed ticket price of a flight
    pub fn ticket_price(&self, flight_id: Uuid) -> Option<rust_decimal::Decimal> {
        self.prices.get(&flight_id).copied()
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }
}

impl Aggregate for Airline {
    type Event = AirlineEvent;

    fn aggregate_type() -> &'static str {
        "Airline"
    }

    fn id(&self) -> Uuid {
        self.id
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn apply(mut self, event: Self::Event) -> Self {
        match event {
            AirlineEvent::AirlineCreated {
                airline_id,
                airline_account,
                name,
                created_at,
            } => {
                self.id = airline_id;
                self.airline_account = airline_account;
                self.name = name;
                self.balance = Balance::zero();
                self.created_at = Some(created_at);
            }

            AirlineEvent::FlightListed { memo, .. } => {
                self.prices.insert(memo.flight_id, memo.ticket_price);
                self.memos.insert(memo.memo_id, memo);
            }

            AirlineEvent::SettlementCredited { amount, .. } => {
                match Amount::new(amount).and_then(|amt| self.balance.credit(&amt)) {
                    Ok(new_balance) => self.balance = new_balance,
                    Err(e) => {
                        tracing::error!(
                            "Invalid settlement credit during replay for airline {}: {}",
                            self.id,
                            e
                        );
                        // Keep current balance to stay consistent
                    }
                }
            }

            AirlineEvent::FundsWithdrawn { amount, .. } => {
                match Amount::new(amount).and_then(|amt| self.balance.debit(&amt)) {
                    Ok(new_balance) => self.balance = new_balance,
                    Err(e) => {
                        tracing::error!(
                            "Invalid withdrawal during replay for airline {}: {}",
                            self.id,
                            e
                        );
                    }
                }
            }
        }

        self.version += 1;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn listed_airline() -> (Airline, FlightMemo) {
        let account = Uuid::new_v4();
        let (airline, _) = Airline::create(Uuid::new_v4(), account, "Meridian Air".to_string());

        let memo = FlightMemo {
            memo_id: Uuid::new_v4(),
            flight_id: Uuid::new_v4(),
            ticket_price: dec!(500),
            airline_account: account,
        };

        let event = airline
            .list_flight(account, memo.clone(), Utc::now())
            .unwrap();
        (airline.apply(event), memo)
    }

    #[test]
    fn test_airline_create() {
        let airline_id = Uuid::new_v4();
        let account = Uuid::new_v4();

        let (airline, event) = Airline::create(airline_id, account, "Meridian Air".to_string());

        assert_eq!(airline.id(), airline_id);
        assert_eq!(airline.airline_account(), account);
        assert_eq!(airline.name(), "Meridian Air");
        assert_eq!(airline.balance().value(), dec!(0));
        assert_eq!(airline.version(), 1);
        assert!(matches!(event, AirlineEvent::AirlineCreated { .. }));
    }

    #[test]
    fn test_list_flight_stores_memo_and_price() {
        let (airline, memo) = listed_airline();

        assert_eq!(airline.memo(memo.memo_id), Some(&memo));
        assert_eq!(airline.ticket_price(memo.flight_id), Some(dec!(500)));
        assert_eq!(airline.version(), 2);
    }

    #[test]
    fn test_list_flight_requires_owner() {
        let (airline, _) = Airline::create(Uuid::new_v4(), Uuid::new_v4(), "Meridian".to_string());

        let memo = FlightMemo {
            memo_id: Uuid::new_v4(),
            flight_id: Uuid::new_v4(),
            ticket_price: dec!(500),
            airline_account: airline.airline_account(),
        };

        let result = airline.list_flight(Uuid::new_v4(), memo, Utc::now());
        assert!(matches!(result, Err(DomainError::NotAirline)));
    }

    #[test]
    fn test_settlement_credit() {
        let (airline, _) = listed_airline();
        let fare = Amount::new(dec!(500)).unwrap();

        let event = airline
            .credit_settlement(&fare, Uuid::new_v4(), Utc::now())
            .unwrap();
        let airline = airline.apply(event);

        assert_eq!(airline.balance().value(), dec!(500));
    }

    #[test]
    fn test_withdraw() {
        let (airline, _) = listed_airline();
        let fare = Amount::new(dec!(500)).unwrap();
        let event = airline
            .credit_settlement(&fare, Uuid::new_v4(), Utc::now())
            .unwrap();
        let airline = airline.apply(event);

        let amount = Amount::new(dec!(300)).unwrap();
        let (event, payment) = airline
            .withdraw(airline.airline_account(), &amount, Utc::now())
            .unwrap();

        assert_eq!(payment.value(), dec!(300));
        let airline = airline.apply(event);
        assert_eq!(airline.balance().value(), dec!(200));
    }

    #[test]
    fn test_withdraw_requires_owner() {
        let (airline, _) = listed_airline();
        let amount = Amount::new(dec!(10)).unwrap();

        let result = airline.withdraw(Uuid::new_v4(), &amount, Utc::now());
        assert!(matches!(result, Err(DomainError::NotAirline)));
    }

    #[test]
    fn test_withdraw_over_balance() {
        let (airline, _) = listed_airline();
        let amount = Amount::new(dec!(10)).unwrap();

        let result = airline.withdraw(airline.airline_account(), &amount, Utc::now());
        assert!(matches!(
            result,
            Err(DomainError::InsufficientFunds { .. })
        ));
    }
}
