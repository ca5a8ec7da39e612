//! Passenger Aggregate
//!
//! A passenger holds a prepaid balance and is registered with exactly one
//! airline. The owning account is fixed at creation; the balance is never
//! negative.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{Amount, Balance, DomainError, PassengerEvent};

use super::Aggregate;

/// Passenger Aggregate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Passenger {
    /// Aggregate ID
    id: Uuid,

    /// Owning account; immutable after creation
    passenger_account: Uuid,

    /// Airline aggregate this passenger is registered with
    airline_id: Uuid,

    /// Human-readable name
    name: String,

    /// Prepaid balance (never negative)
    balance: Balance,

    /// Current version
    version: i64,

    /// When the passenger was created
    created_at: Option<DateTime<Utc>>,
}

impl Default for Passenger {
    fn default() -> Self {
        Self {
            id: Uuid::nil(),
            passenger_account: Uuid::nil(),
            airline_id: Uuid::nil(),
            name: String::new(),
            balance: Balance::zero(),
            version: 0,
            created_at: None,
        }
    }
}

impl Passenger {
    /// Create a new passenger registered with an airline
    pub fn create(
        passenger_id: Uuid,
        passenger_account: Uuid,
        airline_id: Uuid,
        name: String,
    ) -> (Self, PassengerEvent) {
        let now = Utc::now();

        let event = PassengerEvent::PassengerCreated {
            passenger_id,
            passenger_account,
            airline_id,
            name: name.clone(),
            created_at: now,
        };

        let passenger = Self {
            id: passenger_id,
            passenger_account,
            airline_id,
            name,
            balance: Balance::zero(),
            version: 1,
            created_at: Some(now),
        };

        (passenger, event)
    }

    /// Top up the prepaid balance. Only the owning account may top up.
    pub fn top_up(
        &self,
        caller: Uuid,
        amount: &Amount,
        now: DateTime<Utc>,
    ) -> Result<PassengerEvent, DomainError> {
        if caller != self.passenger_account {
            return Err(DomainError::NotPassenger);
        }

        self.balance
            .credit(amount)
            .map_err(|e| DomainError::InvalidAmount(e.to_string()))?;

        Ok(PassengerEvent::BalanceToppedUp {
            passenger_id: self.id,
            amount: amount.value(),
            topped_up_at: now,
        })
    }

    /// Debit the ticket price as part of a booking settlement.
    ///
    /// Authorization happens in the booking transition; this validates the
    /// funds only.
    pub fn debit_fare(
        &self,
        amount: &Amount,
        booking_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<PassengerEvent, DomainError> {
        if !self.balance.is_sufficient_for(amount) {
            return Err(DomainError::insufficient_funds(
                amount.value(),
                self.balance.value(),
            ));
        }

        Ok(PassengerEvent::FareDebited {
            passenger_id: self.id,
            amount: amount.value(),
            booking_id,
            debited_at: now,
        })
    }

    // =========================================================================
    // Getters
    // =========================================================================

    pub fn passenger_account(&self) -> Uuid {
        self.passenger_account
    }

    pub fn airline_id(&self) -> Uuid {
        self.airline_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn balance(&self) -> &Balance {
        &self.balance
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }
}

impl Aggregate for Passenger {
    type Event = PassengerEvent;

    fn aggregate_type() -> &'static str {
        "Passenger"
    }

    fn id(&self) -> Uuid {
        self.id
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn apply(mut self, event: Self::Event) -> Self {
        match event {
            PassengerEvent::PassengerCreated {
                passenger_id,
                passenger_account,
                airline_id,
                name,
                created_at,
            } => {
                self.id = passenger_id;
                self.passenger_account = passenger_account;
                self.airline_id = airline_id;
                self.name = name;
                self.balance = Balance::zero();
                self.created_at = Some(created_at);
            }

            PassengerEvent::BalanceToppedUp { amount, .. } => {
                match Amount::new(amount).and_then(|amt| self.balance.credit(&amt)) {
                    Ok(new_balance) => self.balance = new_balance,
                    Err(e) => {
                        tracing::error!(
                            "Invalid top-up during replay for passenger {}: {}",
                            self.id,
                            e
                        );
                    }
                }
            }

            PassengerEvent::FareDebited { amount, .. } => {
                match Amount::new(amount).and_then(|amt| self.balance.debit(&amt)) {
                    Ok(new_balance) => self.balance = new_balance,
                    Err(e) => {
                        tracing::error!(
                            "Invalid fare debit during replay for passenger {}: {}",
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

    fn new_passenger() -> Passenger {
        let (passenger, _) = Passenger::create(
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            "Dana Reyes".to_string(),
        );
        passenger
    }

    #[test]
    fn test_passenger_create() {
        let passenger_id = Uuid::new_v4();
        let account = Uuid::new_v4();
        let airline_id = Uuid::new_v4();

        let (passenger, event) =
            Passenger::create(passenger_id, account, airline_id, "Dana Reyes".to_string());

        assert_eq!(passenger.id(), passenger_id);
        assert_eq!(passenger.passenger_account(), account);
        assert_eq!(passenger.airline_id(), airline_id);
        assert_eq!(passenger.balance().value(), dec!(0));
        assert_eq!(passenger.version(), 1);
        assert!(matches!(event, PassengerEvent::PassengerCreated { .. }));
    }

    #[test]
    fn test_top_up() {
        let passenger = new_passenger();
        let amount = Amount::new(dec!(500)).unwrap();

        let event = passenger
            .top_up(passenger.passenger_account(), &amount, Utc::now())
            .unwrap();
        let passenger = passenger.apply(event);

        assert_eq!(passenger.balance().value(), dec!(500));
        assert_eq!(passenger.version(), 2);
    }

    #[test]
    fn test_top_up_requires_owner() {
        let passenger = new_passenger();
        let amount = Amount::new(dec!(500)).unwrap();

        let result = passenger.top_up(Uuid::new_v4(), &amount, Utc::now());
        assert!(matches!(result, Err(DomainError::NotPassenger)));
    }

    #[test]
    fn test_debit_fare() {
        let passenger = new_passenger();
        let top_up = Amount::new(dec!(500)).unwrap();
        let event = passenger
            .top_up(passenger.passenger_account(), &top_up, Utc::now())
            .unwrap();
        let passenger = passenger.apply(event);

        let fare = Amount::new(dec!(500)).unwrap();
        let event = passenger
            .debit_fare(&fare, Uuid::new_v4(), Utc::now())
            .unwrap();
        let passenger = passenger.apply(event);

        assert_eq!(passenger.balance().value(), dec!(0));
    }

    #[test]
    fn test_debit_fare_insufficient() {
        let passenger = new_passenger();
        let fare = Amount::new(dec!(500)).unwrap();

        let result = passenger.debit_fare(&fare, Uuid::new_v4(), Utc::now());
        assert!(matches!(
            result,
            Err(DomainError::InsufficientFunds { .. })
        ));
    }
}
