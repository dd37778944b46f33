//! Account ledger: balance and holdings under one exclusive lock
//!
//! This module provides the `Ledger` struct (balance plus the holdings map)
//! and the `Account` that wraps it in a single `tokio::sync::Mutex`. The
//! ledger is the unit of atomicity for order settlement: balance and holdings
//! are only ever mutated together under the one lock, so no reader can
//! observe a settlement half-applied.
//!
//! # Serialization
//!
//! The ledger lock is deliberately held by a settling order for the entire
//! settlement, including across every price-wait suspension. While an order
//! on an account is parked waiting for its price condition, every other
//! operation on that account (deposit, withdrawal, another order) queues
//! behind the lock. Settlement atomicity is bought at the price of full
//! serialization of all financial activity on the account.
//!
//! # Lock ordering
//!
//! The ledger lock is always the outer lock; a feed's internals are only ever
//! touched while it is held, never the reverse. The feed has no way to reach
//! back into a ledger, so the ordering holds by construction.

use std::collections::HashMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use tokio::sync::{Mutex, MutexGuard};
use tracing::debug;

use crate::core::feed::PriceFeed;
use crate::types::{AccountId, BrokerageError, SecurityId, ShareCount};

/// One holdings entry: a share quantity and the feed it trades on
///
/// The feed handle is carried so that sell settlement can park on the right
/// stock's feed without any registry lookup. Quantity is always > 0; an entry
/// that would reach 0 is removed instead.
#[derive(Debug, Clone)]
pub struct Position {
    /// The stock's shared price feed
    pub feed: Arc<PriceFeed>,

    /// Number of shares held
    pub quantity: ShareCount,
}

/// Balance and holdings of one account, mutated only under the account lock
#[derive(Debug)]
pub struct Ledger {
    /// Account this ledger belongs to, for error context
    account: AccountId,

    /// Current balance
    balance: Decimal,

    /// Holdings, keyed by security identifier
    holdings: HashMap<SecurityId, Position>,
}

impl Ledger {
    fn new(account: AccountId, balance: Decimal) -> Self {
        Ledger {
            account,
            balance,
            holdings: HashMap::new(),
        }
    }

    /// Current balance
    pub fn balance(&self) -> Decimal {
        self.balance
    }

    /// Credit the balance
    ///
    /// # Errors
    ///
    /// Returns an error if the credit would overflow.
    pub(crate) fn credit(
        &mut self,
        operation: &'static str,
        amount: Decimal,
    ) -> Result<(), BrokerageError> {
        self.balance = self
            .balance
            .checked_add(amount)
            .ok_or_else(|| BrokerageError::arithmetic_overflow(operation, self.account))?;
        Ok(())
    }

    /// Debit the balance
    ///
    /// # Errors
    ///
    /// Returns an error if the balance is insufficient or the debit would
    /// underflow.
    pub(crate) fn debit(
        &mut self,
        operation: &'static str,
        amount: Decimal,
    ) -> Result<(), BrokerageError> {
        if self.balance < amount {
            return Err(BrokerageError::insufficient_funds(
                self.account,
                self.balance,
                amount,
            ));
        }
        self.balance = self
            .balance
            .checked_sub(amount)
            .ok_or_else(|| BrokerageError::arithmetic_underflow(operation, self.account))?;
        Ok(())
    }

    /// Add shares to the holding for a stock, creating the entry on first buy
    ///
    /// # Errors
    ///
    /// Returns an error if the resulting quantity would overflow.
    pub(crate) fn add_shares(
        &mut self,
        feed: &Arc<PriceFeed>,
        quantity: ShareCount,
    ) -> Result<(), BrokerageError> {
        let account = self.account;
        let position = self
            .holdings
            .entry(feed.security().clone())
            .or_insert_with(|| Position {
                feed: Arc::clone(feed),
                quantity: 0,
            });
        position.quantity = position
            .quantity
            .checked_add(quantity)
            .ok_or_else(|| BrokerageError::arithmetic_overflow("buy settlement", account))?;
        Ok(())
    }

    /// Number of shares held under a security identifier (0 when absent)
    pub fn shares_held(&self, security: &str) -> ShareCount {
        self.holdings
            .get(security)
            .map(|position| position.quantity)
            .unwrap_or(0)
    }

    /// All holdings entries matching a security identifier with quantity > 0
    ///
    /// Sell settlement iterates these; holdings are keyed by security
    /// identifier so at most one entry matches, but the contract is
    /// "every matching entry".
    pub(crate) fn matching_positions(&self, security: &str) -> Vec<Position> {
        self.holdings
            .iter()
            .filter(|(id, position)| id.as_str() == security && position.quantity > 0)
            .map(|(_, position)| position.clone())
            .collect()
    }

    /// Remove a holdings entry entirely
    pub(crate) fn remove_position(&mut self, security: &str) -> Option<Position> {
        self.holdings.remove(security)
    }

    /// All holdings as (security, quantity) pairs
    pub fn holdings(&self) -> Vec<(SecurityId, ShareCount)> {
        self.holdings
            .iter()
            .map(|(id, position)| (id.clone(), position.quantity))
            .collect()
    }
}

/// Consistent point-in-time view of an account
///
/// Balance and holdings are read under a single lock acquisition, so a
/// snapshot can never show a settlement half-applied.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountSnapshot {
    /// Account identifier
    pub account: AccountId,

    /// Balance at snapshot time
    pub balance: Decimal,

    /// Holdings at snapshot time, as (security, quantity) pairs
    pub holdings: Vec<(SecurityId, ShareCount)>,
}

/// An account: an identifier plus its lock-guarded ledger
///
/// All public operations acquire the ledger lock and therefore queue behind
/// any order currently settling on this account.
#[derive(Debug)]
pub struct Account {
    /// Account identifier
    id: AccountId,

    /// The single exclusive lock guarding balance and holdings together
    ledger: Mutex<Ledger>,
}

impl Account {
    /// Open an account with a zero balance
    pub fn open(id: AccountId) -> Arc<Self> {
        Self::open_with_balance(id, Decimal::ZERO)
    }

    /// Open an account with an initial balance
    pub fn open_with_balance(id: AccountId, balance: Decimal) -> Arc<Self> {
        Arc::new(Account {
            id,
            ledger: Mutex::new(Ledger::new(id, balance)),
        })
    }

    /// Account identifier
    pub fn id(&self) -> AccountId {
        self.id
    }

    /// Acquire the ledger lock
    ///
    /// Settlement holds this guard across its price waits; everything else
    /// holds it only briefly.
    pub(crate) async fn ledger(&self) -> MutexGuard<'_, Ledger> {
        self.ledger.lock().await
    }

    /// Deposit funds
    ///
    /// Queues behind any settling order on this account.
    ///
    /// # Errors
    ///
    /// Returns an error if the amount is not strictly positive or the credit
    /// would overflow.
    pub async fn deposit(&self, amount: Decimal) -> Result<(), BrokerageError> {
        if amount <= Decimal::ZERO {
            return Err(BrokerageError::invalid_amount("deposit", amount));
        }
        let mut ledger = self.ledger.lock().await;
        ledger.credit("deposit", amount)?;
        debug!(account = self.id, %amount, balance = %ledger.balance(), "deposit");
        Ok(())
    }

    /// Withdraw funds
    ///
    /// Queues behind any settling order on this account.
    ///
    /// # Errors
    ///
    /// Returns an error if the amount is not strictly positive or the
    /// available balance is insufficient.
    pub async fn withdraw(&self, amount: Decimal) -> Result<(), BrokerageError> {
        if amount <= Decimal::ZERO {
            return Err(BrokerageError::invalid_amount("withdrawal", amount));
        }
        let mut ledger = self.ledger.lock().await;
        ledger.debit("withdrawal", amount)?;
        debug!(account = self.id, %amount, balance = %ledger.balance(), "withdrawal");
        Ok(())
    }

    /// Current balance
    pub async fn balance(&self) -> Decimal {
        self.ledger.lock().await.balance()
    }

    /// Shares held under a security identifier (0 when absent)
    pub async fn shares_held(&self, security: &str) -> ShareCount {
        self.ledger.lock().await.shares_held(security)
    }

    /// Consistent snapshot of balance and holdings
    pub async fn snapshot(&self) -> AccountSnapshot {
        let ledger = self.ledger.lock().await;
        AccountSnapshot {
            account: self.id,
            balance: ledger.balance(),
            holdings: ledger.holdings(),
        }
    }
}
