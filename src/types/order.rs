//! Order-related types for the brokerage engine
//!
//! Orders are transient values: they are validated at submission time,
//! scheduled onto a worker, and never persisted. Once submitted, an order is
//! only reachable through its [`crate::core::OrderHandle`].

use rust_decimal::Decimal;

use crate::types::error::BrokerageError;
use crate::types::stock::SecurityId;

/// Account identifier
pub type AccountId = u32;

/// Number of shares in a holding or an order
///
/// Quantities are always >= 0; a holdings entry at 0 is removed entirely.
pub type ShareCount = u64;

/// A buy or sell order as submitted to the executor
///
/// A buy names the stock and the share quantity and caps the acceptable
/// quote; a sell names a security identifier and floors the acceptable quote,
/// applying to whatever quantity is currently held under that identifier.
#[derive(Debug, Clone, PartialEq)]
pub enum Order {
    /// Buy `quantity` shares once the quote is at or below `limit`
    Buy {
        /// Security identifier of the stock to buy
        security: SecurityId,
        /// Number of shares to buy
        quantity: ShareCount,
        /// Maximum acceptable quote per share
        limit: Decimal,
    },

    /// Sell the full position held under `security` once the quote is at or
    /// above `limit`
    Sell {
        /// Security identifier to liquidate
        security: SecurityId,
        /// Minimum acceptable quote per share
        limit: Decimal,
    },
}

impl Order {
    /// The side of the order, for error context and logging
    pub fn side(&self) -> &'static str {
        match self {
            Order::Buy { .. } => "buy",
            Order::Sell { .. } => "sell",
        }
    }

    /// The security identifier the order targets
    pub fn security(&self) -> &SecurityId {
        match self {
            Order::Buy { security, .. } => security,
            Order::Sell { security, .. } => security,
        }
    }

    /// The limit price of the order
    pub fn limit(&self) -> Decimal {
        match self {
            Order::Buy { limit, .. } => *limit,
            Order::Sell { limit, .. } => *limit,
        }
    }

    /// Validate the order at submission time
    ///
    /// Invalid orders are rejected synchronously and never scheduled.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - A buy order has a zero share quantity
    /// - Either side has a negative limit price
    pub fn validate(&self) -> Result<(), BrokerageError> {
        if let Order::Buy { quantity, .. } = self {
            if *quantity == 0 {
                return Err(BrokerageError::invalid_quantity(*quantity));
            }
        }
        if self.limit().is_sign_negative() {
            return Err(BrokerageError::invalid_limit(self.side(), self.limit()));
        }
        Ok(())
    }
}
