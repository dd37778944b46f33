//! Error types for the brokerage engine
//!
//! This module defines all error types that can occur while running feeds,
//! settling orders, and mutating account ledgers.
//!
//! # Error Categories
//!
//! - **Submission Errors**: invalid quantities, limits, or amounts, rejected
//!   synchronously, never scheduled
//! - **Ledger Errors**: insufficient funds, arithmetic overflow/underflow
//! - **Lifecycle Errors**: feed shut down under a parked waiter, order
//!   cancelled, executor pool closed
//! - **Listing Errors**: I/O and CSV parsing failures for market definitions

use crate::types::order::AccountId;
use crate::types::stock::SecurityId;
use rust_decimal::Decimal;
use thiserror::Error;

/// Main error type for the brokerage engine
///
/// Every failure inside a settlement task surfaces through the order's handle
/// as one of these variants; nothing here is fatal at the process level.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BrokerageError {
    /// Order submitted with a zero share quantity
    ///
    /// Rejected at submission time, before the order is scheduled.
    #[error("Invalid order quantity: {quantity}")]
    InvalidQuantity {
        /// The rejected quantity
        quantity: u64,
    },

    /// Order submitted with a negative limit price
    ///
    /// Rejected at submission time, before the order is scheduled.
    #[error("Invalid limit price {limit} for {side} order")]
    InvalidLimit {
        /// "buy" or "sell"
        side: &'static str,
        /// The rejected limit price
        limit: Decimal,
    },

    /// Deposit or withdrawal with a non-positive amount
    #[error("Invalid amount {amount} for {operation}")]
    InvalidAmount {
        /// Operation that rejected the amount
        operation: &'static str,
        /// The rejected amount
        amount: Decimal,
    },

    /// Stock listed with a non-positive initial quote
    ///
    /// Quotes must stay positive for the lifetime of a feed, so a listing
    /// that starts at or below zero is rejected before the feed opens.
    #[error("Invalid initial quote {quote} for security {security}")]
    InvalidQuote {
        /// Security identifier of the rejected listing
        security: SecurityId,
        /// The rejected quote
        quote: Decimal,
    },

    /// Insufficient funds for a withdrawal
    ///
    /// The withdrawal is rejected and the ledger remains unchanged. Note that
    /// an underfunded buy order does NOT produce this error: it settles with
    /// the zero-result sentinel instead.
    #[error(
        "Insufficient funds for account {account}: available {available}, requested {requested}"
    )]
    InsufficientFunds {
        /// Account identifier
        account: AccountId,
        /// Available balance
        available: Decimal,
        /// Requested amount
        requested: Decimal,
    },

    /// Arithmetic overflow would occur
    ///
    /// The mutation is rejected to keep the ledger consistent.
    #[error("Arithmetic overflow in {operation} for account {account}")]
    ArithmeticOverflow {
        /// Operation that would overflow
        operation: &'static str,
        /// Account identifier
        account: AccountId,
    },

    /// Arithmetic underflow would occur
    #[error("Arithmetic underflow in {operation} for account {account}")]
    ArithmeticUnderflow {
        /// Operation that would underflow
        operation: &'static str,
        /// Account identifier
        account: AccountId,
    },

    /// The feed was shut down while (or before) a waiter was parked on it
    ///
    /// Parked waiters are released with this error rather than left hanging;
    /// a pending order propagates it through its handle.
    #[error("Price feed for security {security} has been shut down")]
    FeedShutdown {
        /// Security identifier of the dead feed
        security: SecurityId,
    },

    /// The order was cancelled through its handle before it settled
    ///
    /// The ledger lock is released at the point of cancellation; no partial
    /// settlement is ever visible.
    #[error("Order was cancelled before settlement")]
    OrderCancelled,

    /// The settlement worker stopped unexpectedly
    #[error("Order interrupted: {reason}")]
    OrderInterrupted {
        /// Description of the interruption
        reason: String,
    },

    /// The executor's worker pool was shut down before the order ran
    #[error("Order executor has been shut down")]
    ExecutorShutdown,

    /// A listing used a security identifier that is already on the market
    #[error("Security {security} is already listed")]
    DuplicateListing {
        /// The duplicated security identifier
        security: SecurityId,
    },

    /// No feed exists for the requested security identifier
    #[error("Security {security} is not listed")]
    UnknownSecurity {
        /// The unknown security identifier
        security: SecurityId,
    },

    /// I/O error while reading a listings file
    #[error("I/O error: {message}")]
    IoError {
        /// Description of the I/O error
        message: String,
    },

    /// CSV parsing error in a listings file
    #[error("CSV parse error{}: {message}", line.map(|l| format!(" at line {}", l)).unwrap_or_default())]
    ParseError {
        /// Line number where the error occurred (if available)
        line: Option<u64>,
        /// Description of the parsing error
        message: String,
    },
}

// Conversion from io::Error to BrokerageError
impl From<std::io::Error> for BrokerageError {
    fn from(error: std::io::Error) -> Self {
        BrokerageError::IoError {
            message: error.to_string(),
        }
    }
}

// Conversion from csv::Error to BrokerageError
impl From<csv::Error> for BrokerageError {
    fn from(error: csv::Error) -> Self {
        let line = error.position().map(|pos| pos.line());

        BrokerageError::ParseError {
            line,
            message: error.to_string(),
        }
    }
}

// Helper functions for creating common errors

impl BrokerageError {
    /// Create an InvalidQuantity error
    pub fn invalid_quantity(quantity: u64) -> Self {
        BrokerageError::InvalidQuantity { quantity }
    }

    /// Create an InvalidLimit error
    pub fn invalid_limit(side: &'static str, limit: Decimal) -> Self {
        BrokerageError::InvalidLimit { side, limit }
    }

    /// Create an InvalidAmount error
    pub fn invalid_amount(operation: &'static str, amount: Decimal) -> Self {
        BrokerageError::InvalidAmount { operation, amount }
    }

    /// Create an InvalidQuote error
    pub fn invalid_quote(security: impl Into<SecurityId>, quote: Decimal) -> Self {
        BrokerageError::InvalidQuote {
            security: security.into(),
            quote,
        }
    }

    /// Create an InsufficientFunds error
    pub fn insufficient_funds(account: AccountId, available: Decimal, requested: Decimal) -> Self {
        BrokerageError::InsufficientFunds {
            account,
            available,
            requested,
        }
    }

    /// Create an ArithmeticOverflow error
    pub fn arithmetic_overflow(operation: &'static str, account: AccountId) -> Self {
        BrokerageError::ArithmeticOverflow { operation, account }
    }

    /// Create an ArithmeticUnderflow error
    pub fn arithmetic_underflow(operation: &'static str, account: AccountId) -> Self {
        BrokerageError::ArithmeticUnderflow { operation, account }
    }

    /// Create a FeedShutdown error
    pub fn feed_shutdown(security: impl Into<SecurityId>) -> Self {
        BrokerageError::FeedShutdown {
            security: security.into(),
        }
    }

    /// Create an OrderInterrupted error
    pub fn order_interrupted(reason: impl Into<String>) -> Self {
        BrokerageError::OrderInterrupted {
            reason: reason.into(),
        }
    }

    /// Create a DuplicateListing error
    pub fn duplicate_listing(security: impl Into<SecurityId>) -> Self {
        BrokerageError::DuplicateListing {
            security: security.into(),
        }
    }

    /// Create an UnknownSecurity error
    pub fn unknown_security(security: impl Into<SecurityId>) -> Self {
        BrokerageError::UnknownSecurity {
            security: security.into(),
        }
    }
}
