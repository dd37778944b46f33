//! Stock-related types for the brokerage engine
//!
//! This module defines the identity of a tradable stock as it appears in a
//! market listings file: a display name, a stable security identifier, and
//! the quote the feed opens at.

use rust_decimal::Decimal;

use crate::types::error::BrokerageError;

/// Security identifier (e.g. "GOOGL")
///
/// The stable key used to match sell orders to holdings entries. Two holdings
/// entries never share a security identifier: the market rejects duplicate
/// listings.
pub type SecurityId = String;

/// A stock as described by a market listings file
///
/// The listing is the immutable identity of a stock; the current quote lives
/// in the [`crate::core::PriceFeed`] opened from it and mutates on every tick.
#[derive(Debug, Clone, PartialEq)]
pub struct StockListing {
    /// Display name (e.g. "Google")
    pub name: String,

    /// Security identifier, unique per market
    pub security: SecurityId,

    /// Initial quote the feed opens at
    ///
    /// Must be strictly positive: quotes stay finite and positive for the
    /// lifetime of a feed.
    pub price: Decimal,
}

impl StockListing {
    /// Create a new listing
    pub fn new(name: impl Into<String>, security: impl Into<SecurityId>, price: Decimal) -> Self {
        StockListing {
            name: name.into(),
            security: security.into(),
            price,
        }
    }

    /// Validate the listing before a feed is opened from it
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The security identifier is empty
    /// - The initial quote is not strictly positive
    pub fn validate(&self) -> Result<(), BrokerageError> {
        if self.security.trim().is_empty() {
            return Err(BrokerageError::ParseError {
                line: None,
                message: "listing has an empty security identifier".to_string(),
            });
        }
        if self.price <= Decimal::ZERO {
            return Err(BrokerageError::invalid_quote(
                self.security.clone(),
                self.price,
            ));
        }
        Ok(())
    }
}
