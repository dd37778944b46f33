//! CSV reader for market listings
//!
//! Reads the stock listings a market opens with from a CSV file with a
//! `name,security,price` header. Listings files are small startup
//! configuration, so the whole file is read and validated up front: a market
//! that cannot open all of its feeds should not open any.
//!
//! # Error Handling
//!
//! - Fatal errors (file not found, I/O errors) surface as `IoError`
//! - Malformed rows surface as `ParseError` with the offending line number
//! - Rows that parse but fail validation (non-positive quote, empty
//!   security identifier) surface as their own variants

use std::fs::File;
use std::path::Path;
use std::str::FromStr;

use csv::{ReaderBuilder, Trim};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::types::{BrokerageError, StockListing};

/// Raw CSV row before price parsing
///
/// The price is deserialized as a string and parsed explicitly so a bad
/// value reports the row it came from instead of an opaque serde error.
#[derive(Debug, Deserialize)]
struct ListingRow {
    name: String,
    security: String,
    price: String,
}

/// Convert a raw row into a validated listing
fn convert_row(row: ListingRow, line: u64) -> Result<StockListing, BrokerageError> {
    let price = Decimal::from_str(row.price.trim()).map_err(|e| BrokerageError::ParseError {
        line: Some(line),
        message: format!("invalid price '{}': {}", row.price, e),
    })?;

    let listing = StockListing::new(row.name, row.security, price);
    listing.validate()?;
    Ok(listing)
}

/// Read and validate all stock listings from a CSV file
///
/// # Arguments
///
/// * `path` - Path to the listings CSV file
///
/// # Errors
///
/// Returns an error if the file cannot be opened, any row fails to parse,
/// or any listing fails validation.
///
/// # Examples
///
/// ```no_run
/// use rust_brokerage_engine::io::read_listings;
/// use std::path::Path;
///
/// let listings = read_listings(Path::new("listings.csv")).unwrap();
/// println!("{} stocks listed", listings.len());
/// ```
pub fn read_listings(path: &Path) -> Result<Vec<StockListing>, BrokerageError> {
    let file = File::open(path).map_err(|e| BrokerageError::IoError {
        message: format!("failed to open '{}': {}", path.display(), e),
    })?;

    let mut reader = ReaderBuilder::new().trim(Trim::All).from_reader(file);

    let mut listings = Vec::new();
    for (index, record) in reader.deserialize::<ListingRow>().enumerate() {
        // +2: rows are 0-indexed and the header occupies line 1.
        let line = index as u64 + 2;
        let row = record.map_err(|e| match BrokerageError::from(e) {
            BrokerageError::ParseError { line: None, message } => BrokerageError::ParseError {
                line: Some(line),
                message,
            },
            other => other,
        })?;
        listings.push(convert_row(row, line)?);
    }
    Ok(listings)
}
