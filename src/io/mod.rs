//! I/O module
//!
//! CSV input for market listings:
//! - `listings` - Read and validate the stocks a market opens with

pub mod listings;

pub use listings::read_listings;
