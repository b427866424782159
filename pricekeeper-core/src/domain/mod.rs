//! Domain types for the price keeper

pub mod date_key;
pub mod master;
pub mod price_row;

pub use date_key::DateKey;
pub use master::MasterRecord;
pub use price_row::{date_span, PriceRow, PriceSeries};
