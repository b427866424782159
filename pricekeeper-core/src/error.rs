//! Errors surfaced by the keeper.
//!
//! A failed spot-check is not an error: it only triggers a resync.

use crate::store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum KeeperError {
    #[error("symbol not found: {symbol}")]
    NotFound { symbol: String },

    #[error("store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),

    #[error("internal invariant violated: {0}")]
    Invariant(String),
}

impl KeeperError {
    pub fn not_found(symbol: &str) -> Self {
        KeeperError::NotFound {
            symbol: symbol.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, KeeperError::NotFound { .. })
    }
}

pub type KeeperResult<T> = Result<T, KeeperError>;
