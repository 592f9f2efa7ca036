//! Fatal consistency errors raised by the detection pass.
//!
//! Negative results ("not a pair", "no victim") are ordinary values and never
//! appear here.

use alloy::primitives::B256;
use thiserror::Error;

/// Error that aborts detection for the current block.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DetectError {
    /// An eligible transaction reached gain computation without its swap event.
    #[error("transaction {tx_hash} has no swap event recorded at gain computation")]
    MissingSwapEvent { tx_hash: B256 },

    /// A swap amount does not fit a signed 256-bit value.
    #[error("swap amounts of transaction {tx_hash} exceed the signed 256-bit range")]
    AmountOverflow { tx_hash: B256 },

    /// A pair was assembled from transactions that violate block or index ordering.
    #[error("inconsistent frontrun pair: {reason}")]
    InconsistentPair { reason: String },
}
