//! sandwich-data crate

pub mod blocks;
pub mod decoder;
pub mod export;
pub mod store;
pub mod types;

pub use types::{
    Block, BlockSummary, DecodedLog, FrequentAddresses, GainExtreme, PairRecord, Receipt,
    ReceiptLog, Transaction,
};
