//! Type definitions for decoded block data and detection output records.

use std::collections::BTreeMap;

use alloy::primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};

/// On-chain block with its transactions in inclusion order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Block {
    /// Block number.
    pub number: u64,
    /// Block hash.
    pub hash: B256,
    /// Timestamp in unix seconds.
    pub timestamp: u64,
    /// Transactions ordered by their index within the block.
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// Number of transactions included in the block.
    pub fn transaction_count(&self) -> usize {
        self.transactions.len()
    }
}

/// Transaction included in a block, together with its receipt.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Transaction hash.
    pub hash: B256,
    /// Hash of the containing block.
    pub block_hash: B256,
    /// Number of the containing block.
    pub block_number: u64,
    /// Transaction index in block.
    pub index: u64,
    /// Sender address.
    pub from: Address,
    /// Recipient address (None for contract creation).
    pub to: Option<Address>,
    /// Gas limit.
    pub gas_limit: u64,
    /// Gas price in Wei (max fee for type 2 txs).
    pub gas_price: u128,
    /// Value transferred in Wei.
    pub value: U256,
    /// Execution receipt with decoded logs.
    pub receipt: Receipt,
}

/// Transaction receipt with pre-decoded logs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Receipt {
    /// Effective gas price in Wei.
    pub effective_gas_price: u128,
    /// Gas used.
    pub gas_used: u64,
    /// Execution status (true = success).
    pub status: bool,
    /// Logs in emission order.
    pub logs: Vec<ReceiptLog>,
}

/// A receipt log after ABI decoding was attempted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReceiptLog {
    /// Log matched a known event ABI.
    Decoded(DecodedLog),
    /// No matching ABI entry; excluded from classification.
    Undecodable {
        /// Emitting contract.
        address: Address,
        /// Event signature topic, if any.
        topic0: Option<B256>,
    },
}

impl ReceiptLog {
    /// Returns the decoded log, if decoding succeeded.
    pub fn decoded(&self) -> Option<&DecodedLog> {
        match self {
            Self::Decoded(log) => Some(log),
            Self::Undecodable { .. } => None,
        }
    }
}

/// Event log decoded against an ABI.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DecodedLog {
    /// Log index within the block.
    pub log_index: u64,
    /// Address of the contract that emitted the log.
    pub address: Address,
    /// Event name, e.g. `Swap`.
    pub event: String,
    /// Named arguments. Integers are decimal text, addresses are `0x` hex.
    pub args: BTreeMap<String, String>,
}

/// Per-pair output record.
///
/// Wei amounts are decimal text so signed 256-bit values survive JSON and CSV.
/// Victim fields are empty strings when no victim was identified.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairRecord {
    /// Block number.
    pub block_number: u64,
    /// Frontrun transaction hash.
    pub frontrun_hash: String,
    /// Frontrun sender.
    pub frontrun_from: String,
    /// Frontrun recipient (empty for contract creation).
    pub frontrun_to: String,
    /// Frontrun gas cost in Wei.
    pub frontrun_gas_cost_wei: String,
    /// Backrun transaction hash.
    pub backrun_hash: String,
    /// Backrun sender.
    pub backrun_from: String,
    /// Backrun recipient (empty for contract creation).
    pub backrun_to: String,
    /// Backrun gas cost in Wei.
    pub backrun_gas_cost_wei: String,
    /// Net gain in Wei, may be negative.
    pub net_gain_wei: String,
    /// Victim transaction hash.
    pub victim_hash: String,
    /// Victim input amount in Wei.
    pub victim_input_wei: String,
}

/// Extreme gain together with the 1-based attack number it came from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GainExtreme {
    /// Gain in Wei (decimal text).
    pub gain_wei: String,
    /// 1-based position of the pair within the block's detections.
    pub attack_number: usize,
}

/// Most frequent addresses across the attack legs of a block.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrequentAddresses {
    /// Most frequent frontrun sender.
    pub frontrun_from: String,
    /// Most frequent frontrun recipient.
    pub frontrun_to: String,
    /// Most frequent backrun sender.
    pub backrun_from: String,
    /// Most frequent backrun recipient.
    pub backrun_to: String,
}

/// Block-level detection summary.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BlockSummary {
    /// Block number.
    pub block_number: u64,
    /// Transactions in the block before eligibility filtering.
    pub original_tx_count: usize,
    /// Transactions that survived eligibility filtering.
    pub eligible_tx_count: usize,
    /// Number of detected pairs.
    pub attack_count: usize,
    /// attack_count / original_tx_count × 100.
    pub attack_percentage: f64,
    /// Largest net gain (None when nothing was detected).
    pub max_gain: Option<GainExtreme>,
    /// Smallest net gain (None when nothing was detected).
    pub min_gain: Option<GainExtreme>,
    /// Most frequent leg addresses (None when nothing was detected).
    pub frequent_addresses: Option<FrequentAddresses>,
    /// Pairs with an identified victim.
    pub victim_count: usize,
    /// Largest victim input in Wei (decimal text, "0" when no victim).
    pub max_victim_input_wei: String,
}
