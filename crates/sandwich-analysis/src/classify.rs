//! Event classification and eligibility filtering.
//!
//! A transaction is eligible for pairing when its decoded logs contain exactly
//! one well-formed Uniswap-V2 style `Swap` and at least one log emitted by the
//! reference asset contract. `Transfer` and `Deposit` logs are kept as token
//! flows so that pairs and victims can be matched on the tokens they touch.

use std::collections::{BTreeMap, BTreeSet};

use alloy::primitives::{Address, B256, U256};
use sandwich_data::types::{Block, DecodedLog, Transaction};

/// Argument names of a standard `Swap` event.
pub const SWAP_ARG_KEYS: [&str; 6] = [
    "sender",
    "to",
    "amount0In",
    "amount1In",
    "amount0Out",
    "amount1Out",
];

/// Arguments of a standard-shaped `Swap` event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SwapArgs {
    /// Pool emitting the event.
    pub pool: Address,
    pub sender: Address,
    pub to: Address,
    pub amount0_in: U256,
    pub amount1_in: U256,
    pub amount0_out: U256,
    pub amount1_out: U256,
}

impl SwapArgs {
    /// Validates the exact six-key shape and parses every value.
    fn from_log(log: &DecodedLog) -> Option<Self> {
        if log.args.len() != SWAP_ARG_KEYS.len()
            || !SWAP_ARG_KEYS.iter().all(|key| log.args.contains_key(*key))
        {
            return None;
        }
        Some(Self {
            pool: log.address,
            sender: parse_address(&log.args["sender"])?,
            to: parse_address(&log.args["to"])?,
            amount0_in: parse_amount(&log.args["amount0In"])?,
            amount1_in: parse_amount(&log.args["amount1In"])?,
            amount0_out: parse_amount(&log.args["amount0Out"])?,
            amount1_out: parse_amount(&log.args["amount1Out"])?,
        })
    }

    /// `(input, output)` read as a buy: `amount1In` spent, `amount0Out` received.
    pub fn buy_amounts(&self) -> (U256, U256) {
        (self.amount1_in, self.amount0_out)
    }

    /// `(input, output)` read as a sell: `amount0In` spent, `amount1Out` received.
    pub fn sell_amounts(&self) -> (U256, U256) {
        (self.amount0_in, self.amount1_out)
    }
}

/// ERC-20 `Transfer` seen in a receipt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransferArgs {
    /// Token contract emitting the event.
    pub token: Address,
    pub from: Option<Address>,
    pub to: Option<Address>,
    pub value: Option<U256>,
}

/// Wrapped-native `Deposit` seen in a receipt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DepositArgs {
    /// Token contract emitting the event.
    pub token: Address,
    pub dst: Option<Address>,
    pub wad: Option<U256>,
}

/// Decoded log validated into a known argument shape.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LogEvent {
    Swap(SwapArgs),
    /// `Swap` with any argument shape other than the standard six keys.
    MalformedSwap,
    Transfer(TransferArgs),
    Deposit(DepositArgs),
    Other,
}

impl LogEvent {
    /// Validates a decoded log by its event name.
    pub fn from_log(log: &DecodedLog) -> Self {
        let arg_address = |key: &str| log.args.get(key).and_then(|v| parse_address(v));
        let arg_amount = |key: &str| log.args.get(key).and_then(|v| parse_amount(v));

        match log.event.as_str() {
            "Swap" => SwapArgs::from_log(log).map_or(Self::MalformedSwap, Self::Swap),
            "Transfer" => Self::Transfer(TransferArgs {
                token: log.address,
                from: arg_address("from"),
                to: arg_address("to"),
                value: arg_amount("value"),
            }),
            "Deposit" => Self::Deposit(DepositArgs {
                token: log.address,
                dst: arg_address("dst"),
                wad: arg_amount("wad"),
            }),
            _ => Self::Other,
        }
    }
}

/// Token movement recorded for token-overlap tests.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TokenFlow {
    Transfer(TransferArgs),
    Deposit(DepositArgs),
}

impl TokenFlow {
    /// Contract that emitted the flow event.
    pub fn token(&self) -> Address {
        match self {
            Self::Transfer(args) => args.token,
            Self::Deposit(args) => args.token,
        }
    }
}

/// A transaction together with the facts classification derived from its logs.
#[derive(Clone, Debug, PartialEq)]
pub struct ClassifiedTx<'a> {
    pub tx: &'a Transaction,
    /// Count of decoded logs per event name.
    pub event_counts: BTreeMap<String, usize>,
    /// Whether any decoded log was emitted by the reference asset contract.
    pub reference_asset_involved: bool,
    /// False as soon as one `Swap` log has a non-standard shape.
    pub swap_format_valid: bool,
    /// The single well-formed swap, when exactly one `Swap` log was seen.
    pub swap: Option<SwapArgs>,
    /// `Transfer` and `Deposit` events in log order.
    pub token_flows: Vec<TokenFlow>,
}

impl<'a> ClassifiedTx<'a> {
    pub fn hash(&self) -> B256 {
        self.tx.hash
    }

    pub fn index(&self) -> u64 {
        self.tx.index
    }

    /// Number of `Swap` logs, well formed or not.
    pub fn swap_count(&self) -> usize {
        self.event_counts.get("Swap").copied().unwrap_or(0)
    }

    /// Eligibility rule for pairing.
    pub fn is_eligible(&self) -> bool {
        self.reference_asset_involved
            && self.swap_count() == 1
            && self.swap_format_valid
            && self.swap.is_some()
    }

    /// Tokens touched by `Transfer`/`Deposit` events, excluding the reference asset.
    pub fn touched_tokens(&self, reference_asset: Address) -> BTreeSet<Address> {
        self.token_flows
            .iter()
            .map(TokenFlow::token)
            .filter(|token| *token != reference_asset)
            .collect()
    }

    fn ineligibility(&self) -> &'static str {
        if !self.reference_asset_involved {
            "reference asset not involved"
        } else if self.swap_count() != 1 {
            "swap count is not one"
        } else {
            "malformed swap event"
        }
    }
}

/// Classifies one transaction from its decoded receipt logs.
///
/// Undecodable logs are skipped.
pub fn classify(tx: &Transaction, reference_asset: Address) -> ClassifiedTx<'_> {
    let mut event_counts = BTreeMap::new();
    let mut reference_asset_involved = false;
    let mut swap_format_valid = true;
    let mut swap = None;
    let mut token_flows = Vec::new();

    for log in tx.receipt.logs.iter().filter_map(|log| log.decoded()) {
        *event_counts.entry(log.event.clone()).or_insert(0) += 1;
        if log.address == reference_asset {
            reference_asset_involved = true;
        }

        match LogEvent::from_log(log) {
            LogEvent::Swap(args) => swap = Some(args),
            LogEvent::MalformedSwap => swap_format_valid = false,
            LogEvent::Transfer(args) => token_flows.push(TokenFlow::Transfer(args)),
            LogEvent::Deposit(args) => token_flows.push(TokenFlow::Deposit(args)),
            LogEvent::Other => {}
        }
    }

    if event_counts.get("Swap") != Some(&1) || !swap_format_valid {
        swap = None;
    }

    ClassifiedTx {
        tx,
        event_counts,
        reference_asset_involved,
        swap_format_valid,
        swap,
        token_flows,
    }
}

/// Classifies every transaction of a block and keeps the eligible ones in
/// block order. The block itself is left untouched.
pub fn eligible_transactions(block: &Block, reference_asset: Address) -> Vec<ClassifiedTx<'_>> {
    block
        .transactions
        .iter()
        .map(|tx| classify(tx, reference_asset))
        .filter(|classified| {
            let eligible = classified.is_eligible();
            if !eligible {
                tracing::trace!(
                    tx_hash = %classified.hash(),
                    reason = classified.ineligibility(),
                    "transaction not eligible"
                );
            }
            eligible
        })
        .collect()
}

fn parse_address(value: &str) -> Option<Address> {
    value.trim().parse().ok()
}

fn parse_amount(value: &str) -> Option<U256> {
    value.trim().parse().ok()
}
