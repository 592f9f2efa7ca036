//! Shared test helpers and utilities.
//!
//! Provides factory functions for blocks and swap transactions whose receipts
//! carry the decoded logs the detector expects.

#![allow(dead_code)]

use std::collections::BTreeMap;

use alloy::primitives::{address, Address, B256, U256};
use sandwich_data::decoder::addresses::WETH;
use sandwich_data::store::Store;
use sandwich_data::types::{Block, DecodedLog, Receipt, ReceiptLog, Transaction};

/// Block hash shared by every factory transaction.
pub const BLOCK_HASH: B256 = B256::repeat_byte(0x42);

/// Block number shared by every factory transaction.
pub const BLOCK_NUMBER: u64 = 14_680_000;

/// Non-reference token traded by the sample pairs (DAI).
pub const TOKEN: Address = address!("6B175474E89094C44Da98b954EedeAC495271d0F");

/// Second non-reference token (USDC).
pub const OTHER_TOKEN: Address = address!("A0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48");

/// Uniswap V2 WETH/DAI pair.
pub const POOL: Address = address!("A478c2975Ab1Ea89e8196811F51A7B7Ade33eB11");

/// Creates an in-memory SQLite Store.
///
/// # Panics
/// Panics if the in-memory database cannot be created (should never happen).
pub fn test_store() -> Store {
    Store::new(":memory:").expect("in-memory store should always open")
}

/// Address built from one repeated byte, e.g. `actor(0xa1)`.
pub fn actor(byte: u8) -> Address {
    Address::repeat_byte(byte)
}

/// Deterministic transaction hash for a block index.
pub fn tx_hash(index: u64) -> B256 {
    B256::left_padding_from(&(index + 1).to_be_bytes())
}

/// Decoded log with string arguments.
pub fn decoded_log(address: Address, event: &str, args: &[(&str, String)]) -> ReceiptLog {
    ReceiptLog::Decoded(DecodedLog {
        log_index: 0,
        address,
        event: event.to_string(),
        args: args
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect::<BTreeMap<_, _>>(),
    })
}

/// Standard six-argument V2 `Swap` log.
pub fn swap_log(amounts: [u64; 4]) -> ReceiptLog {
    decoded_log(
        POOL,
        "Swap",
        &[
            ("sender", format!("{:#x}", actor(0x7a))),
            ("to", format!("{:#x}", actor(0x7b))),
            ("amount0In", amounts[0].to_string()),
            ("amount1In", amounts[1].to_string()),
            ("amount0Out", amounts[2].to_string()),
            ("amount1Out", amounts[3].to_string()),
        ],
    )
}

/// Transaction without logs, never eligible.
pub fn plain_tx(index: u64) -> Transaction {
    Transaction {
        hash: tx_hash(index),
        block_hash: BLOCK_HASH,
        block_number: BLOCK_NUMBER,
        index,
        from: actor(0x01),
        to: Some(actor(0x02)),
        gas_limit: 21_000,
        gas_price: 1,
        value: U256::from(1_000u64),
        receipt: Receipt {
            effective_gas_price: 1,
            gas_used: 21_000,
            status: true,
            logs: Vec::new(),
        },
    }
}

/// Eligible swap transaction: WETH deposit, `token` transfer and one swap.
///
/// `amounts` is `[amount0In, amount1In, amount0Out, amount1Out]`. Gas cost is
/// `gas_price * gas_used` with the given values.
pub fn swap_tx(
    index: u64,
    from: Address,
    to: Address,
    amounts: [u64; 4],
    token: Address,
    gas: (u128, u64),
) -> Transaction {
    let logs = vec![
        decoded_log(
            WETH,
            "Deposit",
            &[("dst", format!("{POOL:#x}")), ("wad", amounts[1].to_string())],
        ),
        decoded_log(
            token,
            "Transfer",
            &[
                ("from", format!("{POOL:#x}")),
                ("to", format!("{to:#x}")),
                ("value", amounts[2].to_string()),
            ],
        ),
        swap_log(amounts),
    ];

    Transaction {
        hash: tx_hash(index),
        block_hash: BLOCK_HASH,
        block_number: BLOCK_NUMBER,
        index,
        from,
        to: Some(to),
        gas_limit: 300_000,
        gas_price: gas.0,
        value: U256::ZERO,
        receipt: Receipt {
            effective_gas_price: gas.0,
            gas_used: gas.1,
            status: true,
            logs,
        },
    }
}

/// Buy leg spending `amount_in` of the reference asset for `amount_out` tokens.
pub fn buy_tx(index: u64, from: Address, to: Address, amount_in: u64, amount_out: u64) -> Transaction {
    swap_tx(index, from, to, [0, amount_in, amount_out, 0], TOKEN, (1, 1))
}

/// Sell leg spending `amount_in` tokens for `amount_out` of the reference asset.
pub fn sell_tx(index: u64, from: Address, to: Address, amount_in: u64, amount_out: u64) -> Transaction {
    swap_tx(index, from, to, [amount_in, 0, 0, amount_out], TOKEN, (1, 1))
}

/// Sets the receipt gas values so the gas cost is `gas_price * gas_used`.
pub fn with_gas(mut tx: Transaction, gas_price: u128, gas_used: u64) -> Transaction {
    tx.gas_price = gas_price;
    tx.receipt.effective_gas_price = gas_price;
    tx.receipt.gas_used = gas_used;
    tx
}

/// Block holding `transactions`, sorted by index.
pub fn sample_block(mut transactions: Vec<Transaction>) -> Block {
    transactions.sort_by_key(|tx| tx.index);
    Block {
        number: BLOCK_NUMBER,
        hash: BLOCK_HASH,
        timestamp: 1_651_190_400,
        transactions,
    }
}

/// Scenario A legs: buy 100 -> 50 at index 5 (gas cost 2), sell 50 -> 120 at
/// index 9 (gas cost 3), both sent by the attacker.
pub fn scenario_a_legs() -> (Transaction, Transaction) {
    let t1 = with_gas(buy_tx(5, actor(0xa1), actor(0xb1), 100, 50), 2, 1);
    let t2 = with_gas(sell_tx(9, actor(0xa1), actor(0xb1), 50, 120), 1, 3);
    (t1, t2)
}

/// Minimal linear congruential generator for reproducible synthetic blocks.
pub struct Lcg(u64);

impl Lcg {
    pub fn new(seed: u64) -> Self {
        Self(seed)
    }

    pub fn next_u64(&mut self) -> u64 {
        self.0 = self
            .0
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        self.0 >> 33
    }

    pub fn below(&mut self, bound: u64) -> u64 {
        self.next_u64() % bound
    }
}

/// Synthetic block with `len` transactions mixing plain transfers, buys and
/// sells over two tokens. Amounts come from a small set so that many
/// candidate pairs match and compete for the same transactions.
pub fn synthetic_block(seed: u64, len: u64) -> Block {
    let mut rng = Lcg::new(seed);
    let transactions = (0..len)
        .map(|index| {
            let from = actor(0x10 + rng.below(6) as u8);
            let to = actor(0x20 + rng.below(6) as u8);
            let token = if rng.below(3) == 0 { OTHER_TOKEN } else { TOKEN };
            let quantity = 10 * (1 + rng.below(3));
            let gas = (1 + rng.below(5) as u128, 1 + rng.below(50));
            match rng.below(5) {
                0 => plain_tx(index),
                1 | 2 => swap_tx(
                    index,
                    from,
                    to,
                    [0, 50 + rng.below(100), quantity, 0],
                    token,
                    gas,
                ),
                _ => swap_tx(
                    index,
                    from,
                    to,
                    [quantity, 0, 0, 50 + rng.below(100)],
                    token,
                    gas,
                ),
            }
        })
        .collect();
    sample_block(transactions)
}
