//! Per-pair records and block summaries derived from a detection.
//!
//! Pure functions: nothing here prints or writes files.

use std::collections::HashMap;

use alloy::primitives::{Address, I256, U256};
use sandwich_data::types::{BlockSummary, FrequentAddresses, GainExtreme, PairRecord};

use crate::matcher::BlockDetection;

/// Totals over a run of analyzed blocks.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RangeTotals {
    pub blocks_analyzed: usize,
    /// Transactions scanned before filtering.
    pub transactions_scanned: usize,
    pub eligible_transactions: usize,
    pub attacks: usize,
    pub victims: usize,
}

fn address_text(address: Option<Address>) -> String {
    address.map(|a| a.to_string()).unwrap_or_default()
}

/// One record per detected pair, in discovery order.
pub fn pair_records(detection: &BlockDetection<'_>) -> Vec<PairRecord> {
    detection
        .pairs
        .iter()
        .map(|pair| {
            let (frontrun, backrun) = (pair.frontrun(), pair.backrun());
            let gain = pair.gain();
            let victim = pair.victim();
            PairRecord {
                block_number: detection.block_number,
                frontrun_hash: frontrun.hash.to_string(),
                frontrun_from: frontrun.from.to_string(),
                frontrun_to: address_text(frontrun.to),
                frontrun_gas_cost_wei: gain.frontrun_gas_cost.to_string(),
                backrun_hash: backrun.hash.to_string(),
                backrun_from: backrun.from.to_string(),
                backrun_to: address_text(backrun.to),
                backrun_gas_cost_wei: gain.backrun_gas_cost.to_string(),
                net_gain_wei: gain.net_gain.to_string(),
                victim_hash: victim.map(|v| v.tx.hash.to_string()).unwrap_or_default(),
                victim_input_wei: victim
                    .map(|v| v.input_amount.to_string())
                    .unwrap_or_default(),
            }
        })
        .collect()
}

/// Most common value; ties go to the value seen first.
fn most_frequent(values: &[&str]) -> Option<String> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for &value in values {
        *counts.entry(value).or_insert(0) += 1;
    }

    let mut best: Option<(&str, usize)> = None;
    for &value in values {
        let count = counts[value];
        if best.map_or(true, |(_, best_count)| count > best_count) {
            best = Some((value, count));
        }
    }
    best.map(|(value, _)| value.to_string())
}

/// First occurrence of the extreme gain under `better`, with its 1-based attack number.
fn gain_extreme(gains: &[I256], better: impl Fn(I256, I256) -> bool) -> Option<GainExtreme> {
    let mut best: Option<(usize, I256)> = None;
    for (idx, gain) in gains.iter().copied().enumerate() {
        if best.map_or(true, |(_, current)| better(gain, current)) {
            best = Some((idx, gain));
        }
    }
    best.map(|(idx, gain)| GainExtreme {
        gain_wei: gain.to_string(),
        attack_number: idx + 1,
    })
}

/// Block-level summary of a detection.
///
/// A block without pairs yields zero counts and no extremes.
pub fn summarize(detection: &BlockDetection<'_>) -> BlockSummary {
    let attack_count = detection.pairs.len();
    let attack_percentage = if detection.original_tx_count == 0 {
        0.0
    } else {
        attack_count as f64 / detection.original_tx_count as f64 * 100.0
    };

    let gains: Vec<I256> = detection.pairs.iter().map(|pair| pair.net_gain()).collect();
    let victim_inputs: Vec<U256> = detection
        .pairs
        .iter()
        .filter_map(|pair| pair.victim().map(|v| v.input_amount))
        .collect();

    let frequent_addresses = if detection.pairs.is_empty() {
        None
    } else {
        let records = pair_records(detection);
        let column = |values: Vec<&str>| most_frequent(&values).unwrap_or_default();
        Some(FrequentAddresses {
            frontrun_from: column(records.iter().map(|r| r.frontrun_from.as_str()).collect()),
            frontrun_to: column(records.iter().map(|r| r.frontrun_to.as_str()).collect()),
            backrun_from: column(records.iter().map(|r| r.backrun_from.as_str()).collect()),
            backrun_to: column(records.iter().map(|r| r.backrun_to.as_str()).collect()),
        })
    };

    BlockSummary {
        block_number: detection.block_number,
        original_tx_count: detection.original_tx_count,
        eligible_tx_count: detection.eligible_tx_count,
        attack_count,
        attack_percentage,
        max_gain: gain_extreme(&gains, |candidate, current| candidate > current),
        min_gain: gain_extreme(&gains, |candidate, current| candidate < current),
        frequent_addresses,
        victim_count: victim_inputs.len(),
        max_victim_input_wei: victim_inputs
            .iter()
            .max()
            .copied()
            .unwrap_or(U256::ZERO)
            .to_string(),
    }
}

/// Aggregates block summaries of a run.
pub fn range_totals(summaries: &[BlockSummary]) -> RangeTotals {
    RangeTotals {
        blocks_analyzed: summaries.len(),
        transactions_scanned: summaries.iter().map(|s| s.original_tx_count).sum(),
        eligible_transactions: summaries.iter().map(|s| s.eligible_tx_count).sum(),
        attacks: summaries.iter().map(|s| s.attack_count).sum(),
        victims: summaries.iter().map(|s| s.victim_count).sum(),
    }
}

/// Formats signed Wei as ETH with exactly 6 decimal places.
///
/// Examples:
/// - `1_000_000_000_000_000_000` -> `"1.000000 ETH"`
/// - `-123_000_000_000_000` -> `"-0.000123 ETH"`
pub fn format_eth(wei: I256) -> String {
    let wei_per_eth = U256::from(1_000_000_000_000_000_000_u128);
    let scale = U256::from(1_000_000_u64);

    let magnitude = wei.unsigned_abs();
    let whole = magnitude / wei_per_eth;
    let fractional = (magnitude % wei_per_eth) * scale / wei_per_eth;
    let sign = if wei.is_negative() { "-" } else { "" };

    format!("{sign}{whole}.{:06} ETH", fractional.to::<u64>())
}
