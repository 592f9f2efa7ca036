//! Invariant checks over hand-built and generated blocks.
//!
//! Generated blocks come from a fixed-seed generator so failures reproduce.

mod common;

use std::collections::{BTreeSet, HashSet};

use alloy::primitives::{Address, B256, I256, U256};
use common::*;
use sandwich_analysis::classify::classify;
use sandwich_analysis::matcher::BlockDetection;
use sandwich_analysis::report::{pair_records, summarize};
use sandwich_analysis::SandwichDetector;
use sandwich_data::decoder::addresses::WETH;
use sandwich_data::types::{Block, Transaction};

const SEEDS: [u64; 8] = [1, 7, 42, 99, 1_234, 8_191, 65_537, 4_000_037];

fn generated_blocks() -> Vec<Block> {
    SEEDS
        .iter()
        .map(|&seed| synthetic_block(seed, 60))
        .collect()
}

fn detect(block: &Block) -> BlockDetection<'_> {
    SandwichDetector::default()
        .detect_pairs(block)
        .expect("generated blocks are consistent")
}

fn signed(value: U256) -> I256 {
    I256::try_from(value).expect("test amounts fit")
}

fn tokens(tx: &Transaction) -> BTreeSet<Address> {
    classify(tx, WETH).touched_tokens(WETH)
}

#[test]
fn generated_blocks_produce_pairs() {
    let total: usize = generated_blocks().iter().map(|b| detect(b).pairs.len()).sum();
    assert!(total > 0, "generator should yield at least one pair");
}

#[test]
fn no_transaction_holds_two_roles() {
    for block in generated_blocks() {
        let detection = detect(&block);
        let mut seen: HashSet<B256> = HashSet::new();
        for pair in &detection.pairs {
            for hash in pair.hashes() {
                assert!(seen.insert(hash), "{hash} used twice in block seed set");
            }
        }
    }
}

#[test]
fn legs_and_victims_are_ordered() {
    for block in generated_blocks() {
        for pair in &detect(&block).pairs {
            let (front, back) = (pair.frontrun().index, pair.backrun().index);
            assert!(front < back);
            if let Some(victim) = pair.victim() {
                assert!(front < victim.tx.index && victim.tx.index < back);
            }
        }
    }
}

#[test]
fn net_gain_matches_swap_amounts_and_gas() {
    for block in generated_blocks() {
        for pair in &detect(&block).pairs {
            let t1 = classify(pair.frontrun(), WETH).swap.expect("frontrun swap");
            let t2 = classify(pair.backrun(), WETH).swap.expect("backrun swap");
            let gas = |tx: &Transaction| {
                U256::from(tx.receipt.effective_gas_price) * U256::from(tx.receipt.gas_used)
            };

            let expected = signed(t2.amount1_out)
                - signed(t1.amount1_in)
                - signed(gas(pair.frontrun()))
                - signed(gas(pair.backrun()));
            assert_eq!(pair.net_gain(), expected);
        }
    }
}

#[test]
fn frontrun_output_feeds_backrun_input() {
    for block in generated_blocks() {
        for pair in &detect(&block).pairs {
            let t1 = classify(pair.frontrun(), WETH).swap.expect("frontrun swap");
            let t2 = classify(pair.backrun(), WETH).swap.expect("backrun swap");
            assert_eq!(t1.amount0_out, t2.amount0_in);
        }
    }
}

#[test]
fn victims_share_a_pair_token() {
    for block in generated_blocks() {
        for pair in &detect(&block).pairs {
            let Some(victim) = pair.victim() else { continue };
            let shared: BTreeSet<Address> = tokens(pair.frontrun())
                .intersection(&tokens(pair.backrun()))
                .copied()
                .collect();
            assert!(!tokens(victim.tx).is_disjoint(&shared));
        }
    }
}

#[test]
fn block_without_eligible_transactions_summarizes_to_zero() {
    let block = sample_block((0..5).map(plain_tx).collect());
    let detection = detect(&block);
    let summary = summarize(&detection);

    assert_eq!(detection.eligible_tx_count, 0);
    assert_eq!(summary.attack_count, 0);
    assert_eq!(summary.attack_percentage, 0.0);
    assert!(summary.max_gain.is_none());
    assert!(summary.min_gain.is_none());
    assert!(summary.frequent_addresses.is_none());
    assert_eq!(summary.max_victim_input_wei, "0");
    assert!(pair_records(&detection).is_empty());
}

#[test]
fn eligible_block_without_pairs_summarizes_to_zero() {
    // Two buys, no sell.
    let block = sample_block(vec![
        buy_tx(0, actor(0xa1), actor(0xb1), 100, 50),
        buy_tx(1, actor(0xa2), actor(0xb2), 100, 50),
    ]);
    let detection = detect(&block);
    let summary = summarize(&detection);

    assert_eq!(detection.eligible_tx_count, 2);
    assert_eq!(summary.attack_count, 0);
    assert_eq!(summary.victim_count, 0);
}

#[test]
fn empty_block_summarizes_to_zero() {
    let block = sample_block(Vec::new());
    let summary = summarize(&detect(&block));

    assert_eq!(summary.original_tx_count, 0);
    assert_eq!(summary.attack_count, 0);
    assert_eq!(summary.attack_percentage, 0.0);
}

#[test]
fn detection_is_deterministic() {
    for block in generated_blocks() {
        assert_eq!(pair_records(&detect(&block)), pair_records(&detect(&block)));
    }
}
